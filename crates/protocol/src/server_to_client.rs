/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::fmt::{Display, Formatter};
use std::io;

use flood_rs::{ReadOctetStream, WriteOctetStream};

/// Outcome of an action, carrying the authoritative animation-lock duration.
/// `source_sequence` is the sequence of the request that caused it, or zero
/// for effects the server started on its own. `animation_lock_duration` is
/// the only field the mitigation layer ever rewrites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionEffect {
    pub source_sequence: u32,
    pub action_id: u32,
    pub animation_lock_duration: f32,
}

impl Display for ActionEffect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "actionId={:04x} sourceSequence={:04x} lock={:.3}s",
            self.action_id, self.source_sequence, self.animation_lock_duration
        )
    }
}

impl ActionEffect {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.source_sequence)?;
        stream.write_u32(self.action_id)?;
        stream.write_u32(self.animation_lock_duration.to_bits())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            source_sequence: stream.read_u32()?,
            action_id: stream.read_u32()?,
            animation_lock_duration: f32::from_bits(stream.read_u32()?),
        })
    }
}

/// Handler-private sideband carrying the true wait time at full precision,
/// since the `f32` seconds encoding in [`ActionEffect`] loses it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginalWaitTime {
    pub source_sequence: u32,
    pub original_wait_time: f32,
}

impl Display for OriginalWaitTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sourceSequence={:04x} wait={:.3}s",
            self.source_sequence, self.original_wait_time
        )
    }
}

impl OriginalWaitTime {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.source_sequence)?;
        stream.write_u32(self.original_wait_time.to_bits())
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            source_sequence: stream.read_u32()?,
            original_wait_time: f32::from_bits(stream.read_u32()?),
        })
    }
}

/// Identifies the rejected request. The server sometimes leaves
/// `source_sequence` empty, in which case the action id is the only key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollback {
    pub source_sequence: u32,
    pub action_id: u32,
}

impl Display for Rollback {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "actionId={:04x} sourceSequence={:08x}",
            self.action_id, self.source_sequence
        )
    }
}

impl Rollback {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.source_sequence)?;
        stream.write_u32(self.action_id)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            source_sequence: stream.read_u32()?,
            action_id: stream.read_u32()?,
        })
    }
}

/// Control message addressed to the connection's own player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorControlSelf {
    pub category: u16,
    pub rollback: Rollback,
}

impl Display for ActorControlSelf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "category={:04x} {}", self.category, self.rollback)
    }
}

impl ActorControlSelf {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u16(self.category)?;
        stream.write_u16(0)?;
        self.rollback.to_stream(stream)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let category = stream.read_u16()?;
        let _pad = stream.read_u16()?;
        Ok(Self {
            category,
            rollback: Rollback::from_stream(stream)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelCast {
    pub action_id: u32,
}

impl Display for CancelCast {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "actionId={:04x}", self.action_id)
    }
}

impl CancelCast {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.action_id)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            action_id: stream.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorControl {
    pub category: u16,
    pub cancel_cast: CancelCast,
}

impl Display for ActorControl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "category={:04x} {}", self.category, self.cancel_cast)
    }
}

impl ActorControl {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u16(self.category)?;
        stream.write_u16(0)?;
        self.cancel_cast.to_stream(stream)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let category = stream.read_u16()?;
        let _pad = stream.read_u16()?;
        Ok(Self {
            category,
            cancel_cast: CancelCast::from_stream(stream)?,
        })
    }
}

/// The server confirming a long-windup action before its effect arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorCast {
    pub action_id: u32,
    pub cast_time: f32,
    pub target_id: u32,
}

impl Display for ActorCast {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "actionId={:04x} time={:.3} target={:08x}",
            self.action_id, self.cast_time, self.target_id
        )
    }
}

impl ActorCast {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.action_id)?;
        stream.write_u32(self.cast_time.to_bits())?;
        stream.write_u32(self.target_id)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            action_id: stream.read_u32()?,
            cast_time: f32::from_bits(stream.read_u32()?),
            target_id: stream.read_u32()?,
        })
    }
}
