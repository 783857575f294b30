/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::fmt::{Display, Formatter};
use std::io;
use std::io::ErrorKind;

use flood_rs::prelude::{InOctetStream, OutOctetStream};
use flood_rs::WriteOctetStream;

use crate::client_to_server::ActionRequest;
use crate::server_to_client::{
    ActionEffect, ActorCast, ActorControl, ActorControlSelf, OriginalWaitTime,
};

pub mod client_to_server;
pub mod prelude;
pub mod server_to_client;

#[repr(u16)]
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SegmentType {
    SessionInit = 0x01,
    Ipc = 0x03,
    KeepAlive = 0x07,
    KeepAliveResponse = 0x08,
}

impl TryFrom<u16> for SegmentType {
    type Error = io::Error;

    fn try_from(value: u16) -> io::Result<Self> {
        Ok(match value {
            0x01 => Self::SessionInit,
            0x03 => Self::Ipc,
            0x07 => Self::KeepAlive,
            0x08 => Self::KeepAliveResponse,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unknown segment type 0x{:02X}", value),
            ))?,
        })
    }
}

/// Channel discriminant inside an IPC segment. `Interested` carries game
/// messages; `Custom` carries the handler-private sideband that must never
/// reach the game.
#[repr(u16)]
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum IpcKind {
    Interested = 0x0014,
    Custom = 0xE852,
}

impl TryFrom<u16> for IpcKind {
    type Error = io::Error;

    fn try_from(value: u16) -> io::Result<Self> {
        Ok(match value {
            0x0014 => Self::Interested,
            0xE852 => Self::Custom,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unknown ipc kind 0x{:04X}", value),
            ))?,
        })
    }
}

/// Sub-types on the `Custom` channel.
pub mod custom {
    pub const ORIGINAL_WAIT_TIME: u16 = 0x0000;
}

/// Actor-control categories. The sets are open; only these two matter here.
pub mod category {
    /// `ActorControlSelf`: the oldest outstanding action request was rejected.
    pub const ACTION_REJECTED: u16 = 0x02BC;
    /// `ActorControl`: an in-progress cast was cancelled.
    pub const CANCEL_CAST: u16 = 0x000F;
}

/// Configuration-supplied sub-type discriminants for the current game build.
/// Action requests come in two flavors and action effects in five, one per
/// fan-out arity.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IpcTable {
    pub action_request: [u16; 2],
    pub action_effects: [u16; 5],
    pub actor_control_self: u16,
    pub actor_control: u16,
    pub actor_cast: u16,
}

impl Default for IpcTable {
    fn default() -> Self {
        Self {
            action_request: [0x029F, 0x02A0],
            action_effects: [0x03C7, 0x03C9, 0x03CA, 0x03CB, 0x03CC],
            actor_control_self: 0x0293,
            actor_control: 0x0292,
            actor_cast: 0x0295,
        }
    }
}

impl IpcTable {
    pub fn is_action_request(&self, sub_type: u16) -> bool {
        self.action_request.contains(&sub_type)
    }

    pub fn is_action_effect(&self, sub_type: u16) -> bool {
        self.action_effects.contains(&sub_type)
    }
}

/// Typed payload of one IPC message. Sub-types the table does not classify
/// decode as `Opaque` and re-encode byte-identically.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcBody {
    ActionRequest(ActionRequest),
    ActionEffect(ActionEffect),
    OriginalWaitTime(OriginalWaitTime),
    ActorControlSelf(ActorControlSelf),
    ActorControl(ActorControl),
    ActorCast(ActorCast),
    Opaque(Vec<u8>),
}

impl Display for IpcBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActionRequest(request) => write!(f, "ActionRequest({})", request),
            Self::ActionEffect(effect) => write!(f, "ActionEffect({})", effect),
            Self::OriginalWaitTime(sideband) => write!(f, "OriginalWaitTime({})", sideband),
            Self::ActorControlSelf(control) => write!(f, "ActorControlSelf({})", control),
            Self::ActorControl(control) => write!(f, "ActorControl({})", control),
            Self::ActorCast(cast) => write!(f, "ActorCast({})", cast),
            Self::Opaque(octets) => write!(f, "Opaque({} octets)", octets.len()),
        }
    }
}

impl IpcBody {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        match self {
            Self::ActionRequest(request) => request.to_stream(stream),
            Self::ActionEffect(effect) => effect.to_stream(stream),
            Self::OriginalWaitTime(sideband) => sideband.to_stream(stream),
            Self::ActorControlSelf(control) => control.to_stream(stream),
            Self::ActorControl(control) => control.to_stream(stream),
            Self::ActorCast(cast) => cast.to_stream(stream),
            Self::Opaque(octets) => stream.write(octets),
        }
    }
}

/// One IPC message with its channel, sub-type and decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcEnvelope {
    pub kind: IpcKind,
    pub sub_type: u16,
    pub body: IpcBody,
}

impl Display for IpcEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ipc({:04x}): {}", self.sub_type, self.body)
    }
}

impl IpcEnvelope {
    /// Classifies `payload` using the table and produces the typed view.
    pub fn decode(
        table: &IpcTable,
        kind: IpcKind,
        sub_type: u16,
        payload: &[u8],
    ) -> io::Result<Self> {
        let mut in_stream = InOctetStream::new(payload);
        let body = match kind {
            IpcKind::Custom => match sub_type {
                custom::ORIGINAL_WAIT_TIME => {
                    IpcBody::OriginalWaitTime(OriginalWaitTime::from_stream(&mut in_stream)?)
                }
                _ => IpcBody::Opaque(payload.to_vec()),
            },
            IpcKind::Interested => {
                if table.is_action_request(sub_type) {
                    IpcBody::ActionRequest(ActionRequest::from_stream(&mut in_stream)?)
                } else if table.is_action_effect(sub_type) {
                    IpcBody::ActionEffect(ActionEffect::from_stream(&mut in_stream)?)
                } else if sub_type == table.actor_control_self {
                    IpcBody::ActorControlSelf(ActorControlSelf::from_stream(&mut in_stream)?)
                } else if sub_type == table.actor_control {
                    IpcBody::ActorControl(ActorControl::from_stream(&mut in_stream)?)
                } else if sub_type == table.actor_cast {
                    IpcBody::ActorCast(ActorCast::from_stream(&mut in_stream)?)
                } else {
                    IpcBody::Opaque(payload.to_vec())
                }
            }
        };

        Ok(Self {
            kind,
            sub_type,
            body,
        })
    }

    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut out_stream = OutOctetStream::new();
        self.body.to_stream(&mut out_stream)?;
        Ok(out_stream.octets_ref().to_vec())
    }
}

/// Decoded view of one game frame as handed over by the frame-extraction
/// collaborator. Payload bytes other than the typed views are untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct GameFrame {
    pub segment_type: SegmentType,
    pub source_actor: u32,
    pub current_actor: u32,
    pub ipc: Option<IpcEnvelope>,
}

impl Display for GameFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.ipc {
            Some(envelope) => write!(
                f,
                "frame {:?} source={:08x} current={:08x} {}",
                self.segment_type, self.source_actor, self.current_actor, envelope
            ),
            None => write!(
                f,
                "frame {:?} source={:08x} current={:08x}",
                self.segment_type, self.source_actor, self.current_actor
            ),
        }
    }
}

impl GameFrame {
    pub fn ipc(source_actor: u32, current_actor: u32, envelope: IpcEnvelope) -> Self {
        Self {
            segment_type: SegmentType::Ipc,
            source_actor,
            current_actor,
            ipc: Some(envelope),
        }
    }

    /// Inbound processing only looks at messages intended for the player the
    /// connection belongs to; third-party effects are filtered on this.
    pub fn is_for_current_player(&self) -> bool {
        self.source_actor == self.current_actor
    }
}
