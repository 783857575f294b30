/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::fmt::{Display, Formatter};
use std::io;

use flood_rs::{ReadOctetStream, WriteOctetStream};

/// A client asking to perform an action. `sequence` is client-assigned and
/// increases monotonically per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRequest {
    pub action_id: u32,
    pub sequence: u32,
}

impl Display for ActionRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "actionId={:04x} sequence={:04x}",
            self.action_id, self.sequence
        )
    }
}

impl ActionRequest {
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.action_id)?;
        stream.write_u32(self.sequence)
    }

    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            action_id: stream.read_u32()?,
            sequence: stream.read_u32()?,
        })
    }
}
