/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::fmt;

use err_rs::{ErrorLevel, ErrorLevelProvider};

use crate::ConnectionId;

#[derive(Debug)]
pub enum MitigationError {
    UnknownConnection(ConnectionId),
    ConnectionAlreadyRegistered(ConnectionId),
}

impl ErrorLevelProvider for MitigationError {
    fn error_level(&self) -> ErrorLevel {
        match self {
            Self::UnknownConnection(_) => ErrorLevel::Warning,
            Self::ConnectionAlreadyRegistered(_) => ErrorLevel::Warning,
        }
    }
}

impl fmt::Display for MitigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownConnection(connection_id) => {
                write!(f, "unknown connection {connection_id}")
            }
            Self::ConnectionAlreadyRegistered(connection_id) => {
                write!(f, "connection {connection_id} is already registered")
            }
        }
    }
}

impl std::error::Error for MitigationError {}
