/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub mod connection;
pub mod err;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use log::debug;
use monotonic_time_rs::{Millis, MillisDuration};
use swiftlock_protocol::IpcTable;

use crate::connection::ConnectionHandler;
use crate::err::MitigationError;

/// Identity of one intercepted connection (the socket value).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct MitigationConfig {
    /// Emit a structured log line for every request and rewritten effect.
    pub high_latency_mitigation_logging: bool,
    /// Derive the extra delay from measured round-trip and network latency
    /// instead of the fixed default.
    pub auto_adjusting_extra_delay: bool,
    /// Statistical outlier correction on top of auto-adjustment.
    pub latency_correction: bool,
    /// Samples kept per latency window; at least 16.
    pub latency_window: usize,
}

impl Default for MitigationConfig {
    fn default() -> Self {
        Self {
            high_latency_mitigation_logging: false,
            auto_adjusting_extra_delay: true,
            latency_correction: true,
            latency_window: sliding_stat::DEFAULT_CAPACITY,
        }
    }
}

/// Collaborator interface for the OS-reported transport-level ping of the
/// connection currently being processed.
pub trait NetworkLatencyProvider {
    fn current_network_latency(&self) -> Option<MillisDuration>;
}

/// Follows connection lifecycle notifications and keeps one
/// [`ConnectionHandler`] per live connection. Destroying the handler is the
/// only mechanism that detaches its filters from a connection.
pub struct LatencyMitigator {
    connections: HashMap<u64, ConnectionHandler>,
    config: MitigationConfig,
    table: IpcTable,
}

impl LatencyMitigator {
    #[must_use]
    pub fn new(config: MitigationConfig, table: IpcTable) -> Self {
        Self {
            connections: HashMap::new(),
            config,
            table,
        }
    }

    pub fn on_connection_found(
        &mut self,
        connection_id: ConnectionId,
        now: Millis,
    ) -> Result<(), MitigationError> {
        if self.connections.contains_key(&connection_id.0) {
            return Err(MitigationError::ConnectionAlreadyRegistered(connection_id));
        }
        debug!("connection found {connection_id}");
        self.connections.insert(
            connection_id.0,
            ConnectionHandler::new(connection_id, self.config.clone(), self.table.clone(), now),
        );
        Ok(())
    }

    pub fn on_connection_gone(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<(), MitigationError> {
        if self.connections.remove(&connection_id.0).is_some() {
            debug!("connection gone {connection_id}");
            Ok(())
        } else {
            Err(MitigationError::UnknownConnection(connection_id))
        }
    }

    pub fn connection_mut(&mut self, connection_id: ConnectionId) -> Option<&mut ConnectionHandler> {
        self.connections.get_mut(&connection_id.0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
