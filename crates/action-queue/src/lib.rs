/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
FIFO of outstanding client action requests for one connection.

The server answers requests in the order they were made; any head whose
sequence or action id does not match the server event being correlated is a
request the server silently discarded, and the `drop_until_*` helpers remove
such heads. All timestamps are signed 64-bit monotonic milliseconds.
*/

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use log::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingAction {
    pub action_id: u32,
    /// Client-assigned sequence; zero only for server-originated effects,
    /// which are never enqueued.
    pub sequence: u32,
    pub request_timestamp_ms: i64,
    /// Zero until the correlated server effect has been observed.
    pub response_timestamp_ms: i64,
    /// Set once the server has acknowledged this request as a cast.
    pub cast_flag: bool,
    pub original_wait_time_ms: i64,
}

impl Display for PendingAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "actionId={:04x} sequence={:04x}",
            self.action_id, self.sequence
        )
    }
}

impl PendingAction {
    #[must_use]
    pub fn new(action_id: u32, sequence: u32, request_timestamp_ms: i64) -> Self {
        Self {
            action_id,
            sequence,
            request_timestamp_ms,
            response_timestamp_ms: 0,
            cast_flag: false,
            original_wait_time_ms: 0,
        }
    }
}

#[derive(Debug)]
pub enum ActionQueueError {
    NonMonotonicSequence { last: u32, encountered: u32 },
}

#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: VecDeque<PendingAction>,
}

impl ActionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Appends a new outstanding request. Non-zero sequences must be strictly
    /// increasing per connection.
    pub fn push_with_check(&mut self, action: PendingAction) -> Result<(), ActionQueueError> {
        if let Some(back) = self.pending.back() {
            if action.sequence != 0 && action.sequence <= back.sequence {
                Err(ActionQueueError::NonMonotonicSequence {
                    last: back.sequence,
                    encountered: action.sequence,
                })?;
            }
        }
        self.pending.push_back(action);
        Ok(())
    }

    pub fn front(&self) -> Option<&PendingAction> {
        self.pending.front()
    }

    pub fn pop_front(&mut self) -> Option<PendingAction> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Marks the head as a cast. The game UI blocks further requests while a
    /// cast is in progress, so the head is guaranteed to be the cast action.
    pub fn mark_front_cast(&mut self) {
        if let Some(front) = self.pending.front_mut() {
            front.cast_flag = true;
        }
    }

    /// Removes heads until the front carries `sequence`. Removed heads were
    /// silently discarded by the server.
    pub fn drop_until_sequence(&mut self, sequence: u32) {
        while let Some(front) = self.pending.front() {
            if front.sequence == sequence {
                break;
            }
            debug!("ignored for processing: {}", front);
            self.pending.pop_front();
        }
    }

    /// Removes heads until the front carries `action_id`. Used for events that
    /// lack sequence information.
    pub fn drop_until_action(&mut self, action_id: u32) {
        while let Some(front) = self.pending.front() {
            if front.action_id == action_id {
                break;
            }
            debug!("ignored for processing: {}", front);
            self.pending.pop_front();
        }
    }

    /// Rollback correlation for a rejected request: keyed by sequence when the
    /// server filled it in, by action id otherwise. The matched head itself is
    /// removed and returned.
    pub fn drop_until_rejected(
        &mut self,
        source_sequence: u32,
        action_id: u32,
    ) -> Option<PendingAction> {
        if source_sequence != 0 {
            self.drop_until_sequence(source_sequence);
        } else {
            self.drop_until_action(action_id);
        }
        self.pending.pop_front()
    }
}
