/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use crate::{
    category, client_to_server::ActionRequest, custom, server_to_client::ActionEffect,
    server_to_client::ActorCast, server_to_client::ActorControl,
    server_to_client::ActorControlSelf, server_to_client::CancelCast,
    server_to_client::OriginalWaitTime, server_to_client::Rollback, GameFrame, IpcBody,
    IpcEnvelope, IpcKind, IpcTable, SegmentType,
};
