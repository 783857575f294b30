/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use sliding_stat::*;
pub use swiftlock_action_queue::*;
pub use swiftlock_logic::*;
pub use swiftlock_metrics::*;
pub use swiftlock_protocol::prelude::*;
