/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use monotonic_time_rs::{Millis, MillisDuration};
use swiftlock_logic::connection::ConnectionHandler;
use swiftlock_logic::{ConnectionId, MitigationConfig, NetworkLatencyProvider};
use swiftlock_protocol::custom;
use swiftlock_protocol::prelude::*;

const PLAYER: u32 = 0x1001_0001;

struct NoLatency;

impl NetworkLatencyProvider for NoLatency {
    fn current_network_latency(&self) -> Option<MillisDuration> {
        None
    }
}

struct FixedLatency(u64);

impl NetworkLatencyProvider for FixedLatency {
    fn current_network_latency(&self) -> Option<MillisDuration> {
        Some(MillisDuration::from_millis(self.0))
    }
}

fn handler(config: MitigationConfig) -> ConnectionHandler {
    ConnectionHandler::new(
        ConnectionId(0xbeef),
        config,
        IpcTable::default(),
        Millis::new(0),
    )
}

fn manual_delay_config() -> MitigationConfig {
    MitigationConfig {
        auto_adjusting_extra_delay: false,
        latency_correction: false,
        ..Default::default()
    }
}

fn request_frame(table: &IpcTable, action_id: u32, sequence: u32) -> GameFrame {
    GameFrame::ipc(
        PLAYER,
        PLAYER,
        IpcEnvelope {
            kind: IpcKind::Interested,
            sub_type: table.action_request[0],
            body: IpcBody::ActionRequest(ActionRequest {
                action_id,
                sequence,
            }),
        },
    )
}

fn effect_frame(
    table: &IpcTable,
    source_sequence: u32,
    action_id: u32,
    lock_seconds: f32,
) -> GameFrame {
    GameFrame::ipc(
        PLAYER,
        PLAYER,
        IpcEnvelope {
            kind: IpcKind::Interested,
            sub_type: table.action_effects[0],
            body: IpcBody::ActionEffect(ActionEffect {
                source_sequence,
                action_id,
                animation_lock_duration: lock_seconds,
            }),
        },
    )
}

fn cast_frame(table: &IpcTable, action_id: u32, cast_time: f32) -> GameFrame {
    GameFrame::ipc(
        PLAYER,
        PLAYER,
        IpcEnvelope {
            kind: IpcKind::Interested,
            sub_type: table.actor_cast,
            body: IpcBody::ActorCast(ActorCast {
                action_id,
                cast_time,
                target_id: PLAYER,
            }),
        },
    )
}

fn cancel_cast_frame(table: &IpcTable, action_id: u32) -> GameFrame {
    GameFrame::ipc(
        PLAYER,
        PLAYER,
        IpcEnvelope {
            kind: IpcKind::Interested,
            sub_type: table.actor_control,
            body: IpcBody::ActorControl(ActorControl {
                category: category::CANCEL_CAST,
                cancel_cast: CancelCast { action_id },
            }),
        },
    )
}

fn rejected_frame(table: &IpcTable, source_sequence: u32, action_id: u32) -> GameFrame {
    GameFrame::ipc(
        PLAYER,
        PLAYER,
        IpcEnvelope {
            kind: IpcKind::Interested,
            sub_type: table.actor_control_self,
            body: IpcBody::ActorControlSelf(ActorControlSelf {
                category: category::ACTION_REJECTED,
                rollback: Rollback {
                    source_sequence,
                    action_id,
                },
            }),
        },
    )
}

fn sideband_frame(source_sequence: u32, wait_seconds: f32) -> GameFrame {
    GameFrame::ipc(
        PLAYER,
        PLAYER,
        IpcEnvelope {
            kind: IpcKind::Custom,
            sub_type: custom::ORIGINAL_WAIT_TIME,
            body: IpcBody::OriginalWaitTime(OriginalWaitTime {
                source_sequence,
                original_wait_time: wait_seconds,
            }),
        },
    )
}

fn lock_duration(frame: &GameFrame) -> f32 {
    match &frame.ipc.as_ref().unwrap().body {
        IpcBody::ActionEffect(effect) => effect.animation_lock_duration,
        _ => panic!("frame is not an action effect"),
    }
}

#[test_log::test]
fn single_instant_action() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    let request = request_frame(&table, 0x00A1, 1);
    assert!(handler.on_outgoing(Millis::new(1000), &request));
    assert_eq!(handler.pending_count(), 1);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1000);

    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    assert!(handler.on_incoming(Millis::new(1080), &mut effect, &NoLatency));

    // cursor advanced by 500 + 75 from the request timestamp
    assert_eq!(handler.animation_lock_ends_at_ms(), 1575);
    assert_eq!(handler.pending_count(), 0);
    // remaining lock as seen at t=1080
    assert!((lock_duration(&effect) - 0.495).abs() < 1e-6);
}

#[test_log::test]
fn only_the_lock_duration_is_rewritten() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));

    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut effect, &NoLatency);

    let envelope = effect.ipc.as_ref().unwrap();
    assert_eq!(envelope.sub_type, table.action_effects[0]);
    match &envelope.body {
        IpcBody::ActionEffect(received) => {
            assert_eq!(received.action_id, 0x00A1);
            assert_eq!(received.source_sequence, 1);
        }
        _ => panic!("body type changed"),
    }
}

#[test_log::test]
fn discarded_requests_are_drained() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    handler.on_outgoing(Millis::new(1010), &request_frame(&table, 0x00A2, 2));
    handler.on_outgoing(Millis::new(1020), &request_frame(&table, 0x00A3, 3));
    assert_eq!(handler.pending_count(), 3);

    // The server only answers the third request; one and two were silently
    // discarded.
    let mut effect = effect_frame(&table, 3, 0x00A3, 0.5);
    assert!(handler.on_incoming(Millis::new(1100), &mut effect, &NoLatency));

    assert_eq!(handler.pending_count(), 0);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1575);
    assert!((lock_duration(&effect) - 0.475).abs() < 1e-6);
}

#[test_log::test]
fn cast_tail_lock_stays_as_the_server_specified() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00C0, 1));

    let mut cast = cast_frame(&table, 0x00C0, 2.5);
    assert!(handler.on_incoming(Millis::new(1050), &mut cast, &NoLatency));
    assert_eq!(handler.pending_count(), 1);

    let mut effect = effect_frame(&table, 1, 0x00C0, 0.1);
    assert!(handler.on_incoming(Millis::new(3550), &mut effect, &NoLatency));

    assert_eq!(handler.pending_count(), 0);
    assert_eq!(lock_duration(&effect), 0.1);
}

#[test_log::test]
fn cancelled_cast_is_removed_without_timeline_update() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00C0, 1));
    let mut cast = cast_frame(&table, 0x00C0, 2.5);
    handler.on_incoming(Millis::new(1050), &mut cast, &NoLatency);

    let mut cancel = cancel_cast_frame(&table, 0x00C0);
    assert!(handler.on_incoming(Millis::new(1800), &mut cancel, &NoLatency));

    assert_eq!(handler.pending_count(), 0);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1000);
}

#[test_log::test]
fn server_originated_follow_up_continues_the_lock() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    let mut first = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut first, &NoLatency);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1575);

    let mut follow_up = effect_frame(&table, 0, 0x00A2, 0.3);
    assert!(handler.on_incoming(Millis::new(1200), &mut follow_up, &NoLatency));

    assert_eq!(handler.animation_lock_ends_at_ms(), 1495);
    assert!((lock_duration(&follow_up) - 0.295).abs() < 1e-6);
}

#[test_log::test]
fn server_originated_effect_respects_the_auto_attack_floor() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    let mut first = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut first, &NoLatency);

    // The continuation would land at 1655, below now + 100.
    let mut follow_up = effect_frame(&table, 0, 0x00A2, 0.1);
    handler.on_incoming(Millis::new(1560), &mut follow_up, &NoLatency);

    assert_eq!(handler.animation_lock_ends_at_ms(), 1660);
    // 1660 - 1560 equals the server-provided wait; nothing to rewrite.
    assert_eq!(lock_duration(&follow_up), 0.1);
}

#[test_log::test]
fn two_consecutive_server_origins_leave_the_timeline_alone() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    let mut first = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut first, &NoLatency);

    let mut follow_up = effect_frame(&table, 0, 0x00A2, 0.3);
    handler.on_incoming(Millis::new(1200), &mut follow_up, &NoLatency);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1495);

    let mut second_follow_up = effect_frame(&table, 0, 0x00A3, 0.2);
    handler.on_incoming(Millis::new(1300), &mut second_follow_up, &NoLatency);

    assert_eq!(handler.animation_lock_ends_at_ms(), 1495);
    assert_eq!(lock_duration(&second_follow_up), 0.2);
}

#[test_log::test]
fn rejection_with_zero_sequence_matches_by_action_id() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    assert_eq!(handler.animation_lock_ends_at_ms(), 1000);

    let mut rejected = rejected_frame(&table, 0, 0x00A1);
    assert!(handler.on_incoming(Millis::new(1100), &mut rejected, &NoLatency));

    assert_eq!(handler.pending_count(), 0);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1000);
}

#[test_log::test]
fn sideband_is_absorbed_and_authoritative() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));

    // High precision value for sequence one must never reach the game.
    let mut sideband = sideband_frame(1, 0.6);
    assert!(!handler.on_incoming(Millis::new(1070), &mut sideband, &NoLatency));

    // The effect itself carries a lossy value; the sideband wins.
    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut effect, &NoLatency);

    assert_eq!(handler.animation_lock_ends_at_ms(), 1000 + 600 + 75);
    assert!((lock_duration(&effect) - 0.595).abs() < 1e-6);
}

#[test_log::test]
fn auto_adjusted_delay_subtracts_the_ping() {
    let table = IpcTable::default();
    let mut handler = handler(MitigationConfig {
        auto_adjusting_extra_delay: true,
        latency_correction: false,
        ..Default::default()
    });

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut effect, &FixedLatency(20));

    // delay = (rtt mod wait) - latency = 80 - 20
    assert_eq!(handler.animation_lock_ends_at_ms(), 1000 + 500 + 60);
    assert!((lock_duration(&effect) - 0.48).abs() < 1e-6);
}

#[test_log::test]
fn latency_correction_uses_the_response_statistics() {
    let table = IpcTable::default();
    let mut handler = handler(MitigationConfig {
        auto_adjusting_extra_delay: true,
        latency_correction: true,
        ..Default::default()
    });

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut effect, &FixedLatency(20));

    // With a single sample the estimate equals the rtt, so the whole round
    // trip is attributed to the network and no extra delay remains.
    assert_eq!(handler.animation_lock_ends_at_ms(), 1500);
    assert!((lock_duration(&effect) - 0.42).abs() < 1e-6);
}

#[test_log::test]
fn extra_delay_is_capped() {
    let table = IpcTable::default();
    let mut handler = handler(MitigationConfig {
        auto_adjusting_extra_delay: true,
        latency_correction: false,
        ..Default::default()
    });

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    // 400 ms round trip on a pingless link would overshoot without the cap.
    handler.on_incoming(Millis::new(1400), &mut effect, &FixedLatency(0));

    assert_eq!(handler.animation_lock_ends_at_ms(), 1000 + 500 + 150);
}

#[test_log::test]
fn rewritten_duration_is_never_negative() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));

    // The effect arrives after the modeled lock already ran out.
    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1700), &mut effect, &NoLatency);

    assert_eq!(handler.animation_lock_ends_at_ms(), 1575);
    assert_eq!(lock_duration(&effect), 0.0);
}

#[test_log::test]
fn effect_matching_nothing_is_forwarded_unchanged() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    let mut effect = effect_frame(&table, 5, 0x00A1, 0.5);
    assert!(handler.on_incoming(Millis::new(1000), &mut effect, &NoLatency));

    assert_eq!(lock_duration(&effect), 0.5);
    assert_eq!(handler.animation_lock_ends_at_ms(), 0);
}

#[test_log::test]
fn third_party_effects_are_ignored() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));

    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    effect.source_actor = PLAYER + 1;
    assert!(handler.on_incoming(Millis::new(1080), &mut effect, &NoLatency));

    // someone else's effect; the pending request stays
    assert_eq!(handler.pending_count(), 1);
    assert_eq!(lock_duration(&effect), 0.5);
}

#[test_log::test]
fn non_ipc_frames_pass_through() {
    let mut handler = handler(manual_delay_config());

    let mut keep_alive = GameFrame {
        segment_type: SegmentType::KeepAlive,
        source_actor: 0,
        current_actor: 0,
        ipc: None,
    };
    assert!(handler.on_incoming(Millis::new(1000), &mut keep_alive, &NoLatency));
    assert!(handler.on_outgoing(Millis::new(1000), &keep_alive));
}

#[test_log::test]
fn request_during_running_lock_keeps_the_cursor() {
    let table = IpcTable::default();
    let mut handler = handler(manual_delay_config());

    handler.on_outgoing(Millis::new(1000), &request_frame(&table, 0x00A1, 1));
    let mut effect = effect_frame(&table, 1, 0x00A1, 0.5);
    handler.on_incoming(Millis::new(1080), &mut effect, &NoLatency);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1575);

    // Queued while the lock is still running: the cursor must not move back.
    handler.on_outgoing(Millis::new(1400), &request_frame(&table, 0x00A2, 2));
    assert_eq!(handler.animation_lock_ends_at_ms(), 1575);

    let mut second = effect_frame(&table, 2, 0x00A2, 0.6);
    handler.on_incoming(Millis::new(1500), &mut second, &NoLatency);
    assert_eq!(handler.animation_lock_ends_at_ms(), 1575 + 600 + 75);
}
