/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::collections::HashMap;

use log::{debug, warn};
use monotonic_time_rs::Millis;
use sliding_stat::{MinMeanDev, SlidingStat, MINIMUM_CAPACITY};
use swiftlock_action_queue::{ActionQueue, PendingAction};
use swiftlock_metrics::ConnectionMetrics;
use swiftlock_protocol::prelude::*;
use swiftlock_protocol::{category, custom};

use crate::{ConnectionId, MitigationConfig, NetworkLatencyProvider};

/// Server responses usually take between 50 and 100 ms on a below-1 ms link,
/// so 75 ms is a good average. The server sanity-checks action-use frequency,
/// and undercutting the allowed minimum is trivially detectable on its side;
/// this value must not go lower.
pub const EXTRA_DELAY_MS: i64 = 75;

/// Bounds the extra-delay overshoot on an unstable connection.
pub const MAXIMUM_EXTRA_DELAY_MS: i64 = 150;

pub const AUTO_ATTACK_DELAY_MS: i64 = 100;

fn to_ms(now: Millis) -> i64 {
    now.absolute_milliseconds() as i64
}

fn seconds_to_ms(seconds: f32) -> i64 {
    (f64::from(seconds) * 1000.0).round() as i64
}

fn ms_to_seconds(ms: i64) -> f32 {
    ms as f32 / 1000.0
}

/// Message filters for one intercepted connection.
///
/// The game stops accepting inputs while an animation lock runs, and the
/// server only reports the lock duration together with the action effect, a
/// round trip late. The handler keeps its own model of when the lock really
/// ends (`last_animation_lock_ends_at_ms`) and rewrites the duration carried
/// by each effect so the remaining lock matches that model.
///
/// Callbacks for one connection are serialized by the interception
/// collaborator; no internal locking.
pub struct ConnectionHandler {
    connection_id: ConnectionId,
    config: MitigationConfig,
    table: IpcTable,

    pending: ActionQueue,
    latest_successful: PendingAction,
    last_animation_lock_ends_at_ms: i64,
    original_wait_times: HashMap<u32, i64>,

    application_latency: SlidingStat,
    network_latency: SlidingStat,
    metrics: ConnectionMetrics,
}

impl ConnectionHandler {
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        config: MitigationConfig,
        table: IpcTable,
        now: Millis,
    ) -> Self {
        let window = config.latency_window.max(MINIMUM_CAPACITY);
        Self {
            connection_id,
            config,
            table,
            pending: ActionQueue::new(),
            latest_successful: PendingAction::default(),
            last_animation_lock_ends_at_ms: 0,
            original_wait_times: HashMap::new(),
            application_latency: SlidingStat::new(window)
                .expect("window is clamped to the minimum"),
            network_latency: SlidingStat::new(window).expect("window is clamped to the minimum"),
            metrics: ConnectionMetrics::new(now),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn animation_lock_ends_at_ms(&self) -> i64 {
        self.last_animation_lock_ends_at_ms
    }

    pub fn application_latency(&self) -> Option<MinMeanDev> {
        self.application_latency.values()
    }

    pub fn network_latency(&self) -> Option<MinMeanDev> {
        self.network_latency.values()
    }

    /// Outbound filter. Records action requests; everything is forwarded.
    pub fn on_outgoing(&mut self, now: Millis, frame: &GameFrame) -> bool {
        self.metrics.sent();

        if frame.segment_type != SegmentType::Ipc {
            return true;
        }
        let Some(envelope) = &frame.ipc else {
            return true;
        };
        if envelope.kind != IpcKind::Interested || !self.table.is_action_request(envelope.sub_type)
        {
            return true;
        }
        let IpcBody::ActionRequest(request) = &envelope.body else {
            return true;
        };

        let now_ms = to_ms(now);
        match self.pending.push_with_check(PendingAction::new(
            request.action_id,
            request.sequence,
            now_ms,
        )) {
            Ok(()) => {
                // A request made while the previous lock still runs keeps the
                // cursor; one arriving on an idle queue restarts it.
                if now_ms > self.last_animation_lock_ends_at_ms && self.pending.len() == 1 {
                    self.last_animation_lock_ends_at_ms = now_ms;
                }
                if self.config.high_latency_mitigation_logging {
                    debug!(
                        "{}: C2S_ActionRequest({:04x}): {}",
                        self.connection_id, envelope.sub_type, request
                    );
                }
            }
            Err(err) => {
                warn!("{}: request not tracked: {:?}", self.connection_id, err);
            }
        }
        true
    }

    /// Inbound filter. Returns `false` only for the handler-private sideband;
    /// every game message is forwarded, at most with its
    /// `animation_lock_duration` rewritten in place.
    pub fn on_incoming(
        &mut self,
        now: Millis,
        frame: &mut GameFrame,
        latency: &impl NetworkLatencyProvider,
    ) -> bool {
        self.metrics.received();
        self.metrics.update(now);

        if frame.segment_type != SegmentType::Ipc {
            return true;
        }
        let for_current_player = frame.is_for_current_player();
        let Some(envelope) = frame.ipc.as_mut() else {
            return true;
        };

        match envelope.kind {
            IpcKind::Custom => {
                if envelope.sub_type == custom::ORIGINAL_WAIT_TIME {
                    if let IpcBody::OriginalWaitTime(sideband) = &envelope.body {
                        self.original_wait_times.insert(
                            sideband.source_sequence,
                            seconds_to_ms(sideband.original_wait_time),
                        );
                    }
                }
                // The sideband never reaches the game.
                false
            }
            IpcKind::Interested => {
                if !for_current_player {
                    return true;
                }
                let sub_type = envelope.sub_type;
                if self.table.is_action_effect(sub_type) {
                    if let IpcBody::ActionEffect(effect) = &mut envelope.body {
                        self.on_action_effect(to_ms(now), sub_type, effect, latency);
                    }
                } else if sub_type == self.table.actor_control_self {
                    if let IpcBody::ActorControlSelf(control) = &envelope.body {
                        self.on_actor_control_self(control);
                    }
                } else if sub_type == self.table.actor_control {
                    if let IpcBody::ActorControl(control) = &envelope.body {
                        self.on_actor_control(control);
                    }
                } else if sub_type == self.table.actor_cast {
                    if let IpcBody::ActorCast(cast) = &envelope.body {
                        self.on_actor_cast(cast);
                    }
                }
                true
            }
        }
    }

    fn on_action_effect(
        &mut self,
        now_ms: i64,
        sub_type: u16,
        effect: &mut ActionEffect,
        latency: &impl NetworkLatencyProvider,
    ) {
        // The sideband value, when present, is authoritative; the f32 seconds
        // in the effect itself lose precision.
        let original_wait_time = match self.original_wait_times.remove(&effect.source_sequence) {
            Some(precise) => precise,
            None => seconds_to_ms(effect.animation_lock_duration),
        };
        let mut wait_time = original_wait_time;
        let mut detail = String::new();

        if effect.source_sequence == 0 {
            // An effect the server started on its own continues the previous
            // instant action's lock instead of opening a new one.
            if !self.latest_successful.cast_flag
                && self.latest_successful.sequence != 0
                && self.last_animation_lock_ends_at_ms > now_ms
            {
                self.latest_successful.action_id = effect.action_id;
                self.latest_successful.sequence = 0;
                self.last_animation_lock_ends_at_ms += (original_wait_time + now_ms)
                    - (self.latest_successful.original_wait_time_ms
                        + self.latest_successful.response_timestamp_ms);
                self.last_animation_lock_ends_at_ms = self
                    .last_animation_lock_ends_at_ms
                    .max(now_ms + AUTO_ATTACK_DELAY_MS);
                wait_time = self.last_animation_lock_ends_at_ms - now_ms;
            }
        } else {
            // Responses come in request order; earlier heads were silently
            // discarded by the server.
            self.pending.drop_until_sequence(effect.source_sequence);
            if let Some(front) = self.pending.front() {
                self.latest_successful = front.clone();

                // The 100 ms tail lock after a cast stays as the server
                // specified; only instant actions are rewritten.
                if !self.latest_successful.cast_flag {
                    let rtt = now_ms - self.latest_successful.request_timestamp_ms;
                    self.application_latency.add(rtt);
                    detail.push_str(&format!(" rtt={rtt}ms"));

                    self.latest_successful.response_timestamp_ms = now_ms;

                    let delay = self.extra_delay(rtt, original_wait_time, latency, &mut detail);

                    self.latest_successful.original_wait_time_ms = original_wait_time;
                    self.last_animation_lock_ends_at_ms += original_wait_time + delay;
                    wait_time = self.last_animation_lock_ends_at_ms - now_ms;
                }
                self.pending.pop_front();
            }
        }

        if wait_time != original_wait_time {
            effect.animation_lock_duration = ms_to_seconds(wait_time.max(0));
            self.metrics.rewrote();
            if self.config.high_latency_mitigation_logging {
                debug!(
                    "{}: S2C_ActionEffect({:04x}): actionId={:04x} sourceSequence={:04x} wait={}ms->{}ms{}",
                    self.connection_id,
                    sub_type,
                    effect.action_id,
                    effect.source_sequence,
                    original_wait_time,
                    wait_time,
                    detail
                );
            }
        } else if self.config.high_latency_mitigation_logging {
            debug!(
                "{}: S2C_ActionEffect({:04x}): actionId={:04x} sourceSequence={:04x} wait={}ms",
                self.connection_id,
                sub_type,
                effect.action_id,
                effect.source_sequence,
                original_wait_time
            );
        }
    }

    /// Additional lock time appended on top of the server-provided wait. The
    /// player's own ping is taken out of the equation; server processing time
    /// stays in, since everyone feels that part equally.
    fn extra_delay(
        &mut self,
        rtt: i64,
        original_wait_time: i64,
        latency: &impl NetworkLatencyProvider,
        detail: &mut String,
    ) -> i64 {
        let mut delay = EXTRA_DELAY_MS;

        let Some(reported) = latency.current_network_latency() else {
            return delay;
        };
        if !self.config.auto_adjusting_extra_delay {
            return delay;
        }

        delay = rtt;
        let mut latency_adjusted = reported.as_millis() as i64;
        detail.push_str(&format!(" latency={latency_adjusted}ms"));

        self.network_latency.add(latency_adjusted);

        if self.config.latency_correction {
            let response = self
                .application_latency
                .values()
                .expect("an rtt sample was just added");
            let network = self
                .network_latency
                .values()
                .expect("a latency sample was just added");

            // Pull outlier readings back towards their windows.
            latency_adjusted = latency_adjusted.clamp(
                network.mean - network.deviation,
                network.mean + network.deviation,
            );
            delay = delay.clamp(
                response.mean - response.deviation,
                response.mean + response.deviation,
            );

            let estimate = (delay + response.min + response.mean) / 3 - response.deviation;
            detail.push_str(&format!(" ({estimate}ms)"));

            // Trust the estimate when server response times are stable.
            latency_adjusted = estimate.max(latency_adjusted);
        }

        // When the server has been slower than one nominal wait, absorb only
        // the overage.
        delay = (delay.checked_rem(original_wait_time).unwrap_or(delay) - latency_adjusted).max(0);
        delay = delay.min(MAXIMUM_EXTRA_DELAY_MS);
        detail.push_str(&format!(" delay={delay}ms"));

        delay
    }

    fn on_actor_control_self(&mut self, control: &ActorControlSelf) {
        // The oldest outstanding request was rejected by the server.
        if control.category != category::ACTION_REJECTED {
            return;
        }
        let rollback = control.rollback;
        self.pending
            .drop_until_rejected(rollback.source_sequence, rollback.action_id);
        if self.config.high_latency_mitigation_logging {
            debug!(
                "{}: S2C_ActorControlSelf/ActionRejected: {}",
                self.connection_id, rollback
            );
        }
    }

    fn on_actor_control(&mut self, control: &ActorControl) {
        // The server cancelled the oldest in-progress cast.
        if control.category != category::CANCEL_CAST {
            return;
        }
        self.pending.drop_until_action(control.cancel_cast.action_id);
        self.pending.pop_front();
        if self.config.high_latency_mitigation_logging {
            debug!(
                "{}: S2C_ActorControl/CancelCast: {}",
                self.connection_id, control.cancel_cast
            );
        }
    }

    fn on_actor_cast(&mut self, cast: &ActorCast) {
        self.pending.mark_front_cast();
        if self.config.high_latency_mitigation_logging {
            debug!("{}: S2C_ActorCast: {}", self.connection_id, cast);
        }
    }
}
