use log::debug;
use metricator::RateMetric;
use monotonic_time_rs::{Millis, MillisDuration};
use std::fmt::Display;

pub struct MetricsInDirection {
    pub messages_per_second: f32,
}

impl Display for MetricsInDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} messages/s", self.messages_per_second)
    }
}

pub struct CombinedMetrics {
    pub outgoing: MetricsInDirection,
    pub incoming: MetricsInDirection,
    pub rewritten_effects_per_second: f32,
}

impl Display for CombinedMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "metrics: out: {}, in: {}, rewritten: {} effects/s",
            self.outgoing, self.incoming, self.rewritten_effects_per_second
        )
    }
}

/// Message rates for one intercepted connection.
pub struct ConnectionMetrics {
    in_messages_per_second: RateMetric,
    out_messages_per_second: RateMetric,
    rewritten_effects_per_second: RateMetric,

    last_debug_metric_at: Millis,
    debug_metric_duration: MillisDuration,
}

impl ConnectionMetrics {
    pub fn new(now: Millis) -> Self {
        Self {
            in_messages_per_second: RateMetric::with_interval(now, 0.1),
            out_messages_per_second: RateMetric::with_interval(now, 0.1),
            rewritten_effects_per_second: RateMetric::with_interval(now, 0.1),
            last_debug_metric_at: now,
            debug_metric_duration: MillisDuration::from_millis(500),
        }
    }

    pub fn sent(&mut self) {
        self.out_messages_per_second.add(1);
    }

    pub fn received(&mut self) {
        self.in_messages_per_second.add(1);
    }

    pub fn rewrote(&mut self) {
        self.rewritten_effects_per_second.add(1);
    }

    pub fn update(&mut self, now: Millis) {
        self.in_messages_per_second.update(now);
        self.out_messages_per_second.update(now);
        self.rewritten_effects_per_second.update(now);

        if now - self.last_debug_metric_at > self.debug_metric_duration {
            self.last_debug_metric_at = now;
            debug!("{}", self.metrics())
        }
    }

    pub fn metrics(&self) -> CombinedMetrics {
        CombinedMetrics {
            outgoing: MetricsInDirection {
                messages_per_second: self.out_messages_per_second.rate(),
            },
            incoming: MetricsInDirection {
                messages_per_second: self.in_messages_per_second.rate(),
            },
            rewritten_effects_per_second: self.rewritten_effects_per_second.rate(),
        }
    }
}
