use std::time::Duration;

use crate::connector::config::ConnectorConfig;

/// Computes reconnect backoff delays from a [`ConnectorConfig`] (spec
/// §4.3 "Reconnect"): `min(initial * factor^attempt, max)`, with a grace
/// period before the very first retry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    initial: Duration,
    factor: f64,
    max: Duration,
}

impl Backoff {
    pub(crate) fn new(config: &ConnectorConfig) -> Self {
        Self {
            initial: config.reconnect_initial_delay,
            factor: config.reconnect_backoff_factor,
            max: config.reconnect_max_delay,
        }
    }

    /// The delay before reconnect attempt `attempt` (0-based: `0` is the
    /// first retry, preceded by the grace period described in spec §4.3).
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.factor.powi(attempt as i32);
        let capped = scaled.min(self.max.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }
}
