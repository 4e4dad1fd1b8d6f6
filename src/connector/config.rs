use std::time::Duration;

/// Send-side string encoding (spec §3). Inbound bytes are always accepted
/// as UTF-8 regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Encode outgoing command/login text as UTF-8.
    Utf8,
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Utf8
    }
}

/// Connector-level tuning knobs (spec §3 `ConnectorConfig`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorConfig {
    /// Wall-clock time before the initial login is abandoned.
    pub connection_timeout: Duration,

    /// Time before a sent `ClientLogin` is considered lost and retried.
    pub login_timeout: Duration,

    /// Per-command response deadline.
    pub command_timeout: Duration,

    /// Silence period after which an empty keep-alive command is sent.
    pub keep_alive_interval: Duration,

    /// Server-side idle threshold that the published protocol enforces;
    /// exceeding it without any server traffic is treated as session-fatal
    /// (spec §4.3, §7).
    pub server_silence_timeout: Duration,

    /// Maximum number of reconnect attempts, or `None` for unlimited.
    pub reconnect_max_attempts: Option<u32>,

    /// Backoff delay before the first reconnect attempt.
    pub reconnect_initial_delay: Duration,

    /// Multiplicative backoff factor applied per attempt.
    pub reconnect_backoff_factor: f64,

    /// Ceiling on the backoff delay.
    pub reconnect_max_delay: Duration,

    /// Size of the message dedup window, `1..=255`.
    pub nonce_window: usize,

    /// Send-side string encoding.
    pub encoding: Encoding,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(3),
            login_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(10),
            keep_alive_interval: Duration::from_secs(30),
            server_silence_timeout: Duration::from_secs(45),
            reconnect_max_attempts: None,
            reconnect_initial_delay: Duration::from_secs(3),
            reconnect_backoff_factor: 2.0,
            reconnect_max_delay: Duration::from_secs(60),
            nonce_window: 5,
            encoding: Encoding::Utf8,
        }
    }
}

impl ConnectorConfig {
    /// Starts from [`ConnectorConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`ConnectorConfig::connection_timeout`].
    pub fn connection_timeout(mut self, v: Duration) -> Self {
        self.connection_timeout = v;
        self
    }

    /// Sets [`ConnectorConfig::login_timeout`].
    pub fn login_timeout(mut self, v: Duration) -> Self {
        self.login_timeout = v;
        self
    }

    /// Sets [`ConnectorConfig::command_timeout`].
    pub fn command_timeout(mut self, v: Duration) -> Self {
        self.command_timeout = v;
        self
    }

    /// Sets [`ConnectorConfig::keep_alive_interval`].
    pub fn keep_alive_interval(mut self, v: Duration) -> Self {
        self.keep_alive_interval = v;
        self
    }

    /// Sets [`ConnectorConfig::server_silence_timeout`].
    pub fn server_silence_timeout(mut self, v: Duration) -> Self {
        self.server_silence_timeout = v;
        self
    }

    /// Sets [`ConnectorConfig::reconnect_max_attempts`].
    pub fn reconnect_max_attempts(mut self, v: Option<u32>) -> Self {
        self.reconnect_max_attempts = v;
        self
    }

    /// Sets the reconnect backoff parameters.
    pub fn reconnect_backoff(mut self, initial: Duration, factor: f64, max: Duration) -> Self {
        self.reconnect_initial_delay = initial;
        self.reconnect_backoff_factor = factor;
        self.reconnect_max_delay = max;
        self
    }

    /// Sets [`ConnectorConfig::nonce_window`].
    pub fn nonce_window(mut self, v: usize) -> Self {
        self.nonce_window = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let cfg = ConnectorConfig::default();
        assert_eq!(cfg.reconnect_initial_delay, Duration::from_secs(3));
        assert_eq!(cfg.reconnect_backoff_factor, 2.0);
        assert_eq!(cfg.reconnect_max_delay, Duration::from_secs(60));
        assert_eq!(cfg.server_silence_timeout, Duration::from_secs(45));
        assert_eq!(cfg.nonce_window, 5);
    }

    #[test]
    fn test_builder_chains() {
        let cfg = ConnectorConfig::new()
            .command_timeout(Duration::from_secs(1))
            .nonce_window(10);
        assert_eq!(cfg.command_timeout, Duration::from_secs(1));
        assert_eq!(cfg.nonce_window, 10);
    }
}
