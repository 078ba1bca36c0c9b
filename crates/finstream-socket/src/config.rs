use std::time::Duration;

/// Default streaming endpoint (scheme and host, no path).
pub const DEFAULT_STREAM_ENDPOINT: &str = "wss://streaming.forexpros.com";

/// Exclusive upper bound of the numeric connection id.
pub const CONNECTION_ID_RANGE: u64 = 1_000;

pub const SIGNATURE_LENGTH: usize = 8;

/// Channel settings for [`crate::StreamClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub endpoint: String,
    pub heartbeat_interval: Duration,
    pub handshake_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from(DEFAULT_STREAM_ENDPOINT),
            heartbeat_interval: Duration::from_secs(40),
            handshake_timeout: Duration::from_secs(45),
        }
    }
}

impl StreamConfig {
    /// Defaults overridden by `FINSTREAM_STREAM_ENDPOINT` and `FINSTREAM_HEARTBEAT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("FINSTREAM_STREAM_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(secs) = std::env::var("FINSTREAM_HEARTBEAT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// `<endpoint>/echo/<connection_id>/<signature>/websocket`
    pub fn channel_url(&self, connection_id: &str, signature: &str) -> String {
        format!(
            "{}/echo/{connection_id}/{signature}/websocket",
            self.endpoint.trim_end_matches('/')
        )
    }
}
