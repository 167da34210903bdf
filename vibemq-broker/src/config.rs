//! Broker-wide configuration, with sensible defaults and a fluent,
//! validated builder — grounded in the teacher's `SystemConfig`/
//! `SystemConfigBuilder` pair.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::ack::{DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY};
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::ratelimit::{
    DEFAULT_CONNECTION_CAP, DEFAULT_CONNECTION_WINDOW, DEFAULT_MESSAGE_CAP,
};
use crate::registry::DEFAULT_MAX_CONNECTIONS;

/// Default TCP listen port (§6).
pub const DEFAULT_PORT: u16 = 8080;
/// Default graceful-shutdown grace period (§4.10).
pub const DEFAULT_SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);
/// Default gauge-refresh cadence (§4.10).
pub const DEFAULT_GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Broker-wide configuration (§4.9, §4.10, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// TCP port the accept loop listens on.
    pub port: u16,
    /// Shared bearer token required on `Connect`. `None` disables
    /// authentication (§4.4).
    pub auth_token: Option<String>,
    /// Whether publish/subscribe against an unknown queue auto-creates it
    /// with broker defaults (§4.9).
    pub auto_create_queues: bool,
    /// Largest acceptable declared frame body size, in bytes (§4.1).
    pub max_frame_size: u32,
    /// Maximum concurrent live sessions (§4.5).
    pub max_connections: usize,
    /// Per-remote-address connection-admission window (§4.3).
    pub connection_rate_window: Duration,
    /// Per-remote-address connection-admission cap within the window (§4.3).
    pub connection_rate_cap: u32,
    /// Per-session message-admission cap within a fixed 1 s window (§4.3).
    pub message_rate_cap: u32,
    /// Base ack-tracker retry delay (§4.8).
    pub ack_base_retry_delay: Duration,
    /// Maximum ack-tracker retry delay (§4.8).
    pub ack_max_retry_delay: Duration,
    /// Grace period for graceful shutdown's pending-count wait (§4.10).
    pub shutdown_grace_period: Duration,
    /// Cadence of the gauge-refresh background loop (§4.10).
    pub gauge_refresh_interval: Duration,
    /// TLS configuration. `None` serves plaintext TCP.
    pub tls: Option<TlsConfig>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            auth_token: None,
            auto_create_queues: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_rate_window: DEFAULT_CONNECTION_WINDOW,
            connection_rate_cap: DEFAULT_CONNECTION_CAP,
            message_rate_cap: DEFAULT_MESSAGE_CAP,
            ack_base_retry_delay: DEFAULT_BASE_RETRY_DELAY,
            ack_max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            shutdown_grace_period: DEFAULT_SHUTDOWN_GRACE_PERIOD,
            gauge_refresh_interval: DEFAULT_GAUGE_REFRESH_INTERVAL,
            tls: None,
        }
    }
}

impl BrokerConfig {
    /// Start building a configuration from defaults.
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Validate configuration values, returning the first violated
    /// constraint as a human-readable message.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be nonzero".to_string());
        }
        if self.max_frame_size == 0 {
            return Err("max_frame_size must be > 0".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }
        if self.connection_rate_window.is_zero() {
            return Err("connection_rate_window must be > 0".to_string());
        }
        if self.ack_base_retry_delay.is_zero() {
            return Err("ack_base_retry_delay must be > 0".to_string());
        }
        if self.ack_base_retry_delay > self.ack_max_retry_delay {
            return Err("ack_base_retry_delay must be <= ack_max_retry_delay".to_string());
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }
}

/// Server-side TLS configuration (§4.10): a PKCS#12 certificate chain,
/// loaded via `native-tls::Identity::from_pkcs12`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Filesystem path to the PKCS#12 (`.p12`/`.pfx`) identity bundle.
    pub pkcs12_path: String,
    /// Password protecting the PKCS#12 bundle.
    pub pkcs12_password: String,
}

impl TlsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.pkcs12_path.is_empty() {
            return Err("tls.pkcs12_path must not be empty".to_string());
        }
        Ok(())
    }
}

/// Fluent builder for [`BrokerConfig`].
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    /// Set the TCP listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the shared bearer token, enabling authentication.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// Enable or disable auto-creation of queues on first publish/subscribe.
    pub fn with_auto_create_queues(mut self, enabled: bool) -> Self {
        self.config.auto_create_queues = enabled;
        self
    }

    /// Set the largest acceptable declared frame body size.
    pub fn with_max_frame_size(mut self, size: u32) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the maximum number of concurrent live sessions.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set the per-remote-address connection-admission window and cap.
    pub fn with_connection_rate_limit(mut self, window: Duration, cap: u32) -> Self {
        self.config.connection_rate_window = window;
        self.config.connection_rate_cap = cap;
        self
    }

    /// Set the per-session message-admission cap.
    pub fn with_message_rate_cap(mut self, cap: u32) -> Self {
        self.config.message_rate_cap = cap;
        self
    }

    /// Set the ack tracker's base and maximum retry delays.
    pub fn with_ack_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.config.ack_base_retry_delay = base;
        self.config.ack_max_retry_delay = max;
        self
    }

    /// Set the graceful-shutdown grace period.
    pub fn with_shutdown_grace_period(mut self, period: Duration) -> Self {
        self.config.shutdown_grace_period = period;
        self
    }

    /// Enable TLS with a PKCS#12 identity bundle.
    pub fn with_tls(mut self, pkcs12_path: impl Into<String>, pkcs12_password: impl Into<String>) -> Self {
        self.config.tls = Some(TlsConfig {
            pkcs12_path: pkcs12_path.into(),
            pkcs12_password: pkcs12_password.into(),
        });
        self
    }

    /// Validate and build the final configuration.
    pub fn build(self) -> Result<BrokerConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BrokerConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = BrokerConfig::builder()
            .with_port(9000)
            .with_auth_token("secret")
            .with_max_connections(5)
            .build()
            .expect("valid config");
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn zero_port_is_rejected() {
        let result = BrokerConfig::builder().with_port(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn base_delay_greater_than_max_is_rejected() {
        let result = BrokerConfig::builder()
            .with_ack_retry_delays(Duration::from_secs(10), Duration::from_secs(5))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn tls_without_path_is_rejected() {
        let result = BrokerConfig::builder().with_tls("", "password").build();
        assert!(result.is_err());
    }

    #[test]
    fn tls_with_path_is_valid() {
        let result = BrokerConfig::builder().with_tls("/etc/vibemq/identity.p12", "password").build();
        assert!(result.is_ok());
    }
}
