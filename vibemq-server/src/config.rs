//! Layered startup configuration: file, then environment, then CLI flags,
//! each overriding the last — grounded in the teacher's `SystemConfig`/
//! `SystemConfigBuilder` validated-builder pattern, fed from the `config`
//! crate the workspace already depends on for exactly this purpose.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vibemq_broker::BrokerConfig;

use crate::cli::Args;

/// Default port for the `/health/` and `/metrics/` HTTP sidecar.
pub const DEFAULT_HEALTH_PORT: u16 = 9090;

/// The raw, fully-optional shape loaded from file and environment before
/// CLI overrides and defaults are applied. Field names match the TOML
/// keys and the `VIBEMQ_*` environment variables (`config`'s
/// `Environment::with_prefix` lower-cases and strips the prefix).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawConfig {
    port: Option<u16>,
    auth_token: Option<String>,
    auto_create_queues: Option<bool>,
    max_frame_size: Option<u32>,
    max_connections: Option<usize>,
    connection_rate_window_secs: Option<u64>,
    connection_rate_cap: Option<u32>,
    message_rate_cap: Option<u32>,
    shutdown_grace_period_secs: Option<u64>,
    health_port: Option<u16>,
    tls_pkcs12_path: Option<String>,
    tls_pkcs12_password: Option<String>,
}

/// Fully resolved server configuration: a [`BrokerConfig`] plus the
/// hosting glue settings (§1: "out of scope... through interfaces")
/// that spec.md leaves to this binary crate.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Configuration handed to `vibemq_broker::Broker::new`.
    pub broker: BrokerConfig,
    /// Port the health/metrics HTTP sidecar binds.
    pub health_port: u16,
}

/// Failure loading or validating the layered configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The `config` crate failed to load or merge a source.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// The resolved [`BrokerConfig`] failed its own validation.
    #[error("invalid broker configuration: {0}")]
    InvalidBroker(String),
}

/// Load configuration from (in increasing precedence) built-in defaults,
/// an optional TOML file, `VIBEMQ_*` environment variables, and finally
/// the parsed CLI flags in `args`.
pub fn load(args: &Args) -> Result<ServerConfig, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(config::Environment::with_prefix("VIBEMQ").try_parsing(true));

    let raw: RawConfig = builder.build()?.try_deserialize().unwrap_or_default();

    let defaults = BrokerConfig::default();
    let mut config_builder = BrokerConfig::builder()
        .with_port(args.port.or(raw.port).unwrap_or(defaults.port))
        .with_auto_create_queues(raw.auto_create_queues.unwrap_or(defaults.auto_create_queues))
        .with_max_frame_size(raw.max_frame_size.unwrap_or(defaults.max_frame_size))
        .with_max_connections(
            args.max_connections
                .or(raw.max_connections)
                .unwrap_or(defaults.max_connections),
        )
        .with_message_rate_cap(raw.message_rate_cap.unwrap_or(defaults.message_rate_cap));

    if let Some(secs) = raw.connection_rate_window_secs {
        let cap = raw.connection_rate_cap.unwrap_or(defaults.connection_rate_cap);
        config_builder = config_builder.with_connection_rate_limit(Duration::from_secs(secs), cap);
    }

    if let Some(secs) = raw.shutdown_grace_period_secs {
        config_builder = config_builder.with_shutdown_grace_period(Duration::from_secs(secs));
    }

    if let Some(token) = args.auth_token.clone().or(raw.auth_token) {
        config_builder = config_builder.with_auth_token(token);
    }

    let tls_path = args
        .tls_pkcs12
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .or(raw.tls_pkcs12_path);
    if let Some(path) = tls_path {
        let password = args
            .tls_pkcs12_password
            .clone()
            .or(raw.tls_pkcs12_password)
            .unwrap_or_default();
        config_builder = config_builder.with_tls(path, password);
    }

    let broker = config_builder
        .build()
        .map_err(ConfigError::InvalidBroker)?;

    let health_port = args
        .health_port
        .or(raw.health_port)
        .unwrap_or(DEFAULT_HEALTH_PORT);

    Ok(ServerConfig { broker, health_port })
}
