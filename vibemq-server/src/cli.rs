//! Command-line surface for the `vibemq-server` binary.
//!
//! Grounded in the teacher's sibling `airssys-wasm-cli::Cli`: a `clap`
//! derive struct with global flags plus per-run overrides, layered over
//! a config file and environment variables rather than replacing them.

use std::path::PathBuf;

use clap::Parser;

/// VibeMQ broker host: binds the TCP/TLS listener, the HTTP health and
/// metrics sidecar, and wires them to the `vibemq-broker` core.
#[derive(Parser, Debug)]
#[command(name = "vibemq-server")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML configuration file. Missing-but-unspecified is not
    /// an error; only an explicitly named file that fails to load is.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// TCP port the broker listens on. Overrides the config file and
    /// `VIBEMQ_PORT`.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Shared bearer token required on `Connect`. Overrides the config
    /// file and `VIBEMQ_AUTH_TOKEN`. Omit to run without authentication.
    #[arg(long, value_name = "TOKEN")]
    pub auth_token: Option<String>,

    /// Maximum number of concurrently live sessions.
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Path to a PKCS#12 identity bundle. Supplying this enables TLS.
    #[arg(long, value_name = "PATH")]
    pub tls_pkcs12: Option<PathBuf>,

    /// Password protecting the PKCS#12 bundle named by `--tls-pkcs12`.
    #[arg(long, value_name = "PASSWORD", requires = "tls_pkcs12")]
    pub tls_pkcs12_password: Option<String>,

    /// Port the `/health/` and `/metrics/` HTTP sidecar listens on.
    #[arg(long)]
    pub health_port: Option<u16>,

    /// Raise the default log level to `debug`.
    #[arg(short, long)]
    pub verbose: bool,
}
