//! Command line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! shown in `--help`. The configuration is parsed once in `main` and handed to
//! the components that need it.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};

use crate::audit::{CensusOptions, DEFAULT_BATCH_SIZE, Routing};
use crate::client::{TlsClientConfig, ValkeyClientConfig};

/// Default Valkey port.
pub const DEFAULT_PORT: u16 = 6379;

/// Output format for the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Fixed-width table.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Audit how keys are distributed across the slot ranges of a Valkey cluster.
#[derive(Debug, Clone, Parser)]
#[command(name = "valkey-slot-audit", version, about, long_about = None)]
pub struct AuditConfig {
    /// Any reachable cluster node; also the entrypoint in single-entrypoint mode.
    #[arg(long, env = "REDIS_HOST")]
    pub host: String,

    /// Port of the node given by --host.
    #[arg(long, env = "REDIS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Password used for every connection.
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connect with TLS. Implies --single-entrypoint.
    #[arg(
        long,
        env = "USE_SSL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub tls: bool,

    /// PEM file with CA certificates to trust for TLS.
    #[arg(long, env = "TLS_CA_CERT")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Reach every master through --host, using each master's advertised port.
    #[arg(
        long,
        env = "USE_SINGLE_ENTRYPOINT",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub single_entrypoint: bool,

    /// COUNT hint for each SCAN call.
    #[arg(long, env = "SCAN_COUNT", default_value_t = DEFAULT_BATCH_SIZE,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub scan_count: u32,

    /// Number of masters scanned at the same time.
    #[arg(long, env = "SCAN_CONCURRENCY", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..))]
    pub scan_concurrency: u16,

    /// Connection timeout in seconds.
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Command timeout in seconds.
    #[arg(long, env = "COMMAND_TIMEOUT_SECS", default_value_t = 30)]
    pub command_timeout_secs: u64,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Record every key name per slot and include it in the report.
    #[arg(long)]
    pub key_index: bool,

    /// Emit logs as JSON.
    #[arg(
        long,
        env = "LOG_JSON",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub log_json: bool,
}

impl AuditConfig {
    /// Whether masters are reached through the entrypoint host.
    pub fn uses_single_entrypoint(&self) -> bool {
        self.single_entrypoint || self.tls
    }

    /// Routing rule for per-master connections.
    pub fn routing(&self) -> Routing {
        if self.uses_single_entrypoint() {
            Routing::Entrypoint(self.host.clone())
        } else {
            Routing::Direct
        }
    }

    /// Connection settings shared by the entrypoint and every master.
    pub fn client_config(&self) -> ValkeyClientConfig {
        let mut config = ValkeyClientConfig::default()
            .with_connection_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_command_timeout(Duration::from_secs(self.command_timeout_secs));
        if let Some(ref password) = self.password {
            config = config.with_password(password.clone());
        }
        if self.tls {
            config = config.with_tls(TlsClientConfig {
                ca_cert_path: self.tls_ca_cert.clone(),
            });
        }
        config
    }

    pub fn census_options(&self) -> CensusOptions {
        CensusOptions {
            batch_size: self.scan_count,
            concurrency: usize::from(self.scan_concurrency),
            collect_keys: self.key_index,
        }
    }
}
