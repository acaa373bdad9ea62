//! Valkey client wrapper using the fred crate.
//!
//! Provides a type-safe client for talking to a single cluster node with
//! optional password authentication and TLS. The audit never relies on fred's
//! cluster routing: it reads the topology from one node and then opens one
//! connection per master itself.

use std::path::PathBuf;
use std::time::Duration;

use fred::prelude::*;
use fred::types::{ClusterHash, CustomCommand, Value};
use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::client::types::{ClusterSlotsEntry, ScanPage, parse_cluster_slots};

/// Errors that can occur during Valkey operations.
#[derive(Error, Debug)]
pub enum ValkeyError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Valkey error: {0}")]
    Valkey(#[from] fred::error::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] crate::client::types::ParseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// TLS settings for Valkey connections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsClientConfig {
    /// PEM file with the CA certificate(s) to trust. When absent, the
    /// platform's default roots are used.
    pub ca_cert_path: Option<PathBuf>,
}

/// Settings shared by every connection the audit opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValkeyClientConfig {
    /// Password for authentication.
    pub password: Option<String>,
    /// TLS configuration.
    pub tls: Option<TlsClientConfig>,
    /// Connection timeout.
    pub connection_timeout: Duration,
    /// Command timeout.
    pub command_timeout: Duration,
}

impl Default for ValkeyClientConfig {
    fn default() -> Self {
        Self {
            password: None,
            tls: None,
            connection_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
        }
    }
}

impl ValkeyClientConfig {
    /// Set TLS configuration.
    pub fn with_tls(mut self, tls: TlsClientConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set password.
    pub fn with_password(mut self, password: String) -> Self {
        self.password = Some(password);
        self
    }

    /// Set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Connection to a single Valkey node.
pub struct ValkeyClient {
    client: Client,
    host: String,
    port: u16,
}

impl ValkeyClient {
    /// Connect to one node (not clustered).
    ///
    /// # Arguments
    /// * `host` - Hostname or IP to connect to
    /// * `port` - Port number
    /// * `config` - Password, TLS and timeouts
    #[instrument(skip_all, fields(host = %host, port = %port, tls = config.tls.is_some()))]
    pub async fn connect(
        host: &str,
        port: u16,
        config: &ValkeyClientConfig,
    ) -> Result<Self, ValkeyError> {
        if host.is_empty() {
            return Err(ValkeyError::InvalidConfig("No host provided".to_string()));
        }

        let mut valkey_config = Config {
            server: ServerConfig::Centralized {
                server: Server::new(host, port),
            },
            ..Default::default()
        };

        if let Some(ref password) = config.password {
            valkey_config.password = Some(password.clone());
        }

        if let Some(ref tls) = config.tls {
            valkey_config.tls = Some(build_tls_connector(tls)?.into());
        }

        let command_timeout = config.command_timeout;
        let connection_timeout = config.connection_timeout;

        let client = Builder::from_config(valkey_config)
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .with_connection_config(|conn| {
                conn.connection_timeout = connection_timeout;
                conn.max_command_attempts = 1;
            })
            .build()?;

        debug!("Connecting to Valkey node");
        client.init().await?;
        debug!("Connected to Valkey node");

        Ok(Self {
            client,
            host: host.to_string(),
            port,
        })
    }

    /// Address this client is connected to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Close the connection.
    pub async fn close(&self) -> Result<(), ValkeyError> {
        self.client.quit().await?;
        Ok(())
    }

    /// Execute CLUSTER SLOTS and parse the reply.
    #[instrument(skip(self), fields(node = %self.address()))]
    pub async fn cluster_slots(&self) -> Result<Vec<ClusterSlotsEntry>, ValkeyError> {
        let reply: Value = self.client.cluster_slots().await?;
        let entries = parse_cluster_slots(&reply)?;
        debug!(entries = entries.len(), "Read cluster slots");
        Ok(entries)
    }

    /// Execute one `SCAN cursor COUNT count` step on this node.
    #[instrument(skip(self), level = "trace", fields(node = %self.address()))]
    pub async fn scan_page(&self, cursor: u64, count: u32) -> Result<ScanPage, ValkeyError> {
        let cmd = CustomCommand::new_static("SCAN", ClusterHash::Random, false);
        let args: Vec<Value> = vec![
            cursor.to_string().into(),
            "COUNT".into(),
            i64::from(count).into(),
        ];
        let reply: Value = self.client.custom(cmd, args).await?;
        Ok(ScanPage::parse(reply)?)
    }
}

/// Build a TLS connector.
///
/// With a CA file the connector trusts exactly the certificates in it;
/// otherwise it falls back to fred's default rustls roots.
fn build_tls_connector(tls: &TlsClientConfig) -> Result<TlsConnector, ValkeyError> {
    let Some(ref ca_path) = tls.ca_cert_path else {
        return TlsConnector::default_rustls()
            .map_err(|e| ValkeyError::Connection(format!("TLS error: {}", e)));
    };

    let pem = std::fs::read(ca_path).map_err(|e| {
        ValkeyError::InvalidConfig(format!(
            "Failed to read CA certificate {}: {}",
            ca_path.display(),
            e
        ))
    })?;

    let ca_certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(|e| ValkeyError::Connection(format!("Failed to parse CA certificate: {}", e)))?;
    if ca_certs.is_empty() {
        return Err(ValkeyError::InvalidConfig(format!(
            "No certificates found in {}",
            ca_path.display()
        )));
    }

    let mut root_store = RootCertStore::empty();
    for cert in ca_certs {
        root_store
            .add(cert)
            .map_err(|e| ValkeyError::Connection(format!("Failed to add CA certificate: {}", e)))?;
    }

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(config))
}
