//! valkey-slot-audit library crate
//!
//! Reports how many keys live in each slot range of a Valkey cluster, so that
//! skewed sharding (hot masters, empty masters, a botched reshard) is easy to
//! spot. The audit is read-only and point-in-time.
//!
//! This module exports the slot logic, the audit pipeline and the Valkey client
//! that drives it.

pub mod audit;
pub mod client;
pub mod config;
pub mod slots;

pub use audit::{AuditError, AuditReport};
pub use config::{AuditConfig, ReportFormat};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use audit::{KeyCensus, TopologyReader};
use client::{ValkeyClient, ValkeyConnector};
use slots::ClusterSlotHasher;

/// Run one audit against a live cluster.
///
/// Connection or protocol errors while reading the topology abort the run.
/// Errors while scanning a master are recorded in the report and the run
/// continues with the next master.
#[instrument(skip_all, fields(host = %config.host, port = config.port))]
pub async fn run_audit(
    config: &AuditConfig,
    cancel: &CancellationToken,
) -> Result<AuditReport, AuditError> {
    let client_config = config.client_config();

    let topology = {
        let entrypoint = ValkeyClient::connect(&config.host, config.port, &client_config).await?;
        let topology = TopologyReader::new(&entrypoint, config.routing()).read().await;
        if let Err(e) = entrypoint.close().await {
            tracing::debug!(error = %e, "Error closing entrypoint connection");
        }
        topology?
    };

    let connector = ValkeyConnector::new(client_config);
    let census = KeyCensus::new(&connector, &ClusterSlotHasher, config.census_options())
        .run(&topology.masters, cancel)
        .await;

    let report = AuditReport::build(&topology, census);
    info!(
        ranges = report.rows.len(),
        total_keys = report.total_keys,
        complete = report.is_complete(),
        "Audit finished"
    );
    Ok(report)
}
