//! Audit traits implemented on live Valkey connections.

use tracing::{debug, instrument};

use crate::audit::census::{KeyScanner, NodeConnector};
use crate::audit::error::AuditError;
use crate::audit::topology::{MasterEndpoint, TopologySource};
use crate::client::types::{ClusterSlotsEntry, ScanPage};
use crate::client::valkey_client::{ValkeyClient, ValkeyClientConfig};

impl TopologySource for ValkeyClient {
    async fn cluster_slots(&self) -> Result<Vec<ClusterSlotsEntry>, AuditError> {
        Ok(ValkeyClient::cluster_slots(self).await?)
    }
}

impl KeyScanner for ValkeyClient {
    async fn scan(&self, cursor: u64, count: u32) -> Result<ScanPage, AuditError> {
        Ok(self.scan_page(cursor, count).await?)
    }

    async fn release(&self) {
        if let Err(e) = self.close().await {
            debug!(node = %self.address(), error = %e, "Error closing connection");
        }
    }
}

/// Opens one dedicated connection per master.
#[derive(Debug, Clone, Default)]
pub struct ValkeyConnector {
    config: ValkeyClientConfig,
}

impl ValkeyConnector {
    pub fn new(config: ValkeyClientConfig) -> Self {
        Self { config }
    }
}

impl NodeConnector for ValkeyConnector {
    type Scanner = ValkeyClient;

    #[instrument(skip_all, fields(master = %endpoint.id))]
    async fn connect(&self, endpoint: &MasterEndpoint) -> Result<ValkeyClient, AuditError> {
        let (host, port) = endpoint.connect_address();
        Ok(ValkeyClient::connect(host, port, &self.config).await?)
    }
}
