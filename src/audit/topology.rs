//! Cluster topology: which master owns which slot range.
//!
//! The topology is read once per run from any reachable node and is immutable
//! afterwards. Masters are identified by the `ip:port` they advertise; that id
//! joins slot assignments to scan results.

use std::collections::HashSet;
use std::future::Future;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::audit::error::AuditError;
use crate::client::types::{ClusterSlotsEntry, NodeAddress};
use crate::slots::{SlotRange, check_coverage};

/// Source of `CLUSTER SLOTS` entries.
pub trait TopologySource {
    /// Query the slot assignment from one node.
    fn cluster_slots(
        &self,
    ) -> impl Future<Output = Result<Vec<ClusterSlotsEntry>, AuditError>> + Send;
}

/// Canonical master identity, `"ip:port"` as advertised by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MasterId(String);

impl MasterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&NodeAddress> for MasterId {
    fn from(addr: &NodeAddress) -> Self {
        Self(addr.to_string())
    }
}

impl std::fmt::Display for MasterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How per-master connections are addressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Routing {
    /// Connect to each master's advertised host and port.
    #[default]
    Direct,
    /// Connect to this host for every master, keeping each master's port.
    /// Used behind a load balancer or TLS terminator.
    Entrypoint(String),
}

impl Routing {
    /// Host to dial for a master advertised at `advertised`.
    pub fn host_for<'a>(&'a self, advertised: &'a str) -> &'a str {
        match self {
            Routing::Direct => advertised,
            Routing::Entrypoint(host) => host,
        }
    }
}

/// A master discovered in the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEndpoint {
    /// Advertised `ip:port`.
    pub id: MasterId,
    /// Advertised host.
    pub host: String,
    /// Advertised port.
    pub port: u16,
    /// Host actually dialled, after applying [`Routing`].
    pub connect_host: String,
}

impl MasterEndpoint {
    /// Build an endpoint for an advertised address.
    pub fn new(address: &NodeAddress, routing: &Routing) -> Self {
        Self {
            id: MasterId::from(address),
            host: address.host.clone(),
            port: address.port,
            connect_host: routing.host_for(&address.host).to_string(),
        }
    }

    /// `(host, port)` to open a connection to.
    pub fn connect_address(&self) -> (&str, u16) {
        (&self.connect_host, self.port)
    }
}

/// A slot range and the master that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub range: SlotRange,
    pub master_id: MasterId,
}

impl SlotAssignment {
    pub fn new(start: u16, end: u16, master_id: impl Into<String>) -> Self {
        Self {
            range: SlotRange::new(start, end),
            master_id: MasterId::new(master_id),
        }
    }
}

/// Slot assignments plus the distinct masters they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    /// Assignments in the order the cluster reported them.
    pub assignments: Vec<SlotAssignment>,
    /// Distinct masters in first-seen order.
    pub masters: Vec<MasterEndpoint>,
}

impl Topology {
    /// Build a topology from parsed `CLUSTER SLOTS` entries.
    pub fn from_entries(entries: &[ClusterSlotsEntry], routing: &Routing) -> Self {
        let mut seen = HashSet::new();
        let mut topology = Topology::default();

        for entry in entries {
            let endpoint = MasterEndpoint::new(&entry.master, routing);
            topology.assignments.push(SlotAssignment {
                range: entry.range,
                master_id: endpoint.id.clone(),
            });
            if seen.insert(endpoint.id.clone()) {
                topology.masters.push(endpoint);
            }
        }

        topology
    }
}

/// Reads the slot assignment from the cluster.
pub struct TopologyReader<'a, S> {
    source: &'a S,
    routing: Routing,
}

impl<'a, S: TopologySource> TopologyReader<'a, S> {
    pub fn new(source: &'a S, routing: Routing) -> Self {
        Self { source, routing }
    }

    /// Query the cluster once and build the [`Topology`].
    ///
    /// Any error here is fatal for the run. Gaps or overlaps in the reported
    /// ranges are logged but do not fail the read.
    #[instrument(skip(self), fields(routing = ?self.routing))]
    pub async fn read(&self) -> Result<Topology, AuditError> {
        let entries = self.source.cluster_slots().await?;
        let topology = Topology::from_entries(&entries, &self.routing);

        let coverage = check_coverage(topology.assignments.iter().map(|a| &a.range));
        if !coverage.is_partition() {
            warn!(
                unassigned_slots = coverage.unassigned_slots(),
                unassigned = ?coverage.unassigned,
                overlapping = ?coverage.overlapping,
                "Slot ranges do not partition the slot space"
            );
        }

        for master in &topology.masters {
            debug!(master = %master.id, connect_host = %master.connect_host, "Discovered master");
        }
        info!(
            ranges = topology.assignments.len(),
            masters = topology.masters.len(),
            "Read cluster topology"
        );

        Ok(topology)
    }
}
