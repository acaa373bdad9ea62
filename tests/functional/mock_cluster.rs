//! In-memory cluster used by the functional tests.
//!
//! `MockCluster` plays both roles the audit needs from a live cluster: it is
//! the entrypoint that answers `CLUSTER SLOTS`, and the connector that opens a
//! scanner per master. Replies go through the production parsers so the tests
//! also cover reply decoding.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use fred::types::Value;
use tokio_util::sync::CancellationToken;

use valkey_slot_audit::audit::{
    AuditError, KeyScanner, MasterEndpoint, NodeConnector, TopologySource,
};
use valkey_slot_audit::client::{ClusterSlotsEntry, ScanPage, ValkeyError, parse_cluster_slots};

/// Fault injected into one master.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The connection attempt fails.
    RefuseConnect,
    /// The connection drops after serving this many pages.
    DropAfter(u64),
    /// Every `SCAN` reply is malformed.
    MalformedScan,
    /// Cancel the run right after serving this many pages.
    CancelAfter(u64, CancellationToken),
}

#[derive(Debug, Clone, Default)]
struct MockNode {
    keys: Vec<Bytes>,
    fault: Option<Fault>,
}

/// A cluster of masters held in memory.
#[derive(Debug, Default)]
pub struct MockCluster {
    /// `CLUSTER SLOTS` entries as `(start, end, host, port)`, in reply order.
    slots: Vec<(i64, i64, String, i64)>,
    /// Nodes keyed by advertised `host:port`.
    nodes: HashMap<String, MockNode>,
    connects: Mutex<Vec<(String, u16)>>,
    released: Arc<AtomicUsize>,
}

fn split_addr(addr: &str) -> (String, i64) {
    let (host, port) = addr.rsplit_once(':').expect("address must be host:port");
    (host.to_string(), port.parse().expect("port must be numeric"))
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a master owning `ranges` and holding `keys`.
    pub fn master(mut self, addr: &str, ranges: &[(i64, i64)], keys: &[&str]) -> Self {
        let (host, port) = split_addr(addr);
        for &(start, end) in ranges {
            self.slots.push((start, end, host.clone(), port));
        }
        let node = self.nodes.entry(addr.to_string()).or_default();
        node.keys
            .extend(keys.iter().map(|k| Bytes::copy_from_slice(k.as_bytes())));
        self
    }

    /// Add a key that is not valid UTF-8.
    pub fn raw_key(mut self, addr: &str, key: &'static [u8]) -> Self {
        self.nodes
            .entry(addr.to_string())
            .or_default()
            .keys
            .push(Bytes::from_static(key));
        self
    }

    pub fn fault(mut self, addr: &str, fault: Fault) -> Self {
        self.nodes.entry(addr.to_string()).or_default().fault = Some(fault);
        self
    }

    /// `CLUSTER SLOTS` reply as it arrives on the wire.
    pub fn cluster_slots_reply(&self) -> Value {
        Value::Array(
            self.slots
                .iter()
                .map(|(start, end, host, port)| {
                    Value::Array(vec![
                        Value::from(*start),
                        Value::from(*end),
                        node_value(host, *port),
                    ])
                })
                .collect(),
        )
    }

    /// Every `(host, port)` a connection was opened to, in order.
    pub fn connects(&self) -> Vec<(String, u16)> {
        self.connects.lock().unwrap().clone()
    }

    /// Number of scanner connections released.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// `[host, port, node-id]` as reported for each node in `CLUSTER SLOTS`.
pub fn node_value(host: &str, port: i64) -> Value {
    Value::Array(vec![
        Value::from(host),
        Value::from(port),
        Value::from(format!("{}-{}-id", host, port).as_str()),
    ])
}

fn protocol_error(reply: Value) -> AuditError {
    match ScanPage::parse(reply) {
        Ok(page) => panic!("expected malformed reply, parsed {:?}", page),
        Err(e) => AuditError::from(ValkeyError::from(e)),
    }
}

impl TopologySource for MockCluster {
    async fn cluster_slots(&self) -> Result<Vec<ClusterSlotsEntry>, AuditError> {
        SlotsReply(self.cluster_slots_reply()).cluster_slots().await
    }
}

/// Entrypoint that answers `CLUSTER SLOTS` with a fixed reply.
pub struct SlotsReply(pub Value);

impl TopologySource for SlotsReply {
    async fn cluster_slots(&self) -> Result<Vec<ClusterSlotsEntry>, AuditError> {
        parse_cluster_slots(&self.0).map_err(|e| AuditError::from(ValkeyError::from(e)))
    }
}

impl NodeConnector for MockCluster {
    type Scanner = MockScanner;

    async fn connect(&self, endpoint: &MasterEndpoint) -> Result<MockScanner, AuditError> {
        let (host, port) = endpoint.connect_address();
        self.connects.lock().unwrap().push((host.to_string(), port));

        let node = self
            .nodes
            .get(endpoint.id.as_str())
            .ok_or_else(|| AuditError::Connection(format!("no route to {}", endpoint.id)))?;
        if matches!(node.fault, Some(Fault::RefuseConnect)) {
            return Err(AuditError::Connection("connection refused".to_string()));
        }

        Ok(MockScanner {
            keys: node.keys.clone(),
            fault: node.fault.clone(),
            served: AtomicU64::new(0),
            released: Arc::clone(&self.released),
        })
    }
}

/// Serves a node's keys in cursor order. The cursor is the offset of the next
/// key, `0` once the list is exhausted.
pub struct MockScanner {
    keys: Vec<Bytes>,
    fault: Option<Fault>,
    served: AtomicU64,
    released: Arc<AtomicUsize>,
}

impl KeyScanner for MockScanner {
    async fn scan(&self, cursor: u64, count: u32) -> Result<ScanPage, AuditError> {
        let served = self.served.load(Ordering::SeqCst);
        match &self.fault {
            Some(Fault::DropAfter(n)) if served >= *n => {
                return Err(AuditError::Connection(
                    "connection reset by peer".to_string(),
                ));
            }
            Some(Fault::MalformedScan) => {
                return Err(protocol_error(Value::Array(vec![
                    Value::from("not-a-cursor"),
                    Value::Array(Vec::new()),
                ])));
            }
            _ => {}
        }

        let start = cursor as usize;
        let end = (start + count as usize).min(self.keys.len());
        let keys = self.keys[start.min(end)..end].to_vec();
        let next = if end >= self.keys.len() { 0 } else { end as u64 };
        let served = self.served.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(Fault::CancelAfter(n, token)) = &self.fault
            && served >= *n
        {
            token.cancel();
        }

        Ok(ScanPage { cursor: next, keys })
    }

    async fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
