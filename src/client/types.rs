//! Types for parsed Valkey replies.
//!
//! These types represent the parsed output of the two commands the audit issues:
//! `CLUSTER SLOTS` (topology) and `SCAN` (key enumeration).

use bytes::Bytes;
use fred::types::Value;
use thiserror::Error;

use crate::slots::SlotRange;

/// Errors that can occur when parsing cluster replies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid cluster slots format: {0}")]
    InvalidClusterSlots(String),
    #[error("Invalid slot range: {0}")]
    InvalidSlotRange(String),
    #[error("Invalid scan reply: {0}")]
    InvalidScanReply(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Address a node advertises to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    /// IP address or hostname.
    pub host: String,
    /// Client port.
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse the `[host, port, id, ...]` array used for each node in `CLUSTER SLOTS`.
    fn parse(value: &Value) -> Result<Self, ParseError> {
        let Value::Array(fields) = value else {
            return Err(ParseError::InvalidClusterSlots(format!(
                "Node entry is not an array: {:?}",
                value
            )));
        };

        let host = fields
            .first()
            .and_then(Value::as_str)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty() && h != "?")
            .ok_or_else(|| ParseError::MissingField("master host".to_string()))?;

        let port = fields
            .get(1)
            .ok_or_else(|| ParseError::MissingField("master port".to_string()))?;
        let port = port
            .as_i64()
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p > 0)
            .ok_or_else(|| ParseError::InvalidClusterSlots(format!("Invalid port: {:?}", port)))?;

        Ok(NodeAddress { host, port })
    }
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One entry of `CLUSTER SLOTS`: a slot range and the master serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSlotsEntry {
    /// Slots covered by this entry.
    pub range: SlotRange,
    /// Master serving the range.
    pub master: NodeAddress,
    /// Replicas of the master, when the node reports them.
    pub replicas: Vec<NodeAddress>,
}

impl ClusterSlotsEntry {
    /// Parse a single `[start, end, master, replica...]` entry.
    pub fn parse(value: &Value) -> Result<Self, ParseError> {
        let Value::Array(fields) = value else {
            return Err(ParseError::InvalidClusterSlots(format!(
                "Entry is not an array: {:?}",
                value
            )));
        };

        let bound = |idx: usize, name: &str| -> Result<i64, ParseError> {
            fields
                .get(idx)
                .ok_or_else(|| ParseError::MissingField(name.to_string()))?
                .as_i64()
                .ok_or_else(|| ParseError::InvalidSlotRange(format!("Invalid {}", name)))
        };
        let start = bound(0, "slot start")?;
        let end = bound(1, "slot end")?;
        let range = SlotRange::try_new(start, end)
            .ok_or_else(|| ParseError::InvalidSlotRange(format!("{}-{}", start, end)))?;

        let master = fields
            .get(2)
            .ok_or_else(|| ParseError::MissingField("master address".to_string()))
            .and_then(NodeAddress::parse)?;

        let replicas = fields
            .iter()
            .skip(3)
            .filter_map(|v| NodeAddress::parse(v).ok())
            .collect();

        Ok(ClusterSlotsEntry {
            range,
            master,
            replicas,
        })
    }
}

/// Parse the full output of `CLUSTER SLOTS`, preserving reply order.
pub fn parse_cluster_slots(value: &Value) -> Result<Vec<ClusterSlotsEntry>, ParseError> {
    match value {
        Value::Array(entries) => entries.iter().map(ClusterSlotsEntry::parse).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(ParseError::InvalidClusterSlots(format!(
            "Expected array reply, got {:?}",
            other
        ))),
    }
}

/// One page of a `SCAN` iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` once the iteration is complete.
    pub cursor: u64,
    /// Raw key names in this page.
    pub keys: Vec<Bytes>,
}

impl ScanPage {
    /// Parse a `[cursor, [key...]]` reply.
    pub fn parse(value: Value) -> Result<Self, ParseError> {
        let Value::Array(mut fields) = value else {
            return Err(ParseError::InvalidScanReply(
                "Expected two-element array".to_string(),
            ));
        };
        if fields.len() != 2 {
            return Err(ParseError::InvalidScanReply(format!(
                "Expected two elements, got {}",
                fields.len()
            )));
        }

        let keys = fields.pop().unwrap_or(Value::Null);
        let cursor = fields.pop().unwrap_or(Value::Null);

        let cursor = cursor
            .as_str()
            .and_then(|c| c.trim().parse::<u64>().ok())
            .ok_or_else(|| ParseError::InvalidScanReply(format!("Invalid cursor: {:?}", cursor)))?;

        let keys = match keys {
            Value::Array(keys) => keys
                .into_iter()
                .map(key_bytes)
                .collect::<Result<Vec<_>, _>>()?,
            Value::Null => Vec::new(),
            other => {
                return Err(ParseError::InvalidScanReply(format!(
                    "Expected key array, got {:?}",
                    other
                )));
            }
        };

        Ok(ScanPage { cursor, keys })
    }
}

fn key_bytes(value: Value) -> Result<Bytes, ParseError> {
    match value {
        Value::Bytes(b) => Ok(b),
        Value::String(s) => Ok(s.into_inner()),
        other => Err(ParseError::InvalidScanReply(format!(
            "Key is not a bulk string: {:?}",
            other
        ))),
    }
}
