//! Valkey client module.
//!
//! This module provides a type-safe wrapper around the `fred` client for the
//! handful of commands the audit needs. It handles connection management and
//! TLS configuration, and plugs the client into the audit traits.
//!
//! ## Architecture
//!
//! - `valkey_client`: Core client wrapper with TLS support
//! - `types`: Parsed `CLUSTER SLOTS` and `SCAN` replies
//! - `audit_ops`: Audit trait implementations backed by live connections
//!
//! ## Example
//!
//! ```rust,ignore
//! use valkey_slot_audit::client::{ValkeyClient, ValkeyClientConfig};
//!
//! let client = ValkeyClient::connect("127.0.0.1", 6379, &ValkeyClientConfig::default()).await?;
//! for entry in client.cluster_slots().await? {
//!     println!("{} -> {}", entry.range, entry.master);
//! }
//! ```

pub mod audit_ops;
pub mod types;
pub mod valkey_client;

pub use audit_ops::ValkeyConnector;
pub use types::{ClusterSlotsEntry, NodeAddress, ParseError, ScanPage, parse_cluster_slots};
pub use valkey_client::{TlsClientConfig, ValkeyClient, ValkeyClientConfig, ValkeyError};
