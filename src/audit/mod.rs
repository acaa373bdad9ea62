//! Slot distribution audit.
//!
//! A run has three steps:
//!
//! 1. [`topology`]: read slot ranges and their masters from one node
//! 2. [`census`]: scan every master and count keys per slot
//! 3. [`reconcile`]: sum the slot counts over each range
//!
//! The cluster is only reached through the [`TopologySource`], [`NodeConnector`]
//! and [`KeyScanner`] traits, so the whole flow runs against in-memory mocks in
//! tests.

pub mod census;
pub mod error;
pub mod reconcile;
pub mod report;
pub mod topology;

pub use census::{
    CURSOR_START, CensusOptions, CensusReport, DEFAULT_BATCH_SIZE, KeyCensus, KeyScanner,
    MasterScan, NodeConnector, ScanState, key_batches,
};
pub use error::AuditError;
pub use reconcile::{MasterSummary, RangeReport, mark_incomplete, reconcile, summarize_masters};
pub use report::AuditReport;
pub use topology::{
    MasterEndpoint, MasterId, Routing, SlotAssignment, Topology, TopologyReader, TopologySource,
};
