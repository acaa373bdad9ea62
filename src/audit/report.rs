//! Audit report assembly and rendering.
//!
//! Supports both a fixed-width text table for operators and JSON for
//! scripts and other tools.

use serde::Serialize;

use crate::audit::census::{CensusReport, MasterScan};
use crate::audit::reconcile::{
    MasterSummary, RangeReport, mark_incomplete, reconcile, summarize_masters,
};
use crate::audit::topology::Topology;
use crate::slots::KeyIndex;

/// Column header of the text table.
pub const TABLE_HEADER: &str = "Slot Range             Num Slots   Keys in Range   Master IP:PORT";

/// Everything the audit found in one run.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// One row per slot range, in topology order.
    pub rows: Vec<RangeReport>,
    /// Totals per master.
    pub masters: Vec<MasterSummary>,
    /// Scan outcome per master.
    pub scans: Vec<MasterScan>,
    /// Keys counted across all masters.
    pub total_keys: u64,
    /// Keys skipped because they are not valid UTF-8.
    pub unrepresentable_keys: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_index: Option<KeyIndex>,
}

impl AuditReport {
    /// Reconcile census counts against the topology.
    pub fn build(topology: &Topology, census: CensusReport) -> Self {
        let mut rows = reconcile(&topology.assignments, &census.counts);
        mark_incomplete(&mut rows, &census.scans);
        let masters = summarize_masters(&rows);

        Self {
            rows,
            masters,
            total_keys: census.counts.total(),
            unrepresentable_keys: census.unrepresentable_keys(),
            scans: census.scans,
            key_index: census.key_index,
        }
    }

    /// True when every master was scanned to completion.
    pub fn is_complete(&self) -> bool {
        self.scans.iter().all(|s| s.state.is_complete())
    }

    /// Scans that failed or were cancelled.
    pub fn failures(&self) -> impl Iterator<Item = &MasterScan> {
        self.scans.iter().filter(|s| !s.state.is_complete())
    }

    /// Render as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render as a human-readable table.
    pub fn to_human(&self) -> String {
        let mut out = String::new();
        out.push_str(TABLE_HEADER);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&format_row(row));
            out.push('\n');
        }

        if !self.masters.is_empty() {
            out.push_str("\nMaster IP:PORT          Ranges   Slots    Keys            Share\n");
            for m in &self.masters {
                out.push_str(&format!(
                    "{:<23} {:<8} {:<8} {:<15} {:.1}%\n",
                    m.master_id.as_str(),
                    m.ranges,
                    m.slots,
                    m.keys,
                    m.share * 100.0
                ));
            }
        }

        out.push_str(&format!("\nTotal keys: {}\n", self.total_keys));
        if self.unrepresentable_keys > 0 {
            out.push_str(&format!(
                "Skipped non-UTF-8 keys: {}\n",
                self.unrepresentable_keys
            ));
        }

        let failures: Vec<_> = self.failures().collect();
        if !failures.is_empty() {
            out.push_str("\nIncomplete scans (counts for these masters are partial):\n");
            for scan in failures {
                out.push_str(&format!(
                    "  {}: {} after {} keys\n",
                    scan.master_id,
                    describe_state(scan),
                    scan.keys_counted
                ));
            }
        }

        if let Some(index) = &self.key_index {
            out.push_str("\nKeys by slot:\n");
            for (slot, keys) in index.iter() {
                out.push_str(&format!("  {:<6} {}\n", slot, keys.join(" ")));
            }
        }

        out
    }
}

fn format_row(row: &RangeReport) -> String {
    let line = format!(
        "{:<6}-{:<6}         {:<10} {:<15} {}",
        row.start, row.end, row.num_slots, row.keys_in_range, row.master_id
    );
    if row.complete {
        line
    } else {
        format!("{} (partial)", line)
    }
}

fn describe_state(scan: &MasterScan) -> String {
    use crate::audit::census::ScanState;
    match &scan.state {
        ScanState::Failed(reason) => format!("failed ({})", reason),
        ScanState::Cancelled => "cancelled".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}
