//! Fold per-slot counts into per-range totals.
//!
//! Reconciliation never touches keys: all per-key work happened during the
//! census. Range totals come from a prefix-sum over the 16384 slot counters, so
//! the cost is bounded by the slot space plus the number of ranges.

use serde::Serialize;

use crate::audit::census::MasterScan;
use crate::audit::topology::{MasterId, SlotAssignment};
use crate::slots::SlotCounts;

/// One row of the audit: a slot range and how many keys it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeReport {
    pub start: u16,
    pub end: u16,
    pub num_slots: u32,
    pub keys_in_range: u64,
    pub master_id: MasterId,
    /// False when the owning master's scan did not finish; `keys_in_range`
    /// is then a lower bound.
    pub complete: bool,
}

/// Sum the counts of every assigned range, preserving assignment order.
///
/// # Examples
///
/// ```
/// use valkey_slot_audit::audit::{SlotAssignment, reconcile};
/// use valkey_slot_audit::slots::SlotCounts;
///
/// let mut counts = SlotCounts::new();
/// counts.increment(5);
/// counts.increment(9000);
///
/// let rows = reconcile(
///     &[SlotAssignment::new(0, 8191, "m1"), SlotAssignment::new(8192, 16383, "m2")],
///     &counts,
/// );
/// assert_eq!(rows[0].keys_in_range, 1);
/// assert_eq!(rows[1].keys_in_range, 1);
/// ```
pub fn reconcile(assignments: &[SlotAssignment], counts: &SlotCounts) -> Vec<RangeReport> {
    let sums = counts.range_sums();
    assignments
        .iter()
        .map(|a| RangeReport {
            start: a.range.start,
            end: a.range.end,
            num_slots: a.range.count(),
            keys_in_range: sums.sum(a.range),
            master_id: a.master_id.clone(),
            complete: true,
        })
        .collect()
}

/// Flag rows whose master did not finish scanning.
pub fn mark_incomplete(rows: &mut [RangeReport], scans: &[MasterScan]) {
    for row in rows.iter_mut() {
        row.complete = scans
            .iter()
            .find(|s| s.master_id == row.master_id)
            .is_some_and(|s| s.state.is_complete());
    }
}

/// Totals per master, for spotting hot or empty masters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterSummary {
    pub master_id: MasterId,
    /// Number of ranges the master owns.
    pub ranges: usize,
    pub slots: u32,
    pub keys: u64,
    /// Fraction of all counted keys held by this master, 0.0 when there are none.
    pub share: f64,
}

/// Aggregate rows by master, in first-seen order.
pub fn summarize_masters(rows: &[RangeReport]) -> Vec<MasterSummary> {
    let mut summaries: Vec<MasterSummary> = Vec::new();
    for row in rows {
        let idx = match summaries.iter().position(|s| s.master_id == row.master_id) {
            Some(idx) => idx,
            None => {
                summaries.push(MasterSummary {
                    master_id: row.master_id.clone(),
                    ranges: 0,
                    slots: 0,
                    keys: 0,
                    share: 0.0,
                });
                summaries.len() - 1
            }
        };
        let Some(summary) = summaries.get_mut(idx) else {
            continue;
        };
        summary.ranges += 1;
        summary.slots += row.num_slots;
        summary.keys += row.keys_in_range;
    }

    let total: u64 = summaries.iter().map(|s| s.keys).sum();
    if total > 0 {
        for s in &mut summaries {
            s.share = s.keys as f64 / total as f64;
        }
    }
    summaries
}
