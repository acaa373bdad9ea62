//! Slot ranges and coverage checks.
//!
//! All functions in this module are pure. The cluster guarantees that the ranges
//! it reports partition the slot space; [`check_coverage`] verifies that so a
//! broken topology is visible in the audit instead of silently skewing totals.

use serde::Serialize;

/// Total number of hash slots in a Valkey cluster.
pub const TOTAL_SLOTS: u16 = 16384;

/// Highest valid slot number.
pub const MAX_SLOT: u16 = TOTAL_SLOTS - 1;

/// A contiguous range of hash slots [start, end] inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotRange {
    /// Start of the slot range (inclusive).
    pub start: u16,
    /// End of the slot range (inclusive).
    pub end: u16,
}

impl SlotRange {
    /// Create a new slot range.
    ///
    /// # Panics
    /// Debug-only assertions check that start <= end and end < TOTAL_SLOTS.
    pub fn new(start: u16, end: u16) -> Self {
        debug_assert!(start <= end, "start ({}) must be <= end ({})", start, end);
        debug_assert!(
            end < TOTAL_SLOTS,
            "end ({}) must be < TOTAL_SLOTS ({})",
            end,
            TOTAL_SLOTS
        );
        Self { start, end }
    }

    /// Create a range from untrusted bounds, e.g. a server reply.
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        let start = u16::try_from(start).ok()?;
        let end = u16::try_from(end).ok()?;
        (start <= end && end <= MAX_SLOT).then_some(Self { start, end })
    }

    /// Create a single-slot range.
    pub fn single(slot: u16) -> Self {
        Self {
            start: slot,
            end: slot,
        }
    }

    /// The full slot space.
    pub fn full() -> Self {
        Self::new(0, MAX_SLOT)
    }

    /// Get the number of slots in this range.
    ///
    /// Returned as `u32` because the full range holds 16384 slots.
    pub fn count(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }

    /// Check if this range contains a specific slot.
    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }

    /// Iterate over all slots in this range.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl std::fmt::Display for SlotRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// How a set of ranges covers the slot space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotCoverage {
    /// Maximal runs of slots that no range claims.
    pub unassigned: Vec<SlotRange>,
    /// Maximal runs of slots claimed by more than one range.
    pub overlapping: Vec<SlotRange>,
}

impl SlotCoverage {
    /// True when the ranges partition the slot space exactly.
    pub fn is_partition(&self) -> bool {
        self.unassigned.is_empty() && self.overlapping.is_empty()
    }

    /// Number of slots not claimed by any range.
    pub fn unassigned_slots(&self) -> u32 {
        self.unassigned.iter().map(SlotRange::count).sum()
    }
}

/// Compute gaps and overlaps of `ranges` over the full slot space.
///
/// # Examples
///
/// ```
/// use valkey_slot_audit::slots::{check_coverage, SlotRange};
///
/// let coverage = check_coverage(&[SlotRange::new(0, 8191), SlotRange::new(8192, 16383)]);
/// assert!(coverage.is_partition());
/// ```
pub fn check_coverage<'a>(ranges: impl IntoIterator<Item = &'a SlotRange>) -> SlotCoverage {
    // Difference array over slot boundaries, one extra cell for end + 1.
    let mut delta = vec![0i32; usize::from(TOTAL_SLOTS) + 1];
    for range in ranges {
        if let Some(d) = delta.get_mut(usize::from(range.start)) {
            *d += 1;
        }
        if let Some(d) = delta.get_mut(usize::from(range.end) + 1) {
            *d -= 1;
        }
    }

    let mut coverage = SlotCoverage::default();
    let mut owners = 0i32;
    for slot in 0..TOTAL_SLOTS {
        owners += delta.get(usize::from(slot)).copied().unwrap_or(0);
        let bucket = match owners {
            0 => &mut coverage.unassigned,
            1 => continue,
            _ => &mut coverage.overlapping,
        };
        extend_run(bucket, slot);
    }
    coverage
}

fn extend_run(runs: &mut Vec<SlotRange>, slot: u16) {
    match runs.last_mut() {
        Some(last) if last.end + 1 == slot => last.end = slot,
        _ => runs.push(SlotRange::single(slot)),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_range_new() {
        let range = SlotRange::new(0, 5461);
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 5461);
    }

    #[test]
    fn test_slot_range_try_new() {
        assert_eq!(SlotRange::try_new(0, 16383), Some(SlotRange::full()));
        assert_eq!(SlotRange::try_new(5, 5), Some(SlotRange::single(5)));
        assert_eq!(SlotRange::try_new(10, 9), None);
        assert_eq!(SlotRange::try_new(0, 16384), None);
        assert_eq!(SlotRange::try_new(-1, 10), None);
    }

    #[test]
    fn test_slot_range_count() {
        assert_eq!(SlotRange::new(0, 5461).count(), 5462);
        assert_eq!(SlotRange::single(100).count(), 1);
        assert_eq!(SlotRange::full().count(), 16384);
    }

    #[test]
    fn test_slot_range_contains() {
        let range = SlotRange::new(100, 200);
        assert!(range.contains(100));
        assert!(range.contains(150));
        assert!(range.contains(200));
        assert!(!range.contains(99));
        assert!(!range.contains(201));
    }

    #[test]
    fn test_slot_range_iter() {
        let range = SlotRange::new(0, 2);
        let slots: Vec<u16> = range.iter().collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn test_slot_range_display() {
        assert_eq!(format!("{}", SlotRange::new(0, 5461)), "0-5461");
        assert_eq!(format!("{}", SlotRange::single(100)), "100");
    }

    #[test]
    fn test_coverage_exact_partition() {
        let ranges = [
            SlotRange::new(0, 5460),
            SlotRange::new(5461, 10922),
            SlotRange::new(10923, 16383),
        ];
        let coverage = check_coverage(&ranges);
        assert!(coverage.is_partition());
        assert_eq!(coverage.unassigned_slots(), 0);
    }

    #[test]
    fn test_coverage_unordered_input() {
        let ranges = [SlotRange::new(8192, 16383), SlotRange::new(0, 8191)];
        assert!(check_coverage(&ranges).is_partition());
    }

    #[test]
    fn test_coverage_reports_gaps() {
        let ranges = [SlotRange::new(1, 100), SlotRange::new(200, 16000)];
        let coverage = check_coverage(&ranges);
        assert_eq!(
            coverage.unassigned,
            vec![
                SlotRange::single(0),
                SlotRange::new(101, 199),
                SlotRange::new(16001, 16383),
            ]
        );
        assert!(coverage.overlapping.is_empty());
        assert_eq!(coverage.unassigned_slots(), 1 + 99 + 383);
    }

    #[test]
    fn test_coverage_reports_overlaps() {
        let ranges = [SlotRange::new(0, 9000), SlotRange::new(8000, 16383)];
        let coverage = check_coverage(&ranges);
        assert!(coverage.unassigned.is_empty());
        assert_eq!(coverage.overlapping, vec![SlotRange::new(8000, 9000)]);
    }

    #[test]
    fn test_coverage_empty_topology() {
        let coverage = check_coverage(&[]);
        assert_eq!(coverage.unassigned, vec![SlotRange::full()]);
    }
}
