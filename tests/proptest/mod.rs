// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for valkey-slot-audit.
//!
//! Uses proptest to generate random keys, counts and layouts and verify the
//! hashing and reconciliation invariants.

use proptest::prelude::*;

use valkey_slot_audit::audit::{SlotAssignment, reconcile, summarize_masters};
use valkey_slot_audit::slots::{
    SlotCounts, SlotRange, TOTAL_SLOTS, crc16, key_slot, key_slot_bytes,
};

/// Strategy for keys that contain no braces.
fn plain_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:._-]{0,24}"
}

/// Strategy for sparse slot counts: up to 64 (slot, count) pairs.
fn slot_counts() -> impl Strategy<Value = SlotCounts> {
    prop::collection::vec((0..TOTAL_SLOTS, 1u64..1000), 0..64).prop_map(|pairs| {
        let mut counts = SlotCounts::new();
        for (slot, n) in pairs {
            counts.add(slot, n);
        }
        counts
    })
}

/// Strategy for a partition of the slot space into 1-11 contiguous ranges,
/// each owned by one of three masters.
fn partition() -> impl Strategy<Value = Vec<SlotAssignment>> {
    prop::collection::btree_set(1..TOTAL_SLOTS, 0..11).prop_flat_map(|cuts| {
        let mut bounds = vec![0u16];
        bounds.extend(cuts);
        bounds.push(TOTAL_SLOTS);
        let ranges: Vec<(u16, u16)> = bounds.windows(2).map(|w| (w[0], w[1] - 1)).collect();
        let n = ranges.len();
        prop::collection::vec(0..3usize, n).prop_map(move |owners| {
            ranges
                .iter()
                .zip(owners)
                .map(|(&(start, end), owner)| {
                    SlotAssignment::new(start, end, format!("10.0.0.{}:6379", owner + 1))
                })
                .collect()
        })
    })
}

proptest! {
    /// Every key maps into the slot space.
    #[test]
    fn slot_is_in_range(key in any::<Vec<u8>>()) {
        prop_assert!(key_slot_bytes(&key) < TOTAL_SLOTS);
    }

    /// Hashing is a pure function of the key.
    #[test]
    fn slot_is_deterministic(key in ".*") {
        prop_assert_eq!(key_slot(&key), key_slot(&key));
    }

    /// Keys sharing a non-empty tag share a slot with the tag itself.
    #[test]
    fn tagged_keys_colocate(
        tag in "[a-z0-9]{1,12}",
        prefix in plain_key(),
        suffix in ".*",
    ) {
        let key = format!("{}{{{}}}{}", prefix, tag, suffix);
        prop_assert_eq!(key_slot(&key), key_slot(&tag));
    }

    /// An empty tag or an unclosed brace hashes the whole key.
    #[test]
    fn degenerate_tags_hash_whole_key(prefix in plain_key(), suffix in plain_key()) {
        let empty = format!("{}{{}}{}", prefix, suffix);
        prop_assert_eq!(key_slot(&empty), crc16(empty.as_bytes()) % TOTAL_SLOTS);

        let unclosed = format!("{}{{{}", prefix, suffix);
        prop_assert_eq!(key_slot(&unclosed), crc16(unclosed.as_bytes()) % TOTAL_SLOTS);
    }

    /// Prefix sums agree with summing slot by slot.
    #[test]
    fn prefix_sums_match_direct_sums(
        counts in slot_counts(),
        a in 0..TOTAL_SLOTS,
        b in 0..TOTAL_SLOTS,
    ) {
        let range = SlotRange::new(a.min(b), a.max(b));
        let direct: u64 = range.iter().map(|s| counts.get(s)).sum();
        prop_assert_eq!(counts.range_sums().sum(range), direct);
        prop_assert_eq!(counts.sum_range(range), direct);
    }

    /// Over a partition, range totals add up to the overall total.
    #[test]
    fn reconcile_preserves_total(counts in slot_counts(), assignments in partition()) {
        let rows = reconcile(&assignments, &counts);
        prop_assert_eq!(rows.len(), assignments.len());

        let keys: u64 = rows.iter().map(|r| r.keys_in_range).sum();
        prop_assert_eq!(keys, counts.total());

        let slots: u32 = rows.iter().map(|r| r.num_slots).sum();
        prop_assert_eq!(slots, u32::from(TOTAL_SLOTS));

        let summaries = summarize_masters(&rows);
        let master_keys: u64 = summaries.iter().map(|s| s.keys).sum();
        prop_assert_eq!(master_keys, counts.total());
        if counts.total() > 0 {
            let share: f64 = summaries.iter().map(|s| s.share).sum();
            prop_assert!((share - 1.0).abs() < 1e-9);
        }
    }
}
