//! Per-slot key counters.
//!
//! [`SlotCounts`] is the accumulator filled during the census: one counter per
//! slot, only ever incremented. Each master scan fills its own shard and the
//! shards are merged afterwards, so no counter is shared between tasks.

use std::collections::BTreeMap;

use serde::Serialize;

use super::range::{SlotRange, TOTAL_SLOTS};

/// Number of keys observed per slot. Slots never seen count as zero.
#[derive(Clone, PartialEq, Eq)]
pub struct SlotCounts {
    counts: Box<[u64]>,
}

impl Default for SlotCounts {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SlotCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotCounts")
            .field("occupied_slots", &self.occupied_slots())
            .field("total", &self.total())
            .finish()
    }
}

impl SlotCounts {
    /// Create an empty counter set.
    pub fn new() -> Self {
        Self {
            counts: vec![0; usize::from(TOTAL_SLOTS)].into_boxed_slice(),
        }
    }

    /// Count one key in `slot`. Out-of-range slots are ignored.
    pub fn increment(&mut self, slot: u16) {
        self.add(slot, 1);
    }

    /// Count `n` keys in `slot`.
    pub fn add(&mut self, slot: u16, n: u64) {
        if let Some(c) = self.counts.get_mut(usize::from(slot)) {
            *c += n;
        }
    }

    /// Keys counted in `slot`.
    pub fn get(&self, slot: u16) -> u64 {
        self.counts.get(usize::from(slot)).copied().unwrap_or(0)
    }

    /// Keys counted across all slots.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of slots with at least one key.
    pub fn occupied_slots(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Add every counter of `other` into `self`.
    pub fn merge(&mut self, other: &SlotCounts) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    /// Sum of the counters in `range`, computed directly.
    pub fn sum_range(&self, range: SlotRange) -> u64 {
        let start = usize::from(range.start);
        let end = usize::from(range.end);
        self.counts
            .get(start..=end)
            .map(|s| s.iter().sum())
            .unwrap_or(0)
    }

    /// Build a prefix-sum view for answering many range queries.
    pub fn range_sums(&self) -> RangeSums {
        let mut prefix = Vec::with_capacity(self.counts.len() + 1);
        prefix.push(0u64);
        let mut running = 0u64;
        for c in self.counts.iter() {
            running += c;
            prefix.push(running);
        }
        RangeSums { prefix }
    }
}

/// Prefix sums over [`SlotCounts`]; each range query is O(1).
#[derive(Debug, Clone)]
pub struct RangeSums {
    prefix: Vec<u64>,
}

impl RangeSums {
    /// Sum of the counters in `range`.
    pub fn sum(&self, range: SlotRange) -> u64 {
        let hi = self.prefix.get(usize::from(range.end) + 1);
        let lo = self.prefix.get(usize::from(range.start));
        match (hi, lo) {
            (Some(hi), Some(lo)) => hi.saturating_sub(*lo),
            _ => 0,
        }
    }
}

/// Raw key names grouped by slot, kept only when explicitly requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeyIndex {
    keys: BTreeMap<u16, Vec<String>>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: u16, key: impl Into<String>) {
        self.keys.entry(slot).or_default().push(key.into());
    }

    /// Keys observed in `slot`, in scan order.
    pub fn keys_in(&self, slot: u16) -> &[String] {
        self.keys.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn merge(&mut self, other: KeyIndex) {
        for (slot, mut keys) in other.keys {
            self.keys.entry(slot).or_default().append(&mut keys);
        }
    }

    pub fn len(&self) -> usize {
        self.keys.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `(slot, keys)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &[String])> {
        self.keys.iter().map(|(slot, keys)| (*slot, keys.as_slice()))
    }
}
