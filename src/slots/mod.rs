//! Pure slot logic for Valkey clusters.
//!
//! Nothing here performs I/O. Hashing keys to slots, describing slot ranges and
//! counting keys per slot are kept apart from the cluster client so they can be
//! tested exhaustively.
//!
//! ## Module Structure
//!
//! - [`hasher`]: CRC-16 key to slot mapping with hash tag support
//! - [`range`]: Slot ranges and coverage checks
//! - [`counts`]: Per-slot counters and the optional key index

pub mod counts;
pub mod hasher;
pub mod range;

pub use counts::{KeyIndex, RangeSums, SlotCounts};
pub use hasher::{ClusterSlotHasher, SlotHasher, crc16, hash_tag, key_slot, key_slot_bytes};
pub use range::{MAX_SLOT, SlotCoverage, SlotRange, TOTAL_SLOTS, check_coverage};
