//! Key census across all masters.
//!
//! Each master is scanned independently with `SCAN`: every key returned is
//! hashed to its slot and counted. A failure on one master ends that master's
//! scan only; counts gathered before the failure are kept and the run moves on.
//!
//! ## Per-master state machine
//!
//! ```text
//! Idle -> Scanning -> Done        (cursor returned to 0)
//!                  -> Failed      (connection or protocol error, never retried)
//!                  -> Cancelled   (cancellation observed between batches)
//! ```
//!
//! Keys returned more than once by `SCAN` are counted every time they appear.

use std::future::Future;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::audit::error::AuditError;
use crate::audit::topology::{MasterEndpoint, MasterId};
use crate::client::types::ScanPage;
use crate::slots::{KeyIndex, SlotCounts, SlotHasher};

/// Cursor value that both starts and ends a `SCAN` iteration.
pub const CURSOR_START: u64 = 0;

/// Default `COUNT` hint for each `SCAN` call.
pub const DEFAULT_BATCH_SIZE: u32 = 1000;

/// Cursor-based key enumeration on one node.
pub trait KeyScanner {
    /// Fetch one page starting at `cursor`.
    fn scan(
        &self,
        cursor: u64,
        count: u32,
    ) -> impl Future<Output = Result<ScanPage, AuditError>> + Send;

    /// Close the connection once scanning is over.
    fn release(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Opens scanner connections to masters.
pub trait NodeConnector {
    type Scanner: KeyScanner;

    /// Connect to `endpoint`, honouring its routed connect address.
    fn connect(
        &self,
        endpoint: &MasterEndpoint,
    ) -> impl Future<Output = Result<Self::Scanner, AuditError>> + Send;
}

/// Stream the keys of one node in batches.
///
/// The stream is lazy, finite and cannot be restarted: it issues one `SCAN` per
/// item, stops after the page whose cursor is [`CURSOR_START`], and stops after
/// yielding the first error.
pub fn key_batches<S: KeyScanner>(
    scanner: &S,
    batch_size: u32,
) -> impl Stream<Item = Result<Vec<Bytes>, AuditError>> + '_ {
    stream::unfold(Some(CURSOR_START), move |cursor| async move {
        let cursor = cursor?;
        match scanner.scan(cursor, batch_size).await {
            Ok(page) => {
                let next = (page.cursor != CURSOR_START).then_some(page.cursor);
                Some((Ok(page.keys), next))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Census settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusOptions {
    /// `COUNT` hint per `SCAN` call.
    pub batch_size: u32,
    /// Masters scanned at the same time. `1` scans sequentially.
    pub concurrency: usize,
    /// Keep every key name, grouped by slot.
    pub collect_keys: bool,
}

impl Default for CensusOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
            collect_keys: false,
        }
    }
}

/// Where a master scan ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Scanning,
    Done,
    Failed(AuditError),
    Cancelled,
}

impl ScanState {
    /// True when every key present at scan time was visited.
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanState::Done)
    }

    fn fail(err: &AuditError) -> Self {
        match err {
            AuditError::Cancelled => ScanState::Cancelled,
            e => ScanState::Failed(e.clone()),
        }
    }
}

/// Outcome of scanning one master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterScan {
    pub master_id: MasterId,
    pub state: ScanState,
    /// Keys hashed and counted.
    pub keys_counted: u64,
    /// Keys skipped because they are not valid UTF-8.
    pub unrepresentable_keys: u64,
    /// `SCAN` pages received.
    pub batches: u64,
}

impl MasterScan {
    fn idle(master_id: MasterId) -> Self {
        Self {
            master_id,
            state: ScanState::Idle,
            keys_counted: 0,
            unrepresentable_keys: 0,
            batches: 0,
        }
    }
}

/// Aggregated census output.
#[derive(Debug, Clone, Default)]
pub struct CensusReport {
    /// Keys per slot across all masters.
    pub counts: SlotCounts,
    /// Key names per slot, when collection was enabled.
    pub key_index: Option<KeyIndex>,
    /// One entry per master, in input order.
    pub scans: Vec<MasterScan>,
}

impl CensusReport {
    /// Scans that did not reach `Done`.
    pub fn incomplete(&self) -> impl Iterator<Item = &MasterScan> {
        self.scans.iter().filter(|s| !s.state.is_complete())
    }

    /// Scan outcome for `id`.
    pub fn scan_of(&self, id: &MasterId) -> Option<&MasterScan> {
        self.scans.iter().find(|s| &s.master_id == id)
    }

    pub fn unrepresentable_keys(&self) -> u64 {
        self.scans.iter().map(|s| s.unrepresentable_keys).sum()
    }
}

/// One master's contribution before merging.
struct MasterShard {
    scan: MasterScan,
    counts: SlotCounts,
    key_index: Option<KeyIndex>,
}

/// Counts keys per slot across a set of masters.
pub struct KeyCensus<'a, C, H> {
    connector: &'a C,
    hasher: &'a H,
    options: CensusOptions,
}

impl<'a, C, H> KeyCensus<'a, C, H>
where
    C: NodeConnector,
    H: SlotHasher,
{
    pub fn new(connector: &'a C, hasher: &'a H, options: CensusOptions) -> Self {
        Self {
            connector,
            hasher,
            options,
        }
    }

    /// Scan every master and merge the per-master counts.
    ///
    /// Never fails as a whole: per-master errors are recorded in
    /// [`CensusReport::scans`]. Once `cancel` fires, running scans stop after
    /// their current batch and masters not yet started are marked cancelled.
    #[instrument(skip_all, fields(masters = masters.len(), concurrency = self.options.concurrency))]
    pub async fn run(&self, masters: &[MasterEndpoint], cancel: &CancellationToken) -> CensusReport {
        let concurrency = self.options.concurrency.max(1);
        let shards: Vec<MasterShard> = stream::iter(masters)
            .map(|master| self.scan_master(master, cancel))
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = CensusReport {
            key_index: self.options.collect_keys.then(KeyIndex::new),
            ..Default::default()
        };
        for shard in shards {
            report.counts.merge(&shard.counts);
            if let (Some(index), Some(shard_index)) = (report.key_index.as_mut(), shard.key_index)
            {
                index.merge(shard_index);
            }
            report.scans.push(shard.scan);
        }

        let failed = report.incomplete().count();
        info!(
            total_keys = report.counts.total(),
            occupied_slots = report.counts.occupied_slots(),
            failed_masters = failed,
            "Key census complete"
        );
        report
    }

    /// Scan one master into its own shard.
    async fn scan_master(&self, master: &MasterEndpoint, cancel: &CancellationToken) -> MasterShard {
        let mut shard = MasterShard {
            scan: MasterScan::idle(master.id.clone()),
            counts: SlotCounts::new(),
            key_index: self.options.collect_keys.then(KeyIndex::new),
        };

        if cancel.is_cancelled() {
            shard.scan.state = ScanState::Cancelled;
            return shard;
        }

        let (host, port) = master.connect_address();
        debug!(master = %master.id, host, port, "Connecting to master");
        let scanner = match self.connector.connect(master).await {
            Ok(scanner) => scanner,
            Err(e) => {
                error!(master = %master.id, kind = e.kind(), error = %e, "Error scanning master");
                shard.scan.state = ScanState::fail(&e);
                return shard;
            }
        };

        shard.scan.state = ScanState::Scanning;
        let result = self.scan_keys(&scanner, &mut shard, cancel).await;
        scanner.release().await;

        shard.scan.state = match result {
            Ok(()) => ScanState::Done,
            Err(e) => {
                if matches!(e, AuditError::Cancelled) {
                    warn!(master = %master.id, keys = shard.scan.keys_counted, "Scan cancelled");
                } else {
                    error!(
                        master = %master.id,
                        kind = e.kind(),
                        error = %e,
                        keys = shard.scan.keys_counted,
                        "Error scanning master"
                    );
                }
                ScanState::fail(&e)
            }
        };

        if shard.scan.unrepresentable_keys > 0 {
            warn!(
                master = %master.id,
                skipped = shard.scan.unrepresentable_keys,
                "Skipped keys that are not valid UTF-8"
            );
        }
        debug!(
            master = %master.id,
            keys = shard.scan.keys_counted,
            batches = shard.scan.batches,
            state = ?shard.scan.state,
            "Finished master scan"
        );
        shard
    }

    async fn scan_keys<S: KeyScanner>(
        &self,
        scanner: &S,
        shard: &mut MasterShard,
        cancel: &CancellationToken,
    ) -> Result<(), AuditError> {
        let batches = key_batches(scanner, self.options.batch_size.max(1));
        futures::pin_mut!(batches);

        loop {
            if cancel.is_cancelled() {
                return Err(AuditError::Cancelled);
            }
            let Some(batch) = batches.next().await else {
                return Ok(());
            };
            let keys = batch?;
            shard.scan.batches += 1;
            for raw in keys {
                self.count_key(&raw, shard);
            }
        }
    }

    fn count_key(&self, raw: &[u8], shard: &mut MasterShard) {
        let key = match std::str::from_utf8(raw) {
            Ok(key) => key,
            Err(e) => {
                let err = AuditError::Encoding(e.to_string());
                debug!(master = %shard.scan.master_id, error = %err, "Skipping key");
                shard.scan.unrepresentable_keys += 1;
                return;
            }
        };

        let slot = self.hasher.slot(key);
        shard.counts.increment(slot);
        shard.scan.keys_counted += 1;
        if let Some(index) = shard.key_index.as_mut() {
            index.insert(slot, key);
        }
    }
}
