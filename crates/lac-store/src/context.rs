use std::collections::BTreeMap;

use lac_types::TxTimestamp;

use crate::error::{StoreError, StoreResult};
use crate::traits::{HistoryIter, KeyModification, KeyValue, LedgerAccessor, VersionedStore};

/// The reads and writes produced by one invocation.
///
/// `reads` maps every key read to the version height observed (`None` when
/// the key was absent). `writes` holds the last value put per key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSet {
    pub tx_id: String,
    pub timestamp: Option<TxTimestamp>,
    pub snapshot_height: u64,
    pub reads: BTreeMap<String, Option<u64>>,
    pub writes: BTreeMap<String, Vec<u8>>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// One invocation's view of the ledger.
///
/// Reads are served from the snapshot taken at construction and never see
/// this context's own pending writes. Writes are buffered until the caller
/// turns the context into a [`WriteSet`] and hands it to the store.
pub struct TxContext<'a> {
    store: &'a dyn VersionedStore,
    snapshot_height: u64,
    tx_id: String,
    timestamp: TxTimestamp,
    reads: BTreeMap<String, Option<u64>>,
    writes: BTreeMap<String, Vec<u8>>,
}

impl<'a> TxContext<'a> {
    /// Open a context on the store's current height.
    pub fn new(store: &'a dyn VersionedStore, tx_id: impl Into<String>, timestamp: TxTimestamp) -> Self {
        Self {
            snapshot_height: store.height(),
            store,
            tx_id: tx_id.into(),
            timestamp,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Finish the invocation, yielding its read and write sets.
    pub fn into_write_set(self) -> WriteSet {
        WriteSet {
            tx_id: self.tx_id,
            timestamp: Some(self.timestamp),
            snapshot_height: self.snapshot_height,
            reads: self.reads,
            writes: self.writes,
        }
    }
}

impl LedgerAccessor for TxContext<'_> {
    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let version = self.store.get_at(key, self.snapshot_height)?;
        self.reads
            .insert(key.to_owned(), version.as_ref().map(|v| v.height));
        Ok(version.map(|v| v.value))
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        self.writes.insert(key.to_owned(), value);
        Ok(())
    }

    fn range_scan(&mut self, start: &str, end: &str) -> StoreResult<Vec<KeyValue>> {
        let entries = self.store.range_at(start, end, self.snapshot_height)?;
        Ok(entries
            .into_iter()
            .map(|(key, version)| {
                self.reads.insert(key.clone(), Some(version.height));
                KeyValue {
                    key,
                    value: version.value,
                }
            })
            .collect())
    }

    fn history_of(&mut self, key: &str) -> StoreResult<HistoryIter> {
        let versions = self.store.history_at(key, self.snapshot_height)?;
        Ok(Box::new(versions.into_iter().map(|v| KeyModification {
            value: v.value,
            timestamp: v.committed_at,
            tx_id: v.tx_id,
        })))
    }

    fn tx_timestamp(&self) -> TxTimestamp {
        self.timestamp
    }
}
