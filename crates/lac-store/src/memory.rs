use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::WriteSet;
use crate::error::{StoreError, StoreResult};
use crate::traits::{Version, VersionedStore};

/// In-memory, `BTreeMap`-based multi-version ledger.
///
/// Intended for tests, the CLI, and embedding. Every key keeps its full
/// version list so history queries and snapshot reads are exact. State sits
/// behind a `RwLock`; write sets are validated and applied under the write
/// lock, which makes each application atomic.
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct LedgerState {
    height: u64,
    keys: BTreeMap<String, Vec<Version>>,
}

impl LedgerState {
    fn latest_height(&self, key: &str) -> Option<u64> {
        self.keys
            .get(key)
            .and_then(|versions| versions.last())
            .map(|v| v.height)
    }
}

fn visible(versions: &[Version], height: u64) -> Option<&Version> {
    versions.iter().rev().find(|v| v.height <= height)
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
        }
    }

    /// Number of keys that have ever been written.
    pub fn key_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").keys.len()
    }

    /// Returns `true` if nothing has ever been committed.
    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("lock poisoned").keys.is_empty()
    }

    /// Latest committed value of `key`.
    pub fn latest(&self, key: &str) -> Option<Vec<u8>> {
        let state = self.inner.read().expect("lock poisoned");
        state
            .keys
            .get(key)
            .and_then(|versions| versions.last())
            .map(|v| v.value.clone())
    }

    /// All keys in order.
    pub fn keys(&self) -> Vec<String> {
        let state = self.inner.read().expect("lock poisoned");
        state.keys.keys().cloned().collect()
    }

    /// Serialize the full ledger, history included, to JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        let state = self.inner.read().expect("lock poisoned");
        serde_json::to_string_pretty(&*state).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Rebuild a ledger from [`Self::to_json`] output.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let state: LedgerState =
            serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            inner: RwLock::new(state),
        })
    }

    /// Load a ledger from a JSON file. A missing file yields an empty ledger.
    pub fn load(path: &Path) -> StoreResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the ledger to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let json = self.to_json()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %path.display(), bytes = json.len(), "ledger saved");
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionedStore for InMemoryLedger {
    fn height(&self) -> u64 {
        self.inner.read().expect("lock poisoned").height
    }

    fn get_at(&self, key: &str, height: u64) -> StoreResult<Option<Version>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state
            .keys
            .get(key)
            .and_then(|versions| visible(versions, height))
            .cloned())
    }

    fn range_at(&self, start: &str, end: &str, height: u64) -> StoreResult<Vec<(String, Version)>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let state = self.inner.read().expect("lock poisoned");
        Ok(state
            .keys
            .range::<str, _>((std::ops::Bound::Included(start), std::ops::Bound::Excluded(end)))
            .filter_map(|(key, versions)| visible(versions, height).map(|v| (key.clone(), v.clone())))
            .collect())
    }

    fn history_at(&self, key: &str, height: u64) -> StoreResult<Vec<Version>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state
            .keys
            .get(key)
            .map(|versions| versions.iter().filter(|v| v.height <= height).cloned().collect())
            .unwrap_or_default())
    }

    fn apply(&self, write_set: WriteSet) -> StoreResult<u64> {
        let mut state = self.inner.write().expect("lock poisoned");

        for (key, read) in &write_set.reads {
            let current = state.latest_height(key);
            if current != *read {
                warn!(tx_id = %write_set.tx_id, key = %key, ?read, ?current, "stale read; write set rejected");
                return Err(StoreError::StaleRead {
                    key: key.clone(),
                    read: *read,
                    current,
                });
            }
        }

        if write_set.writes.is_empty() {
            return Ok(state.height);
        }

        let height = state.height + 1;
        let committed_at = write_set.timestamp.unwrap_or_else(lac_types::TxTimestamp::now);
        let count = write_set.writes.len();
        for (key, value) in write_set.writes {
            state.keys.entry(key).or_default().push(Version {
                value,
                committed_at,
                tx_id: write_set.tx_id.clone(),
                height,
            });
        }
        state.height = height;

        debug!(tx_id = %write_set.tx_id, height, writes = count, "write set applied");
        Ok(height)
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read().expect("lock poisoned");
        f.debug_struct("InMemoryLedger")
            .field("height", &state.height)
            .field("key_count", &state.keys.len())
            .finish()
    }
}
