use lac_types::TxTimestamp;
use serde::{Deserialize, Serialize};

use crate::context::WriteSet;
use crate::error::StoreResult;

/// One entry of a range scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// One past value of a key, as seen by `history_of`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyModification {
    pub value: Vec<u8>,
    pub timestamp: TxTimestamp,
    pub tx_id: String,
}

/// Lazy, oldest-first sequence of a key's committed values.
pub type HistoryIter = Box<dyn Iterator<Item = KeyModification>>;

/// The contract domain handlers consume from the ledger.
///
/// Absence is an expected outcome of `get`, not an error. Writes replace the
/// whole value under the key.
pub trait LedgerAccessor {
    /// Point lookup.
    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Upsert the full value under `key`.
    fn put(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// All entries with `start <= key < end`, ordered by key.
    fn range_scan(&mut self, start: &str, end: &str) -> StoreResult<Vec<KeyValue>>;

    /// Every value ever committed for `key`, oldest first.
    fn history_of(&mut self, key: &str) -> StoreResult<HistoryIter>;

    /// Platform-assigned time of the current invocation.
    fn tx_timestamp(&self) -> TxTimestamp;
}

/// A committed value of one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(with = "utf8_bytes")]
    pub value: Vec<u8>,
    pub committed_at: TxTimestamp,
    pub tx_id: String,
    /// Ledger height of the commit that wrote this value.
    pub height: u64,
}

/// Multi-version backend behind a [`TxContext`](crate::TxContext).
///
/// All `*_at` reads observe the state as of `height`: versions committed at
/// a greater height are invisible.
pub trait VersionedStore: Send + Sync {
    /// Height of the latest commit (`0` for an empty ledger).
    fn height(&self) -> u64;

    /// Latest version of `key` at or below `height`.
    fn get_at(&self, key: &str, height: u64) -> StoreResult<Option<Version>>;

    /// Latest versions of every key in `[start, end)` at or below `height`.
    fn range_at(&self, start: &str, end: &str, height: u64) -> StoreResult<Vec<(String, Version)>>;

    /// Versions of `key` at or below `height`, oldest first.
    fn history_at(&self, key: &str, height: u64) -> StoreResult<Vec<Version>>;

    /// Validate the write set's reads against current state and apply its
    /// writes atomically. Returns the resulting ledger height.
    fn apply(&self, write_set: WriteSet) -> StoreResult<u64>;
}

/// Ledger values are JSON documents; persist them as text.
mod utf8_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let text = std::str::from_utf8(bytes).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        String::deserialize(deserializer).map(String::into_bytes)
    }
}
