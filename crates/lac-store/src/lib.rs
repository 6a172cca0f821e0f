//! Ledger access for the Ledger Application Core.
//!
//! Domain handlers see the ledger only through the [`LedgerAccessor`] trait:
//! point reads, whole-value writes, ordered range scans, and per-key change
//! history. This crate provides that boundary plus the pieces a platform
//! needs to run handlers against it.
//!
//! # Components
//!
//! - [`VersionedStore`] -- backend trait: multi-version key-value state with
//!   snapshot reads and atomic write-set application
//! - [`InMemoryLedger`] -- `BTreeMap`-based backend for tests, the CLI, and embedding
//! - [`TxContext`] -- one invocation's view: snapshot reads, read-set tracking,
//!   buffered writes
//! - [`RecordAccess`] -- typed `get_record` / `put_record` on any accessor
//!
//! # Design Rules
//!
//! 1. Values are replaced whole; there are no partial updates.
//! 2. Nothing is ever deleted; every committed value stays in the key's history.
//! 3. Reads inside one invocation see one snapshot and never observe that
//!    invocation's own pending writes.
//! 4. A write set is applied entirely or not at all.
//! 5. A write set whose reads are no longer current is rejected, never merged.

pub mod context;
pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use context::{TxContext, WriteSet};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryLedger;
pub use record::RecordAccess;
pub use traits::{HistoryIter, KeyModification, KeyValue, LedgerAccessor, Version, VersionedStore};
