use lac_types::InvokeError;

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A key read by the write set has changed since the snapshot was taken.
    #[error("stale read on {key}: read version {read:?}, current version {current:?}")]
    StaleRead {
        key: String,
        read: Option<u64>,
        current: Option<u64>,
    },

    /// Keys must be non-empty.
    #[error("empty key")]
    EmptyKey,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for InvokeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleRead { key, .. } => InvokeError::StaleRead { key },
            other => InvokeError::Store(other.to_string()),
        }
    }
}
