use thiserror::Error;

/// Errors produced while converting records to and from ledger bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to encode record: {0}")]
    Encode(String),

    #[error("failed to decode record: {0}")]
    Decode(String),
}

/// Hard failures that abort an invocation before anything is committed.
///
/// Business-rule rejections are *not* errors: they are returned as a
/// [`Response`](crate::Response) carrying a non-success
/// [`Status`](crate::Status).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("incorrect number of arguments for {command}: expecting {expected}, got {actual}")]
    BadArgumentCount {
        command: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid argument {name} = {value:?}: {reason}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(String),

    #[error("stale read on key {key}: snapshot is out of date")]
    StaleRead { key: String },
}

impl InvokeError {
    /// Create an invalid-argument error for an unparsable input.
    pub fn invalid(name: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidArgument {
            name,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for command execution.
pub type InvokeResult<T> = Result<T, InvokeError>;
