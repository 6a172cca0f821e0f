//! Foundation types for the Ledger Application Core (LAC).
//!
//! This crate provides the vocabulary shared by every LAC crate: how results
//! are classified, how records are encoded into ledger bytes, and how domain
//! identifiers map onto ledger keys.
//!
//! # Key Types
//!
//! - [`Status`] -- Uniform result classification (`200`, `201`, `400`, `404`, `405`, `409`)
//! - [`Response`] -- Status-coded envelope returned by every command
//! - [`InvokeError`] -- Hard/protocol failures that abort an invocation
//! - [`Record`] -- Domain entity stored under one ledger key
//! - [`TxTimestamp`] -- Platform-assigned transaction time
//! - [`Points`] -- Fixed-precision, never-negative point amount

pub mod amount;
pub mod codec;
pub mod error;
pub mod keys;
pub mod response;
pub mod status;
pub mod temporal;

pub use amount::Points;
pub use codec::{decode, decode_record, encode, Record};
pub use error::{CodecError, InvokeError, InvokeResult};
pub use response::Response;
pub use status::Status;
pub use temporal::TxTimestamp;
