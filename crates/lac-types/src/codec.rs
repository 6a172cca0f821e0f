//! Conversion between domain records and ledger bytes.
//!
//! Records are stored as JSON. A key that has never been written, a zero
//! length value, and a record whose identifying field is empty all decode to
//! `None`; absence is a first-class case rather than a string comparison
//! repeated in every handler.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// A domain entity stored under one ledger key.
pub trait Record: Serialize + DeserializeOwned {
    /// The field whose emptiness marks the record as not existing.
    ///
    /// Each domain names its own: `user_id` for balances, `equipment_id` for
    /// equipment, `card_idm_hash` for locker users, and so on.
    fn presence_field(&self) -> &str;
}

/// Encode any serializable value to ledger bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode ledger bytes into a value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Decode a possibly-absent ledger value into a record.
///
/// Returns `Ok(None)` when the value is absent, empty, or decodes to a
/// record whose [`Record::presence_field`] is empty.
pub fn decode_record<T: Record>(bytes: Option<&[u8]>) -> Result<Option<T>, CodecError> {
    match bytes {
        None => Ok(None),
        Some([]) => Ok(None),
        Some(bytes) => {
            let record: T = decode(bytes)?;
            if record.presence_field().is_empty() {
                Ok(None)
            } else {
                Ok(Some(record))
            }
        }
    }
}
