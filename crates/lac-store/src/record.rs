use lac_types::{decode_record, encode, InvokeResult, Record};

use crate::traits::LedgerAccessor;

/// Typed record access on top of any [`LedgerAccessor`].
pub trait RecordAccess: LedgerAccessor {
    /// Read and decode the record under `key`.
    ///
    /// `Ok(None)` when the key is absent or the stored record's presence
    /// field is empty.
    fn get_record<T: Record>(&mut self, key: &str) -> InvokeResult<Option<T>> {
        let bytes = self.get(key)?;
        Ok(decode_record(bytes.as_deref())?)
    }

    /// Encode and write `record` under `key`, replacing any previous value.
    fn put_record<T: Record>(&mut self, key: &str, record: &T) -> InvokeResult<()> {
        let bytes = encode(record)?;
        self.put(key, bytes)?;
        Ok(())
    }
}

impl<A: LedgerAccessor + ?Sized> RecordAccess for A {}
