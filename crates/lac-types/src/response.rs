use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CodecError;
use crate::status::Status;

/// Status-coded envelope returned by every command.
///
/// On the wire the payload fields sit next to `status` (and `message` on
/// rejection), e.g. `{"status": 200, "balance": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Response {
    /// An envelope with the given status and no payload.
    pub fn new(status: Status) -> Self {
        Self {
            status,
            message: None,
            payload: Map::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Status::Ok)
    }

    pub fn created() -> Self {
        Self::new(Status::Created)
    }

    /// A rejection carrying a human-readable message.
    pub fn error(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            payload: Map::new(),
        }
    }

    /// Attach a payload field.
    pub fn with(mut self, field: &str, value: &impl Serialize) -> Result<Self, CodecError> {
        let value = serde_json::to_value(value).map_err(|e| CodecError::Encode(e.to_string()))?;
        self.payload.insert(field.to_owned(), value);
        Ok(self)
    }

    /// Decode a payload field, if present.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CodecError> {
        self.payload
            .get(name)
            .map(|v| serde_json::from_value(v.clone()).map_err(|e| CodecError::Decode(e.to_string())))
            .transpose()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
