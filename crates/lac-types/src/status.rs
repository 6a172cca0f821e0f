use std::fmt;

use serde::{Deserialize, Serialize};

/// Uniform result classification returned alongside every domain result.
///
/// Serializes as its numeric code so envelopes read `{"status": 404, ...}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Status {
    Ok,
    Created,
    BadRequest,
    NotFound,
    NotAllowed,
    Conflict,
}

impl Status {
    /// Numeric code of this status.
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::NotAllowed => 405,
            Self::Conflict => 409,
        }
    }

    /// Returns `true` for `200` and `201`.
    ///
    /// Only successful results have their writes committed.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Created)
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl TryFrom<u16> for Status {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(Self::Ok),
            201 => Ok(Self::Created),
            400 => Ok(Self::BadRequest),
            404 => Ok(Self::NotFound),
            405 => Ok(Self::NotAllowed),
            409 => Ok(Self::Conflict),
            other => Err(format!("unsupported status code {other}")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "Ok",
            Self::Created => "Created",
            Self::BadRequest => "BadRequest",
            Self::NotFound => "NotFound",
            Self::NotAllowed => "NotAllowed",
            Self::Conflict => "Conflict",
        };
        write!(f, "{} {label}", self.code())
    }
}
