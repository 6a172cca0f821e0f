use std::fmt;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Display format for commit and change timestamps.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Compact format used inside generated identifiers.
pub const COMPACT_FORMAT: &str = "%Y%m%d%H%M%S";

/// Transaction time assigned by the platform to one invocation.
///
/// Handlers take every notion of "now" from this value and never from the
/// wall clock, so re-executing a command against the same snapshot with the
/// same timestamp reaches the same decision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxTimestamp(DateTime<Utc>);

impl TxTimestamp {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Timestamp at whole seconds since the UNIX epoch.
    ///
    /// Out-of-range values clamp to the epoch.
    pub fn from_unix(seconds: i64) -> Self {
        Self(Utc.timestamp_opt(seconds, 0).single().unwrap_or_default())
    }

    /// Wall-clock time. Only the runtime calls this, once per invocation.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Render with an arbitrary `chrono` format string.
    ///
    /// `None` when the pattern does not parse.
    pub fn format(&self, fmt: &str) -> Option<String> {
        is_valid_format(fmt).then(|| self.0.format(fmt).to_string())
    }

    /// `2018-07-01 20:32:11 UTC`
    pub fn display_utc(&self) -> String {
        self.0.format(DATE_TIME_FORMAT).to_string()
    }

    /// `20180701203211`
    pub fn compact(&self) -> String {
        self.0.format(COMPACT_FORMAT).to_string()
    }
}

impl fmt::Debug for TxTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxTimestamp({})", self.0.to_rfc3339())
    }
}

impl fmt::Display for TxTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_utc())
    }
}

/// Whether `fmt` is a well-formed `chrono` format string.
///
/// Rendering a malformed pattern panics inside `chrono`.
pub fn is_valid_format(fmt: &str) -> bool {
    StrftimeItems::new(fmt).all(|item| !matches!(item, Item::Error))
}
