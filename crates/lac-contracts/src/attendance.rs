//! Attendance log: one record per person and month, one entry per day.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lac_store::{LedgerAccessor, RecordAccess};
use lac_types::{keys, InvokeError, InvokeResult, Record, Response, Status};

use crate::config::AttendanceConfig;
use crate::contract::{expect_args, Command, Contract};
use crate::validators;

/// One day's entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    pub value: String,
    /// The `entryTime` argument exactly as submitted.
    pub created_at: String,
}

/// All entries of one person for one month, keyed by `yyyy-mm-dd`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyEntries {
    /// `yyyy-mm`
    pub month: String,
    pub daily_entries: BTreeMap<String, Entry>,
}

impl MonthlyEntries {
    pub fn empty(month: &str) -> Self {
        Self {
            month: month.to_owned(),
            daily_entries: BTreeMap::new(),
        }
    }
}

impl Record for MonthlyEntries {
    fn presence_field(&self) -> &str {
        &self.month
    }
}

pub struct AttendanceContract {
    config: AttendanceConfig,
}

impl AttendanceContract {
    pub fn new(config: AttendanceConfig) -> Self {
        Self { config }
    }

    /// Record `value` for the day of `entry_time`.
    ///
    /// An existing day entry is only replaced by a non-empty value.
    pub fn put_entry(
        &self,
        ledger: &mut dyn LedgerAccessor,
        id: &str,
        entry_time: &str,
        value: &str,
    ) -> InvokeResult<Response> {
        let time = NaiveDateTime::parse_from_str(entry_time, &self.config.entry_time_format)
            .map_err(|e| InvokeError::invalid("entryTime", entry_time, e))?;
        let month = time.format("%Y-%m").to_string();
        let day = time.format("%Y-%m-%d").to_string();

        let key = keys::monthly_attendance(id, &month);
        let existing: Option<MonthlyEntries> = ledger.get_record(&key)?;
        if !validators::should_write_entry(existing.as_ref(), &day, value) {
            debug!(id, day = %day, "attendance entry already recorded");
            return Ok(Response::error(
                Status::Conflict,
                format!("entry for {day} already recorded"),
            ));
        }

        let mut record = existing.unwrap_or_else(|| MonthlyEntries::empty(&month));
        record.daily_entries.insert(
            day,
            Entry {
                value: value.to_owned(),
                created_at: entry_time.to_owned(),
            },
        );
        ledger.put_record(&key, &record)?;

        Ok(Response::created().with("entries", &record)?)
    }

    /// The month's entries; an empty record carrying `month` when none exist.
    pub fn get_entries(
        &self,
        ledger: &mut dyn LedgerAccessor,
        id: &str,
        month: &str,
    ) -> InvokeResult<Response> {
        let key = keys::monthly_attendance(id, month);
        let record = ledger
            .get_record::<MonthlyEntries>(&key)?
            .unwrap_or_else(|| MonthlyEntries::empty(month));
        Ok(Response::ok().with("entries", &record)?)
    }
}

impl Default for AttendanceContract {
    fn default() -> Self {
        Self::new(AttendanceConfig::default())
    }
}

impl Contract for AttendanceContract {
    fn name(&self) -> &'static str {
        "attendance"
    }

    fn commands(&self) -> Vec<Command<Self>> {
        vec![
            Command::new("putEntry", 3, |c: &Self, ledger, args| {
                let [id, entry_time, value] = expect_args::<3>("putEntry", args)?;
                c.put_entry(ledger, id, entry_time, value)
            }),
            Command::new("getEntries", 2, |c: &Self, ledger, args| {
                let [id, month] = expect_args::<2>("getEntries", args)?;
                c.get_entries(ledger, id, month)
            }),
        ]
    }
}
