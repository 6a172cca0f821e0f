//! Authorization-gated smart locker.
//!
//! A locker toggles between `locked` and `unlocked`; only users on its
//! allow-list may change it, and re-asserting the current status is refused.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lac_store::{LedgerAccessor, RecordAccess};
use lac_types::{keys, InvokeResult, Record, Response, Status, TxTimestamp};

use crate::config::LockerConfig;
use crate::contract::{expect_args, parse_arg, Command, Contract};
use crate::validators;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockerStatus {
    #[default]
    Locked,
    Unlocked,
}

impl FromStr for LockerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "locked" => Ok(Self::Locked),
            "unlocked" => Ok(Self::Unlocked),
            other => Err(format!("unknown locker status {other:?}")),
        }
    }
}

impl fmt::Display for LockerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// A locker user. Exists once a card has been registered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerUser {
    pub user_id: String,
    pub card_idm_hash: String,
    pub last_change_status_locker_id: String,
}

impl Record for LockerUser {
    fn presence_field(&self) -> &str {
        &self.card_idm_hash
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerData {
    pub locker_id: String,
    pub locker_status: LockerStatus,
    pub last_change_status_time: String,
    pub last_change_status_user_id: String,
    /// Grants accumulate; the same user may appear more than once.
    pub allowed_unlock_user_ids: Vec<String>,
}

impl LockerData {
    /// A locked locker with an empty allow-list.
    pub fn new(locker_id: &str, at: TxTimestamp) -> Self {
        Self {
            locker_id: locker_id.to_owned(),
            locker_status: LockerStatus::Locked,
            last_change_status_time: at.display_utc(),
            last_change_status_user_id: String::new(),
            allowed_unlock_user_ids: Vec::new(),
        }
    }
}

impl Record for LockerData {
    fn presence_field(&self) -> &str {
        &self.locker_id
    }
}

pub struct LockerContract {
    config: LockerConfig,
}

impl LockerContract {
    pub fn new(config: LockerConfig) -> Self {
        Self { config }
    }

    pub fn register_user(
        &self,
        ledger: &mut dyn LedgerAccessor,
        user_id: &str,
        card_idm_hash: &str,
    ) -> InvokeResult<Response> {
        let key = keys::user(user_id);
        if ledger.get_record::<LockerUser>(&key)?.is_some() {
            return Ok(Response::error(
                Status::Conflict,
                format!("user {user_id} already registered"),
            ));
        }

        let user = LockerUser {
            user_id: user_id.to_owned(),
            card_idm_hash: card_idm_hash.to_owned(),
            last_change_status_locker_id: String::new(),
        };
        ledger.put_record(&key, &user)?;
        Ok(Response::ok().with("user_data", &user)?)
    }

    pub fn get_user_data(&self, ledger: &mut dyn LedgerAccessor, user_id: &str) -> InvokeResult<Response> {
        match ledger.get_record::<LockerUser>(&keys::user(user_id))? {
            Some(user) => Ok(Response::ok().with("user_data", &user)?),
            None => Ok(Response::error(Status::NotFound, format!("no user {user_id}"))),
        }
    }

    pub fn get_locker_data(&self, ledger: &mut dyn LedgerAccessor, locker_id: &str) -> InvokeResult<Response> {
        match ledger.get_record::<LockerData>(&keys::locker(locker_id))? {
            Some(locker) => Ok(Response::ok().with("locker_data", &locker)?),
            None => Ok(Response::error(Status::NotFound, format!("no locker {locker_id}"))),
        }
    }

    /// Add `user_id` to the locker's allow-list, creating the locker if needed.
    pub fn give_locker_permission(
        &self,
        ledger: &mut dyn LedgerAccessor,
        user_id: &str,
        locker_id: &str,
    ) -> InvokeResult<Response> {
        let key = keys::locker(locker_id);
        let mut locker = match ledger.get_record::<LockerData>(&key)? {
            Some(locker) => locker,
            None => LockerData::new(locker_id, ledger.tx_timestamp()),
        };
        locker.allowed_unlock_user_ids.push(user_id.to_owned());
        ledger.put_record(&key, &locker)?;

        debug!(user_id, locker_id, grants = locker.allowed_unlock_user_ids.len(), "locker permission granted");
        Ok(Response::ok().with("user_id", &user_id)?)
    }

    pub fn change_locker_status(
        &self,
        ledger: &mut dyn LedgerAccessor,
        user_id: &str,
        locker_id: &str,
        to_status: &str,
    ) -> InvokeResult<Response> {
        let to_status: LockerStatus = parse_arg("toStatus", to_status)?;
        let not_allowed = || {
            Response::error(
                Status::NotAllowed,
                format!("user {user_id} may not operate locker {locker_id}"),
            )
        };

        // Authorization runs against the registered user, never the raw argument.
        let user_key = keys::user(user_id);
        let Some(mut user) = ledger.get_record::<LockerUser>(&user_key)? else {
            return Ok(not_allowed());
        };
        let locker_key = keys::locker(locker_id);
        let locker = ledger.get_record::<LockerData>(&locker_key)?;
        let Some(mut locker) = locker.filter(|l| validators::is_authorized(l, &user.user_id)) else {
            return Ok(not_allowed());
        };
        if !validators::can_change_locker_status(&locker, to_status) {
            return Ok(Response::error(
                Status::Conflict,
                format!("locker {locker_id} is already {to_status}"),
            ));
        }

        user.last_change_status_locker_id = locker.locker_id.clone();

        locker.locker_status = to_status;
        locker.last_change_status_user_id = user.user_id.clone();
        locker.last_change_status_time = ledger.tx_timestamp().display_utc();

        ledger.put_record(&locker_key, &locker)?;
        ledger.put_record(&user_key, &user)?;

        debug!(user_id, locker_id, status = %to_status, "locker status changed");
        Ok(Response::ok().with("locker_data", &locker)?)
    }
}

impl Default for LockerContract {
    fn default() -> Self {
        Self::new(LockerConfig::default())
    }
}

impl Contract for LockerContract {
    fn name(&self) -> &'static str {
        "locker"
    }

    fn commands(&self) -> Vec<Command<Self>> {
        vec![
            Command::new("registerUser", 2, |c: &Self, ledger, args| {
                let [user_id, card_idm_hash] = expect_args::<2>("registerUser", args)?;
                c.register_user(ledger, user_id, card_idm_hash)
            }),
            Command::new("getUserData", 1, |c: &Self, ledger, args| {
                let [user_id] = expect_args::<1>("getUserData", args)?;
                c.get_user_data(ledger, user_id)
            }),
            Command::new("getLockerData", 1, |c: &Self, ledger, args| {
                let [locker_id] = expect_args::<1>("getLockerData", args)?;
                c.get_locker_data(ledger, locker_id)
            }),
            Command::new("giveLockerPermission", 2, |c: &Self, ledger, args| {
                let [user_id, locker_id] = expect_args::<2>("giveLockerPermission", args)?;
                c.give_locker_permission(ledger, user_id, locker_id)
            }),
            Command::new("changeLockerStatus", 3, |c: &Self, ledger, args| {
                let [user_id, locker_id, to_status] = expect_args::<3>("changeLockerStatus", args)?;
                c.change_locker_status(ledger, user_id, locker_id, to_status)
            }),
        ]
    }

    /// Create the default locker if it does not exist yet.
    fn bootstrap(&self, ledger: &mut dyn LedgerAccessor) -> InvokeResult<Response> {
        let locker_id = self.config.default_locker_id.as_str();
        let key = keys::locker(locker_id);
        let locker = match ledger.get_record::<LockerData>(&key)? {
            Some(locker) => locker,
            None => {
                let locker = LockerData::new(locker_id, ledger.tx_timestamp());
                ledger.put_record(&key, &locker)?;
                locker
            }
        };
        Ok(Response::ok().with("locker_data", &locker)?)
    }
}
