//! Per-contract settings loaded from TOML.
//!
//! Every table and field is optional; anything left out keeps the
//! deployed default. [`ContractsConfig::from_toml`] validates after parsing.

use serde::{Deserialize, Serialize};

use lac_types::temporal::is_valid_format;

/// Errors raised while loading contract configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for the attendance log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// `chrono` format of the `entryTime` argument.
    pub entry_time_format: String,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            entry_time_format: "%Y-%m-%d %H:%M:%S".into(),
        }
    }
}

/// Settings for the point balance ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointConfig {
    /// Account that receives newly issued points.
    pub admin_user_id: String,
    /// `chrono` format of the period component of transfer-bill keys.
    pub history_month_format: String,
}

impl Default for PointConfig {
    fn default() -> Self {
        Self {
            admin_user_id: "admin".into(),
            history_month_format: "%Y%m".into(),
        }
    }
}

/// Settings for the room reservation toggle.
///
/// Deployments differ in the starting balance of new users (300 in one,
/// 0 in another); both are this machine with a different
/// `initial_balance`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationConfig {
    /// Charged on every successful unlock.
    pub unlock_fee: i64,
    /// Balance given to users created by `putUser`.
    pub initial_balance: i64,
    /// Inclusive start of the `getAllRooms` key range.
    pub room_range_start: String,
    /// Exclusive end of the `getAllRooms` key range.
    pub room_range_end: String,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            unlock_fee: 10,
            initial_balance: 300,
            room_range_start: "Room0".into(),
            room_range_end: "Room999".into(),
        }
    }
}

/// Settings for the authorization-gated locker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    /// Locker created by bootstrap.
    pub default_locker_id: String,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            default_locker_id: "box_0001".into(),
        }
    }
}

/// Settings for equipment rental.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalConfig {
    /// The only account allowed to register equipment.
    pub admin_user_id: String,
    /// `chrono` format of return dates.
    pub return_date_format: String,
}

impl Default for RentalConfig {
    fn default() -> Self {
        Self {
            admin_user_id: "0001_admin".into(),
            return_date_format: "%Y/%m/%d".into(),
        }
    }
}

/// Configuration for every contract, loadable from TOML.
///
/// Missing sections and fields fall back to their defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub attendance: AttendanceConfig,
    pub point: PointConfig,
    pub reservation: ReservationConfig,
    pub locker: LockerConfig,
    pub rental: RentalConfig,
}

impl ContractsConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the machines cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reservation.unlock_fee < 0 {
            return Err(ConfigError::Invalid {
                field: "reservation.unlock_fee",
                reason: "must not be negative".into(),
            });
        }
        if self.reservation.initial_balance < 0 {
            return Err(ConfigError::Invalid {
                field: "reservation.initial_balance",
                reason: "must not be negative".into(),
            });
        }
        if self.point.admin_user_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "point.admin_user_id",
                reason: "must not be empty".into(),
            });
        }
        if self.rental.admin_user_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "rental.admin_user_id",
                reason: "must not be empty".into(),
            });
        }
        if self.locker.default_locker_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "locker.default_locker_id",
                reason: "must not be empty".into(),
            });
        }
        let formats = [
            ("attendance.entry_time_format", &self.attendance.entry_time_format),
            ("point.history_month_format", &self.point.history_month_format),
            ("rental.return_date_format", &self.rental.return_date_format),
        ];
        for (field, fmt) in formats {
            if !is_valid_format(fmt) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("malformed chrono format {fmt:?}"),
                });
            }
        }
        Ok(())
    }
}
