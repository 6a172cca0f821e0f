use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when turning input into a [`Points`] amount.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("not a decimal number: {0:?}")]
    Parse(String),

    #[error("amount must not be negative: {0}")]
    Negative(Decimal),
}

/// A fixed-precision, never-negative point amount.
///
/// All arithmetic is checked: an addition that overflows or a subtraction
/// that would go below zero yields `None` instead of a wrapped or negative
/// value. Serialized as a decimal string (`"300.5"`).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Points(Decimal);

impl Points {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value));
        }
        Ok(Self(value.normalize()))
    }

    /// Parse a user-supplied decimal string.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let value =
            Decimal::from_str(input.trim()).map_err(|_| AmountError::Parse(input.to_owned()))?;
        Self::new(value)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(|v| Self(v.normalize()))
    }

    /// Subtract, returning `None` if the result would be negative.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(|v| Self(v.normalize()))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// Signed delta for a credit leg.
    pub fn credit(self) -> Decimal {
        self.0
    }

    /// Signed delta for a debit leg.
    pub fn debit(self) -> Decimal {
        -self.0
    }
}

impl TryFrom<Decimal> for Points {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Points> for Decimal {
    fn from(points: Points) -> Self {
        points.0
    }
}

impl From<u32> for Points {
    fn from(value: u32) -> Self {
        Self(Decimal::from(value))
    }
}

impl fmt::Debug for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Points({})", self.0)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
