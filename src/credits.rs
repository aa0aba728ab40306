use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Money in whole cents. Stored on disk as a decimal number (`100.0`).
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub struct Credits(u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseCreditsError {
    #[error("amount must not be negative")]
    Negative,
    #[error("amount is not a finite number")]
    NotFinite,
    #[error("'{0}' is not an amount")]
    Malformed(String),
    #[error("amounts have at most two decimal places")]
    TooPrecise,
    #[error("amount exceeds the limit of {}", Credits::MAX)]
    TooLarge,
}

impl Credits {
    pub const ZERO: Credits = Credits(0);
    /// Largest amount the table accepts or stores. Cent values up to here are exact as `f64`.
    pub const MAX: Credits = Credits(1_000_000_000_000_000);

    pub const fn from_cents(cents: u64) -> Self {
        Credits(cents)
    }

    pub const fn whole(units: u64) -> Self {
        Credits(units * 100)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_within_limit(self) -> bool {
        self <= Credits::MAX
    }

    pub fn checked_add(self, other: Credits) -> Option<Credits> {
        self.0.checked_add(other.0).map(Credits)
    }

    pub fn saturating_mul(self, factor: u64) -> Credits {
        Credits(self.0.saturating_mul(factor))
    }

    /// Applies a signed cent delta, refusing to go below zero or above `MAX`.
    pub fn apply_delta(self, delta: i64) -> Option<Credits> {
        let cents = i128::from(self.0) + i128::from(delta);
        u64::try_from(cents)
            .ok()
            .map(Credits)
            .filter(|c| c.is_within_limit())
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Credits {
    type Err = ParseCreditsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().replace(',', ".");
        if raw.starts_with('-') {
            return Err(ParseCreditsError::Negative);
        }
        let malformed = || ParseCreditsError::Malformed(s.trim().to_string());

        let (whole, fraction) = match raw.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw.as_str(), ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(malformed());
        }
        if fraction.len() > 2 {
            return Err(ParseCreditsError::TooPrecise);
        }

        let units: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| ParseCreditsError::TooLarge)?
        };
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| malformed())? * 10,
            _ => fraction.parse().map_err(|_| malformed())?,
        };
        units
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .map(Credits)
            .filter(|c| c.is_within_limit())
            .ok_or(ParseCreditsError::TooLarge)
    }
}

impl TryFrom<f64> for Credits {
    type Error = ParseCreditsError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(ParseCreditsError::NotFinite);
        }
        if value < 0.0 {
            return Err(ParseCreditsError::Negative);
        }
        let cents = (value * 100.0).round();
        if cents > Credits::MAX.0 as f64 {
            return Err(ParseCreditsError::TooLarge);
        }
        Ok(Credits(cents as u64))
    }
}

impl From<Credits> for f64 {
    fn from(credits: Credits) -> f64 {
        credits.0 as f64 / 100.0
    }
}

/// Signed balance change in cents, printed as `+10.00` / `-5.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta(pub i64);

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { '-' } else { '+' };
        write!(f, "{sign}{}", Credits(self.0.unsigned_abs()))
    }
}
