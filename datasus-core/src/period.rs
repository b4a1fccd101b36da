//! Target period selection.
//!
//! The remote dataset for month M is published with a delay, so each run
//! targets `today - lag` months. The period fixes both the remote filename
//! suffix (`YYMM` + extension) and the key stored by the run gate (`YYYY-MM`).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default publication lag, in months.
pub const DEFAULT_LAG_MONTHS: u32 = 2;

/// A calendar year-month identifying one dataset vintage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month out of range: {0}")]
    MonthOutOfRange(u32),

    #[error("invalid period key '{0}' (expected YYYY-MM)")]
    InvalidKey(String),
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        Ok(Self { year, month })
    }

    /// Period targeted by a run on `today`: `lag_months` calendar months earlier.
    pub fn from_date(today: NaiveDate, lag_months: u32) -> Self {
        let index = today.year() * 12 + today.month0() as i32 - lag_months as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Gate key, `YYYY-MM`.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Filename suffix: two-digit year, two-digit month, then `extension`.
    pub fn suffix(&self, extension: &str) -> String {
        format!(
            "{:02}{:02}{extension}",
            self.year.rem_euclid(100),
            self.month
        )
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidKey(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Period::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.key()
    }
}
