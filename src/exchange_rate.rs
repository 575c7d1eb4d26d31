use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{date_codec, error::AppError};

/// Upstream currency identifier, e.g. `R01235`.
pub type CurrencyCode = String;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRecord {
    pub code: CurrencyCode,
    pub name: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    #[serde(serialize_with = "date_codec::serialize_external")]
    pub date: NaiveDate,
    pub value: Decimal,
}

/// Inclusive date range, `from <= to` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, AppError> {
        if from > to {
            return Err(AppError::InvalidInput(format!(
                "fromDate {} is after toDate {}",
                date_codec::to_external_format(from),
                date_codec::to_external_format(to)
            )));
        }
        Ok(Self { from, to })
    }

    /// Both bounds in `dd.MM.yyyy`.
    pub fn parse(from: &str, to: &str) -> Result<Self, AppError> {
        Self::new(
            date_codec::from_external_format(from)?,
            date_codec::from_external_format(to)?,
        )
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}
