//! Conversions between facade dates (`dd.MM.yyyy`) and upstream timestamps.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serializer;

use crate::error::AppError;

pub const EXTERNAL_FORMAT: &str = "%d.%m.%Y";

/// Literal timestamp conventions accepted by the upstream service.
///
/// Operations differ in what they expect, so every call site picks its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// `2023-03-01T00:00:00`
    Plain,
    /// `2023-03-01T00:00:00.000`
    #[default]
    Millis,
    /// `2023-03-01T00:00:00.000Z`
    MillisZulu,
}

impl TimestampFormat {
    fn pattern(self) -> &'static str {
        match self {
            TimestampFormat::Plain => "%Y-%m-%dT%H:%M:%S",
            TimestampFormat::Millis => "%Y-%m-%dT%H:%M:%S%.3f",
            TimestampFormat::MillisZulu => "%Y-%m-%dT%H:%M:%S%.3fZ",
        }
    }

    pub fn encode(self, at: NaiveDateTime) -> String {
        at.format(self.pattern()).to_string()
    }

    #[cfg(test)]
    pub fn decode(self, s: &str) -> Result<NaiveDateTime, AppError> {
        NaiveDateTime::parse_from_str(s, self.pattern()).map_err(|err| AppError::XmlParse {
            message: format!("bad {self} timestamp: {err}"),
            fragment: s.to_string(),
        })
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimestampFormat::Plain => "plain",
            TimestampFormat::Millis => "millis",
            TimestampFormat::MillisZulu => "millis-zulu",
        };
        f.write_str(name)
    }
}

impl FromStr for TimestampFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(TimestampFormat::Plain),
            "millis" => Ok(TimestampFormat::Millis),
            "millis-zulu" => Ok(TimestampFormat::MillisZulu),
            other => Err(AppError::InvalidInput(format!(
                "unknown timestamp format {other:?}, use plain, millis or millis-zulu"
            ))),
        }
    }
}

/// Midnight of `date` in the given upstream literal convention.
pub fn to_upstream_format(date: NaiveDate, format: TimestampFormat) -> String {
    format.encode(date.and_time(NaiveTime::MIN))
}

/// Strict `dd.MM.yyyy`: two-digit day and month, four-digit year, nothing else.
pub fn from_external_format(s: &str) -> Result<NaiveDate, AppError> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b'.',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return Err(AppError::InvalidDateFormat(s.to_string()));
    }

    NaiveDate::parse_from_str(s, EXTERNAL_FORMAT)
        .map_err(|_| AppError::InvalidDateFormat(s.to_string()))
}

pub fn to_external_format(date: NaiveDate) -> String {
    date.format(EXTERNAL_FORMAT).to_string()
}

/// Serde adapter writing a date as `dd.MM.yyyy`.
pub fn serialize_external<S: Serializer>(
    date: &NaiveDate,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(EXTERNAL_FORMAT))
}
