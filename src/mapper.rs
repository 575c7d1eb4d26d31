use std::{collections::HashMap, str::FromStr};

use rust_decimal::Decimal;

use crate::{
    date_codec,
    error::AppError,
    exchange_rate::{HistoryPoint, RateRecord},
    val_curs,
    xml::Document,
};

pub const UNKNOWN_CURRENCY: &str = "Unknown";

/// Rates on a date joined with their names.
///
/// Later duplicates of a code in the enumeration overwrite earlier ones.
/// Codes with no name get [`UNKNOWN_CURRENCY`].
pub fn join_currency_table(
    names: &Document,
    rates: &Document,
) -> Result<Vec<RateRecord>, AppError> {
    let mut table = HashMap::new();
    for valute in val_curs::valutes(names)? {
        table.insert(valute.code, valute.name);
    }

    val_curs::curs_on_date(rates)?
        .into_iter()
        .map(|curs| {
            let name = table.get(curs.code).copied().unwrap_or_else(|| {
                log::debug!("No name for currency {}", curs.code);
                UNKNOWN_CURRENCY
            });
            Ok(RateRecord {
                code: curs.code.to_string(),
                name: name.to_string(),
                value: parse_locale_decimal(curs.value)?,
            })
        })
        .collect()
}

/// History points in upstream order.
pub fn extract_history(rates: &Document) -> Result<Vec<HistoryPoint>, AppError> {
    val_curs::curs_dynamic(rates)?
        .into_iter()
        .map(|curs| {
            let date =
                date_codec::from_external_format(curs.date).map_err(|_| AppError::XmlParse {
                    message: "record date is not dd.MM.yyyy".to_string(),
                    fragment: format!("Date=\"{}\"", curs.date),
                })?;
            Ok(HistoryPoint {
                date,
                value: parse_locale_decimal(curs.value)?,
            })
        })
        .collect()
}

/// Parses a comma-separated upstream decimal. Missing, empty and negative values are errors.
pub fn parse_locale_decimal(raw: Option<&str>) -> Result<Decimal, AppError> {
    let raw = raw.unwrap_or_default();
    let normalized = normalize_decimal_string(raw);
    if normalized.is_empty() {
        return Err(AppError::NumericParse {
            value: raw.to_string(),
            reason: "value is missing".to_string(),
        });
    }

    let value = Decimal::from_str(&normalized).map_err(|err| AppError::NumericParse {
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::NumericParse {
            value: raw.to_string(),
            reason: "rate can't be negative".to_string(),
        });
    }

    Ok(value)
}

fn normalize_decimal_string(s: &str) -> String {
    s.trim().replace(',', ".")
}
