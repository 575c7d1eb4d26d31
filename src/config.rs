use std::time::Duration;

use anyhow::{Context, Result};

use crate::date_codec::TimestampFormat;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3001";
const DEFAULT_CBR_ENDPOINT: &str = "https://www.cbr.ru/DailyInfoWebServ/DailyInfo.asmx";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub endpoint: String,
    pub timeout: Duration,
    /// Literal used for `GetCursOnDate`
    pub on_date_format: TimestampFormat,
    /// Literal used for `GetCursDynamic`
    pub dynamic_format: TimestampFormat,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let timeout = match var("CBR_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("CBR_TIMEOUT_SECS must be a number of seconds, got {raw:?}")
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let timestamp_format = |key: &str| -> Result<TimestampFormat> {
            match var(key) {
                Some(raw) => raw.parse().with_context(|| format!("Invalid {key}")),
                None => Ok(TimestampFormat::default()),
            }
        };

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            cors_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            upstream: UpstreamConfig {
                endpoint: var("CBR_ENDPOINT").unwrap_or_else(|| DEFAULT_CBR_ENDPOINT.to_string()),
                timeout: Duration::from_secs(timeout),
                on_date_format: timestamp_format("CBR_ON_DATE_FORMAT")?,
                dynamic_format: timestamp_format("CBR_DYNAMIC_FORMAT")?,
            },
        })
    }
}
