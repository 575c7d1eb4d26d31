use thiserror::Error;

/// Errors produced while translating upstream rate data.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date format: {0:?}, expected dd.MM.yyyy")]
    InvalidDateFormat(String),

    /// Network failure, timeout or remote fault
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream payload is not well-formed or lacks a required part
    #[error("Malformed XML ({message}) near `{fragment}`")]
    XmlParse { message: String, fragment: String },

    #[error("Can't parse decimal {value:?}: {reason}")]
    NumericParse { value: String, reason: String },

    #[error("Can't encode JSON payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// True when the caller, not the upstream or our payload handling, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_) | AppError::InvalidDateFormat(_)
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamUnavailable(err.to_string())
    }
}
