#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

use crate::types::FailureReason;

pub const WHOIS_UNAVAILABLE_MESSAGE: &str = "Failed to fetch WHOIS data";
pub const UNEXPECTED_ERROR_MESSAGE: &str =
    "An unexpected error occurred while processing domain information";

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Unsupported TLD: {0}")]
    UnsupportedTld(String),

    #[error("Network timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] tokio::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("DNS resolution failed: {0}")]
    Resolution(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Response too large")]
    ResponseTooLarge,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Fallback WHOIS provider unavailable: {0}")]
    FallbackUnavailable(String),

    #[error("{}", WHOIS_UNAVAILABLE_MESSAGE)]
    WhoisUnavailable,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<tokio::time::error::Elapsed> for IntelError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        IntelError::Timeout
    }
}

impl IntelError {
    /// Classify the error for the per-lookup failure list.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            IntelError::Timeout => FailureReason::Timeout,
            IntelError::IoError(_) => FailureReason::Connection,
            IntelError::HttpError(e) if e.is_timeout() => FailureReason::Timeout,
            IntelError::HttpError(_) | IntelError::UpstreamStatus(_) => FailureReason::Http,
            IntelError::Resolution(_) => FailureReason::Resolution,
            IntelError::Tls(_) => FailureReason::Tls,
            IntelError::Parse(_) | IntelError::ResponseTooLarge => FailureReason::Parse,
            IntelError::NotFound(_) | IntelError::UnsupportedTld(_) => FailureReason::NotFound,
            // Not produced by the best-effort lookups themselves
            IntelError::InvalidDomain(_)
            | IntelError::ConfigError(_)
            | IntelError::FallbackUnavailable(_)
            | IntelError::WhoisUnavailable
            | IntelError::Unauthorized(_)
            | IntelError::Internal(_) => FailureReason::Other,
        }
    }
}

#[cfg(feature = "server")]
impl IntoResponse for IntelError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            IntelError::InvalidDomain(ref reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            IntelError::Unauthorized(ref reason) => (StatusCode::UNAUTHORIZED, reason.clone()),
            IntelError::WhoisUnavailable => (StatusCode::BAD_GATEWAY, self.to_string()),
            _ => {
                tracing::error!("Error processing domain information: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    UNEXPECTED_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}
