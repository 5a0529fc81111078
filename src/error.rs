//! Error kinds of the API access layer.

use std::time::Duration;

/// A raw record that failed its resource's required-field contract.
///
/// These are absorbed by the pagination walker: the record is skipped and the
/// error is reported next to the successful records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "invalid {resource} record #{index}{}: {message}",
    .key.as_ref().map(|k| format!(" ({})", k)).unwrap_or_default()
)]
pub struct ValidationError {
    /// Resource the record belongs to (e.g. `assignatures`).
    pub resource: String,
    /// Position of the record in the aggregated raw item sequence.
    pub index: usize,
    /// Natural key of the record, when one could be read from the raw JSON.
    pub key: Option<String>,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No usable credential exists; the user has to log in.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),
    /// The provider rejected the refresh token or the bearer token.
    #[error("Authentication error: {0}")]
    Authentication(String),
    /// Rate limiting, server-side or network failure.
    #[error(
        "Transient API error{}: {message}",
        .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
    )]
    Transient {
        status: Option<u16>,
        message: String,
        retry_after_ms: Option<u64>,
    },
    /// Malformed request. Indicates a bug in how the request was built.
    #[error("Client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    InvalidRecord(#[from] ValidationError),
    #[error("Cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Token storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Map a non-success HTTP status to an error kind.
    ///
    /// 401 is classified as an authentication error; the request layer decides
    /// separately whether a refresh and retry is allowed first.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = truncate(body, 300);
        match status {
            401 => Self::Authentication(if message.is_empty() {
                "credentials rejected".into()
            } else {
                message
            }),
            429 => Self::Transient {
                status: Some(status),
                message: "rate limit exceeded".into(),
                retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            },
            500..=599 => Self::transient(Some(status), message),
            _ => Self::Client { status, message },
        }
    }

    /// Map a reqwest transport failure. Timeouts and connection errors are
    /// transient; anything else means the request could not be built.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Config(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::transient(None, err.to_string())
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired(_) | Self::Authentication(_)
        )
    }

    /// Text suitable for the end user. Client errors are never shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationRequired(_) | Self::Authentication(_) => {
                "Please re-authenticate with your FIB account and try again.".into()
            }
            Self::Transient { .. } => {
                "The FIB service is temporarily unavailable, please try again in a moment."
                    .into()
            }
            Self::Client { status: 404, .. } => {
                "The requested resource was not found in the FIB system.".into()
            }
            Self::Cancelled => "The request was cancelled.".into(),
            _ => "The FIB data could not be retrieved because of an internal error.".into(),
        }
    }

    /// Short label used as the `error` field of tool results.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired(_) | Self::Authentication(_) => "Authentication required",
            Self::Transient { status: Some(429), .. } => "Rate limit exceeded",
            Self::Transient { .. } => "Service unavailable",
            Self::Client { status: 404, .. } => "Not found",
            Self::Cancelled => "Cancelled",
            _ => "API error",
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
