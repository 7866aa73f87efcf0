// Error types for the plinth resource layer.
// Splits programmer-facing errors (registry misuse, persistence) from
// network outcomes that are stored in cache entries.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlinthError {
    #[error("duplicate endpoint: {0}")]
    DuplicateEndpoint(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("endpoint {0} is not a query")]
    NotAQuery(String),

    #[error("endpoint {0} is not a mutation")]
    NotAMutation(String),

    #[error("request failed: {0}")]
    Request(ErrorInfo),

    #[error("no data directory available for this platform")]
    MissingDataDir,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlinthError>;

/// Outcome of a single fetch: the decoded body, or a cacheable error.
pub type FetchOutcome = std::result::Result<Value, ErrorInfo>;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response at all (connect failure, timeout, aborted request).
    Transport,
    /// The server responded with a non-2xx status.
    Http,
    /// The response body could not be decoded as JSON.
    Decode,
}

/// Error state carried on cache entries and mutation results.
///
/// Unlike [`PlinthError`] this is `Clone`, so the same failure can be
/// published to every subscriber of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    /// Raw response body, when one was received.
    pub raw: Option<String>,
}

impl ErrorInfo {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            status_code: None,
            message: message.into(),
            raw: None,
        }
    }

    pub fn http(status_code: u16, message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Http,
            status_code: Some(status_code),
            message: message.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn decode(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Decode,
            status_code: None,
            message: message.into(),
            raw: Some(raw.into()),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<ErrorInfo> for PlinthError {
    fn from(info: ErrorInfo) -> Self {
        PlinthError::Request(info)
    }
}
