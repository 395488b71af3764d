//! Crate-wide error taxonomy
//!
//! Every failure surfaced by the engine falls into one of four kinds:
//!
//! - `InvalidInvocation`: the operator supplied an unusable command line or
//!   CSV row (missing required flag, bad coercion, malformed sub-flag string,
//!   unreadable file). Never retried.
//! - `Transient`: transport failures and rate-limit-class upstream responses
//!   (HTTP 429, 5xx). The retrier re-attempts these with backoff.
//! - `Upstream`: terminal API failures (403, 404, precondition violations).
//!   Logged against the row's context key; the row is dropped.
//! - `Io`: filesystem and CSV plumbing errors.
//!
//! Batch workers never panic on `Transient` or `Upstream`; the absence of a
//! result record is itself the signal that a row failed.

use thiserror::Error;

/// Unified error type for the CLI engine
#[derive(Debug, Error)]
pub enum Error {
    /// Operator error: the invocation cannot be executed as given
    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),

    /// Transport failure or rate-limit-class upstream response
    #[error("transient failure: {0}")]
    Transient(String),

    /// Terminal upstream API failure
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Filesystem or CSV plumbing failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization failure while formatting output
    #[error("output encoding failed: {0}")]
    Encode(String),
}

impl Error {
    /// Whether the retrier should re-attempt after this error
    ///
    /// Only transient failures qualify. Authorization failures (403) and
    /// other terminal upstream conditions abort immediately, as do operator
    /// errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Classifies an HTTP status plus response body into an error value
    ///
    /// 429 and 5xx are transient; everything else non-success is terminal.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || status >= 500 {
            Error::Transient(format!("HTTP {}: {}", status, message))
        } else {
            Error::Upstream { status, message }
        }
    }

    /// Shorthand for a named-field coercion failure
    pub fn bad_value(flag: &str, raw: &str, kind: &str) -> Self {
        Error::InvalidInvocation(format!(
            "value {:?} for flag --{} is not a valid {}",
            raw, flag, kind
        ))
    }
}

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encode(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Encode(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::InvalidInvocation(format!("CSV input error: {}", e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Error::Transient(e.to_string())
        } else if let Some(status) = e.status() {
            Error::from_status(status.as_u16(), e.to_string())
        } else {
            Error::Transient(e.to_string())
        }
    }
}
