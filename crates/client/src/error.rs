//! Error types for the Vidora client
//!
//! The taxonomy separates four kinds of failure a caller may want to branch
//! on:
//!
//! - **API errors**: the server answered with a non-success status. Carries
//!   the HTTP status plus the platform's structured `code`/`detail` body when
//!   one was parseable.
//! - **Scroll errors**: a search cursor expired server-side. Recoverable by
//!   restarting the search, so it gets its own typed variant instead of being
//!   folded into generic API errors.
//! - **Cancellation**: an abort signal fired while waiting (rate-limit gate,
//!   pagination, keep-alive). Distinct from network failures so callers can
//!   tell "I gave up" apart from "it broke".
//! - **Configuration errors**: detected synchronously, before any network
//!   activity (e.g. no recognized credential combination).

use thiserror::Error;

/// Standard result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Typed error for an expired or invalid search scroll cursor
///
/// The platform windows large result sets behind a server-side cursor with a
/// short TTL (roughly one to five minutes). Exceeding the TTL invalidates the
/// cursor; the search must be restarted from scratch. Some endpoints report
/// this inside an HTTP-2xx body (`statusCode` / `statusDescription`), which
/// the search layer converts into this type.
#[derive(Debug, Clone, Error)]
#[error("scroll cursor error ({status}): {code}{}", .detail.as_deref().map(|d| format!(" - {d}")).unwrap_or_default())]
pub struct ScrollError {
    /// Embedded status code from the response body (e.g. 408)
    pub status: u16,

    /// Short machine-readable description (e.g. "ScrollExpired")
    pub code: String,

    /// Optional human-readable detail
    pub detail: Option<String>,
}

/// Error type for all client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success HTTP status
    #[error("API error (status {status}){}", .code.as_deref().map(|c| format!(": {c}")).unwrap_or_default())]
    Api {
        /// HTTP status code
        status: u16,
        /// Platform error code from the response body, if present
        code: Option<String>,
        /// Human-readable detail from the response body, if present
        detail: Option<String>,
    },

    /// A search scroll cursor expired or was invalidated
    #[error(transparent)]
    Scroll(#[from] ScrollError),

    /// An abort signal fired while the operation was waiting
    #[error("operation cancelled: {reason}")]
    Cancelled {
        /// Why the operation was abandoned
        reason: String,
    },

    /// Invalid configuration, detected before any network activity
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection-level failure (DNS, TLS, timeouts, ...)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server's response body could not be interpreted
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ClientError {
    /// Create an API error from a status code and optional body fields
    #[must_use]
    pub fn api(status: u16, code: Option<String>, detail: Option<String>) -> Self {
        Self::Api { status, code, detail }
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled<S: Into<String>>(reason: S) -> Self {
        Self::Cancelled { reason: reason.into() }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// The HTTP status associated with this error, if any
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Scroll(e) => Some(e.status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error represents a deliberate cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether this error is an expired/invalid scroll cursor
    #[must_use]
    pub fn is_scroll_expired(&self) -> bool {
        matches!(self, Self::Scroll(_))
    }

    /// Whether a login attempt that failed with this error is worth retrying
    ///
    /// Transport failures and server-side (5xx) errors are transient. A 401
    /// is futile to retry and a 429 could trigger account lockout, so both
    /// are excluded along with every other 4xx.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
