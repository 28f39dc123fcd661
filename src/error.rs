//! Error types for genjob
//!
//! This module provides the error type surfaced by the job client and the artifact fetcher:
//! - Caller mistakes (`InvalidRequest`, `Config`) that fail before any network call
//! - Remote outcomes (`RemoteRejected`, `RateLimited`, `ArtifactUnavailable`)
//! - Transport failures, both single attempts (`Connection`, `Network`) and exhausted retries
//!   (`Transport`)
//!
//! Terminal job states such as a remote failure or a local polling timeout are NOT errors;
//! they are reported through [`JobStatus`](crate::types::JobStatus) on the returned job.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for genjob operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for genjob
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input, detected before any network call
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "providers.replicate.poll")
        key: Option<String>,
    },

    /// Network failure that persisted through every submission attempt
    #[error("transport error after {attempts} attempt(s): {reason}")]
    Transport {
        /// Number of attempts made before giving up
        attempts: u32,
        /// Description of the last failure
        reason: String,
    },

    /// Non-2xx response that is not a recoverable rate-limit signal
    #[error("remote rejected request with HTTP {status_code}: {body}")]
    RemoteRejected {
        /// HTTP status code returned by the remote
        status_code: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Remote asked us to slow down and advised a delay
    ///
    /// Absorbed by a single deferred retry inside `submit`; callers only see it
    /// escalated to [`Error::RemoteRejected`].
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-advised delay before retrying
        retry_after: Duration,
        /// Response body, kept for escalation
        body: String,
    },

    /// A succeeded job's artifact could not be retrieved
    #[error("artifact unavailable ({reference}): {reason}")]
    ArtifactUnavailable {
        /// The output reference (URL or truncated inline payload)
        reference: String,
        /// Why the artifact could not be produced
        reason: String,
    },

    /// Remote response could not be interpreted (missing id, non-JSON body, ...)
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A single connection-level failure (refused, reset, timed out)
    #[error("connection error: {0}")]
    Connection(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host refused to import an artifact
    #[error("import failed: {0}")]
    Import(String),
}

impl Error {
    /// Machine-readable error code for the UI layer
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::Config { .. } => "config_error",
            Error::Transport { .. } => "transport",
            Error::RemoteRejected { .. } => "remote_rejected",
            Error::RateLimited { .. } => "rate_limited",
            Error::ArtifactUnavailable { .. } => "artifact_unavailable",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Connection(_) => "connection_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::Import(_) => "import_failed",
        }
    }

    pub(crate) fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
