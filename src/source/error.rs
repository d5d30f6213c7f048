//! Error types for the repository content source.
//!
//! Raw transport failures (`Network`, `Timeout`, `HttpStatus`) are produced by
//! single requests and consumed by the retry loop. The remaining variants are
//! what the exporter sees once retry and auth fallback have run.

use thiserror::Error;

use crate::record::ValidationError;

/// Errors that can occur while talking to the repository API.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Identifier failed validation before any request was built.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The record or bitstream does not exist (or has no exportable PDF).
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Content exceeds the configured size cap.
    #[error("content for {url} is {size} bytes, above the {limit} byte limit")]
    TooLarge {
        /// The content URL.
        url: String,
        /// Reported or observed size in bytes.
        size: u64,
        /// Configured cap in bytes.
        limit: u64,
    },

    /// The repository still refused access after the authenticated retry.
    #[error("[AUTH] authentication required (HTTP {status}) for {url}")]
    AuthRequired {
        /// The URL that was refused.
        url: String,
        /// The HTTP status code (401 or 403).
        status: u16,
    },

    /// The login exchange itself failed.
    #[error("[AUTH] login failed: {reason}")]
    AuthFailed {
        /// Why login failed (never contains credentials).
        reason: String,
    },

    /// Transient failures persisted through every attempt.
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Transient {
        /// The URL that kept failing.
        url: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// The final underlying error.
        #[source]
        last: Box<SourceError>,
    },

    /// Network-level error (DNS, connection refused, TLS, reset).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// Response body did not have the expected shape.
    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse {
        /// The URL that produced the response.
        url: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl SourceError {
    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a network error from a reqwest error, mapping timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error with an optional Retry-After header value.
    pub fn http_status(url: impl Into<String>, status: u16, retry_after: Option<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a size-cap error.
    pub fn too_large(url: impl Into<String>, size: u64, limit: u64) -> Self {
        Self::TooLarge {
            url: url.into(),
            size,
            limit,
        }
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a login failure.
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } | Self::AuthRequired { status, .. } => Some(*status),
            Self::Transient { last, .. } => last.http_status_code(),
            _ => None,
        }
    }

    /// True for 401/403 responses, which trigger the login fallback.
    #[must_use]
    pub fn is_auth_challenge(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 401 | 403, .. })
    }

    /// Short label used in logs and run summaries.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::TooLarge { .. } => "too_large",
            Self::AuthRequired { .. } => "auth_required",
            Self::AuthFailed { .. } => "auth_failed",
            Self::Transient { .. } => "transient",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::HttpStatus { .. } => "http_status",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}

// No `From<reqwest::Error>`: every transport error needs the URL for context,
// so callers go through `from_reqwest`.
