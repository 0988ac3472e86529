use std::time::Duration;

use thiserror::Error;

/// Failures of the login / session lifecycle.
///
/// Apart from `NetworkFailure`, which the client retries like any other
/// transport error, every variant is terminal for the call chain that
/// produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The service rejected the username/password (or they were revoked).
    #[error("invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// The login exchange could not reach the service.
    #[error("network failure during login: {message}")]
    NetworkFailure { message: String },

    /// The token returned by the service could not be decoded, or it
    /// lacks the user-identifier claim.
    #[error("malformed session token: {reason}")]
    MalformedToken { reason: String },

    /// No credentials have been supplied yet, so no login is possible.
    #[error("not authenticated -- no credentials stored")]
    NotAuthenticated,

    /// A fresh session was still answered with HTTP 401.
    #[error("session rejected after re-authentication")]
    SessionRejected,
}

/// Top-level error type for the `livsync-api` crate.
///
/// Every remote call returns one of these as a value; nothing panics or
/// escapes the client boundary. [`Error::class`] tells the retry loop what
/// to do with it and [`Error::kind`] maps it onto the four-way taxonomy
/// consumers reason about.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login, token, or re-authentication failure.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The service answered HTTP 401 for the current session.
    #[error("Unauthorized (HTTP 401)")]
    Unauthorized,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, reset, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// A single attempt exceeded its timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Service ─────────────────────────────────────────────────────
    /// HTTP 429. `retry_after` carries the server's hint when present.
    #[error("Rate limited{}", retry_after.map(|d| format!(" -- retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Non-success status other than 401/429, or an explicit failure
    /// document returned with a success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The response body did not have the expected shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// What the retry loop should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying after a backoff delay.
    Transient,
    /// Re-authenticate once, then retry immediately.
    Unauthorized,
    /// Surface to the caller without retrying.
    Fatal,
}

/// Consumer-facing taxonomy of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkFailure,
    Auth,
    Api,
    RateLimited,
}

impl Error {
    /// Classify this error for the retry loop.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthorized => ErrorClass::Unauthorized,
            Self::Auth(AuthError::NetworkFailure { .. }) => ErrorClass::Transient,
            Self::Transport(e) if !e.is_builder() => ErrorClass::Transient,
            Self::Timeout { .. } | Self::RateLimited { .. } => ErrorClass::Transient,
            Self::Api { status, .. } if *status >= 500 => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Returns `true` if this error is an authentication failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Unauthorized)
    }

    /// The server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map onto the four-way taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(AuthError::NetworkFailure { .. })
            | Self::Transport(_)
            | Self::Timeout { .. }
            | Self::Tls(_) => ErrorKind::NetworkFailure,
            Self::Auth(_) | Self::Unauthorized => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Api { status, .. } if *status >= 500 => ErrorKind::NetworkFailure,
            Self::Api { .. } | Self::Deserialization { .. } | Self::InvalidUrl(_) => ErrorKind::Api,
        }
    }

    /// HTTP status code associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::RateLimited { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
