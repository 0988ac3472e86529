// ── Core error types ──
//
// User-facing errors from livsync-core. Consumers never see raw HTTP or
// JSON failures; the `From<livsync_api::Error>` impl translates them into
// domain variants, and `kind()` folds everything onto the taxonomy the
// coordinator's callers reason about.

use thiserror::Error;

/// Classified failure kind of a core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkFailure,
    Auth,
    Api,
    RateLimited,
    /// Local precondition failures (unknown device, invalid argument).
    Domain,
}

impl From<livsync_api::ErrorKind> for ErrorKind {
    fn from(kind: livsync_api::ErrorKind) -> Self {
        match kind {
            livsync_api::ErrorKind::NetworkFailure => Self::NetworkFailure,
            livsync_api::ErrorKind::Auth => Self::Auth,
            livsync_api::ErrorKind::Api => Self::Api,
            livsync_api::ErrorKind::RateLimited => Self::RateLimited,
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the cloud service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not connected")]
    Disconnected,

    // ── Service errors ───────────────────────────────────────────────
    #[error("Rate limited by the cloud service")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Poll of node {node_id} failed: {message}")]
    PollFailed {
        node_id: String,
        message: String,
        kind: ErrorKind,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Device not found: {device} on node {node_id}")]
    DeviceNotFound { node_id: String, device: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => ErrorKind::NetworkFailure,
            Self::AuthenticationFailed { .. } => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Api { status: Some(s), .. } if *s >= 500 => ErrorKind::NetworkFailure,
            Self::Api { .. } => ErrorKind::Api,
            Self::PollFailed { kind, .. } => *kind,
            Self::Disconnected
            | Self::NodeNotFound { .. }
            | Self::DeviceNotFound { .. }
            | Self::ValidationFailed { .. }
            | Self::Config { .. } => ErrorKind::Domain,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<livsync_api::Error> for CoreError {
    fn from(err: livsync_api::Error) -> Self {
        use livsync_api::{AuthError, Error};

        match err {
            Error::Auth(AuthError::NetworkFailure { message }) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: message,
            },
            Error::Auth(e) => CoreError::AuthenticationFailed {
                message: e.to_string(),
            },
            Error::Unauthorized => CoreError::AuthenticationFailed {
                message: "session rejected (HTTP 401)".into(),
            },
            Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_default(),
                        reason: e.to_string(),
                    }
                }
            }
            Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Error::RateLimited { retry_after } => CoreError::RateLimited {
                retry_after_secs: retry_after.map(|d| d.as_secs()),
            },
            Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn api_errors_keep_their_kind() {
        let cases = [
            (
                livsync_api::Error::Api {
                    status: 404,
                    message: "gone".into(),
                },
                ErrorKind::Api,
            ),
            (
                livsync_api::Error::Api {
                    status: 503,
                    message: "busy".into(),
                },
                ErrorKind::NetworkFailure,
            ),
            (
                livsync_api::Error::RateLimited {
                    retry_after: Some(Duration::from_secs(2)),
                },
                ErrorKind::RateLimited,
            ),
            (
                livsync_api::Error::Auth(livsync_api::AuthError::SessionRejected),
                ErrorKind::Auth,
            ),
            (
                livsync_api::Error::Timeout { timeout_secs: 30 },
                ErrorKind::NetworkFailure,
            ),
        ];

        for (api_err, expected) in cases {
            let api_kind = ErrorKind::from(api_err.kind());
            let core = CoreError::from(api_err);
            assert_eq!(core.kind(), expected, "{core}");
            assert_eq!(api_kind, expected);
        }
    }

    #[test]
    fn local_errors_are_domain() {
        let err = CoreError::DeviceNotFound {
            node_id: "n1".into(),
            device: "LIV Hub".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Domain);
    }
}
