//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use livsync_config::ConfigError;
use livsync_core::{CoreError, ErrorKind};

/// Process exit codes.
#[allow(dead_code)]
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(dead_code, unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the cloud service at {url}: {reason}")]
    #[diagnostic(
        code(livsync::connection_failed),
        help(
            "Check your network connection and the service URL.\n\
             Override it with --base-url or api_base_url in your profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(livsync::auth_failed),
        help(
            "Verify your e-mail and password.\n\
             Run: livsync config init"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(livsync::no_credentials),
        help(
            "Configure credentials with: livsync config init\n\
             Or set LIVSYNC_USERNAME and LIVSYNC_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(livsync::not_found),
        help("Run: livsync {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(livsync::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    #[error("Rate limited by the cloud service")]
    #[diagnostic(
        code(livsync::rate_limited),
        help("Wait a moment before retrying.")
    )]
    RateLimited { retry_after_secs: Option<u64> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(livsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(livsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: livsync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(livsync::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(livsync::timeout),
        help("Increase the timeout with --timeout or try again later.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(livsync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ApiError { .. }
            | Self::RateLimited { .. }
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url: if url.is_empty() { "(unknown)".into() } else { url },
                reason,
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Disconnected => CliError::ConnectionFailed {
                url: "(disconnected)".into(),
                reason: "not connected".into(),
            },

            CoreError::RateLimited { retry_after_secs } => {
                CliError::RateLimited { retry_after_secs }
            }

            CoreError::Api { message, status } => CliError::ApiError { message, status },

            CoreError::PollFailed {
                node_id,
                message,
                kind,
            } => match kind {
                ErrorKind::NetworkFailure => CliError::ConnectionFailed {
                    url: format!("node {node_id}"),
                    reason: message,
                },
                ErrorKind::Auth => CliError::AuthFailed { message },
                ErrorKind::RateLimited => CliError::RateLimited {
                    retry_after_secs: None,
                },
                ErrorKind::Api | ErrorKind::Domain => CliError::ApiError {
                    message: format!("poll of node {node_id} failed: {message}"),
                    status: None,
                },
            },

            CoreError::NodeNotFound { node_id } => CliError::NotFound {
                resource_type: "node".into(),
                identifier: node_id,
                list_command: "nodes".into(),
            },

            CoreError::DeviceNotFound { node_id, device } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: format!("{node_id}/{device}"),
                list_command: "status".into(),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}
