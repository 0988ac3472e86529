// ── Runtime coordinator configuration ──
//
// Describes how to reach the cloud service and how often to poll. It
// carries credentials but never touches disk; callers (the CLI, via
// livsync-config) build one and hand it in.

use std::time::Duration;

use livsync_api::transport::DEFAULT_TIMEOUT;
use livsync_api::{Credentials, RetryPolicy, TlsMode};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_BASE_URL: &str = "https://api.iot.thermacell.com/";

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for one coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Service root (e.g. `https://api.iot.thermacell.com/`).
    pub base_url: Url,
    pub credentials: Credentials,
    pub tls: TlsMode,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Background poll period. Zero disables the poll task.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl CoordinatorConfig {
    /// A config with default timing for the given endpoint and account.
    pub fn new(base_url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            base_url,
            credentials: Credentials {
                username: username.into(),
                password,
            },
            tls: TlsMode::System,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }

    /// Like [`new`](Self::new), parsing `base_url`.
    pub fn parse(
        base_url: &str,
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, CoreError> {
        let url = Url::parse(base_url).map_err(|e| CoreError::Config {
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;
        Ok(Self::new(url, username, password))
    }

    /// The production endpoint with default timing.
    pub fn with_default_endpoint(
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, CoreError> {
        Self::parse(DEFAULT_BASE_URL, username, password)
    }
}
