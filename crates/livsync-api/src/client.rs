// Authenticated HTTP client with a uniform retry/backoff/timeout policy.
//
// Every endpoint (see `nodes.rs`) funnels through `execute`, which owns the
// attempt budget, the single re-authentication per logical call, and the
// mapping from HTTP outcomes onto `Error`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{AuthManager, Session};
use crate::error::{AuthError, Error, ErrorClass};
use crate::models::truncate;
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

/// Typed client for the node endpoints.
///
/// Cheap to share behind an `Arc`; the session lives in the embedded
/// [`AuthManager`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<AuthManager>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the service root, e.g. `https://api.iot.thermacell.com/`.
    pub fn new(base_url: Url, transport: &TransportConfig, retry: RetryPolicy) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, retry, transport.timeout))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        let base_url = normalize_base(base_url);
        let auth = Arc::new(AuthManager::new(http.clone(), base_url.clone()));
        Self {
            http,
            base_url,
            auth,
            retry,
            timeout,
        }
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Log in, retrying network failures under the retry policy.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<Arc<Session>, Error> {
        let mut backoff = self.retry.backoff();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.auth.login(username, password).await {
                Ok(session) => return Ok(session),
                Err(e @ AuthError::NetworkFailure { .. }) if attempt < self.retry.max_attempts => {
                    let delay = backoff.next_delay(None);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "login failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// `{base}{path}?nodeid={node_id}`
    pub(crate) fn node_url(&self, path: &str, node_id: &str) -> Result<Url, Error> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().append_pair("nodeid", node_id);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get_json(&self, url: Url) -> Result<Value, Error> {
        self.execute(Method::GET, url, None).await
    }

    pub(crate) async fn put_json(&self, url: Url, body: &impl Serialize) -> Result<Value, Error> {
        let body = serde_json::to_value(body).map_err(|e| Error::Deserialization {
            message: format!("failed to encode request body: {e}"),
            body: String::new(),
        })?;
        self.execute(Method::PUT, url, Some(&body)).await
    }

    /// Run one logical call under the retry policy.
    ///
    /// Transient failures back off and retry until the attempt budget is
    /// spent. A 401 triggers exactly one re-authentication; the retry that
    /// follows counts against the same budget.
    async fn execute(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, Error> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.backoff();
        let mut reauthenticated = false;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let (err, session) = match self.auth.ensure_session().await {
                Ok(session) => match self.send_once(&session, &method, &url, body).await {
                    Ok(value) => return Ok(value),
                    Err(e) => (e, Some(session)),
                },
                Err(e) => (Error::Auth(e), None),
            };

            match err.class() {
                ErrorClass::Unauthorized => {
                    let Some(stale) = session else {
                        return Err(err);
                    };
                    if reauthenticated || attempt >= max_attempts {
                        warn!(%method, %url, attempt, "session rejected after re-authentication");
                        return Err(AuthError::SessionRejected.into());
                    }
                    reauthenticated = true;
                    warn!(%method, %url, attempt, "unauthorized, re-authenticating");
                    self.auth.reauthenticate_stale(&stale).await?;
                }
                ErrorClass::Transient if attempt < max_attempts => {
                    let delay = backoff.next_delay(err.retry_after());
                    warn!(
                        %method,
                        %url,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => {
                    debug!(%method, %url, attempt, error = %err, "request failed");
                    return Err(err);
                }
            }
        }
    }

    /// One HTTP attempt, bounded by the per-attempt timeout.
    async fn send_once(
        &self,
        session: &Session,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        debug!(%method, %url, "request");

        let mut req = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, session.token.expose_secret());
        if let Some(body) = body {
            req = req.json(body);
        }

        let exchange = async {
            let resp = req.send().await.map_err(|e| self.map_transport(e))?;
            let status = resp.status();
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = resp.text().await.map_err(|e| self.map_transport(e))?;
            Ok::<_, Error>((status, retry_after, text))
        };

        let (status, retry_after, text) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| self.timeout_error())??;

        parse_response(status, retry_after, &text)
    }

    fn map_transport(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            self.timeout_error()
        } else {
            Error::Transport(e)
        }
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

/// Decode `value` into a wire type, keeping the body on failure.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    let body = truncate(&value.to_string());
    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

fn parse_response(status: StatusCode, retry_after: Option<Duration>, text: &str) -> Result<Value, Error> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited { retry_after });
    }

    let value = if text.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(_) if !status.is_success() => Value::String(truncate(text)),
            Err(e) => {
                return Err(Error::Deserialization {
                    message: e.to_string(),
                    body: truncate(text),
                });
            }
        }
    };

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: failure_message(&value).unwrap_or_else(|| format!("HTTP {status}")),
        });
    }

    // Some endpoints answer 200 with an explicit failure document.
    if value.get("status").and_then(Value::as_str) == Some("failure") {
        return Err(Error::Api {
            status: status.as_u16(),
            message: failure_message(&value).unwrap_or_else(|| "request failed".into()),
        });
    }

    Ok(value)
}

fn failure_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => obj
            .get("description")
            .or_else(|| obj.get("message"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

/// Ensure the base path ends with `/` so `Url::join` appends to it.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
