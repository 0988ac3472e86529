// Session lifecycle: credential exchange, expiry tracking and forced
// re-authentication.
//
// The live session sits behind an `ArcSwapOption` so readers never block
// and a re-login replaces it wholesale. Logins are single-flight: callers
// racing on the same stale session share one exchange.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::AuthError;
use crate::token::decode_claims;

/// Lifetime assumed when the ID token carries no `exp` claim.
fn default_session_ttl() -> TimeDelta {
    TimeDelta::hours(1)
}

const LOGIN_PATH: &str = "v1/login2";

/// An authenticated session. Replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct Session {
    /// Access token, sent verbatim as the `Authorization` header.
    pub token: SecretString,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Stored login credentials, reused for re-authentication.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Observable authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    user_name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    accesstoken: Option<String>,
    idtoken: Option<String>,
}

/// Owns the one live [`Session`] of a running instance.
pub struct AuthManager {
    http: reqwest::Client,
    base_url: Url,
    session: ArcSwapOption<Session>,
    credentials: ArcSwapOption<Credentials>,
    login_lock: Mutex<()>,
    state: watch::Sender<AuthState>,
}

impl AuthManager {
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            http,
            base_url,
            session: ArcSwapOption::empty(),
            credentials: ArcSwapOption::empty(),
            login_lock: Mutex::new(()),
            state,
        }
    }

    /// Store credentials without logging in. The first call that needs a
    /// session performs the exchange.
    pub fn set_credentials(&self, credentials: Credentials) {
        self.credentials.store(Some(Arc::new(credentials)));
    }

    /// Exchange `username`/`password` for a session and remember them for
    /// later re-authentication.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Arc<Session>, AuthError> {
        let credentials = Credentials {
            username: username.to_owned(),
            password: password.clone(),
        };
        let _guard = self.login_lock.lock().await;
        let session = self.exchange(&credentials).await?;
        self.credentials.store(Some(Arc::new(credentials)));
        Ok(session)
    }

    /// The cached session, if any. Never blocks.
    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.session.load_full()
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Re-run the login with the stored credentials.
    pub async fn reauthenticate(&self) -> Result<Arc<Session>, AuthError> {
        let _guard = self.login_lock.lock().await;
        let credentials = self
            .credentials
            .load_full()
            .ok_or(AuthError::NotAuthenticated)?;
        self.exchange(&credentials).await
    }

    /// Re-authenticate because `stale` was rejected. If another caller has
    /// already replaced it, the newer session is returned without a login.
    pub(crate) async fn reauthenticate_stale(
        &self,
        stale: &Arc<Session>,
    ) -> Result<Arc<Session>, AuthError> {
        let _guard = self.login_lock.lock().await;
        if let Some(current) = self.session.load_full()
            && !Arc::ptr_eq(&current, stale)
        {
            debug!("session already replaced by a concurrent login");
            return Ok(current);
        }
        let credentials = self
            .credentials
            .load_full()
            .ok_or(AuthError::NotAuthenticated)?;
        self.exchange(&credentials).await
    }

    /// A usable session: the cached one, or a fresh login when none exists
    /// or the cached one has expired.
    pub async fn ensure_session(&self) -> Result<Arc<Session>, AuthError> {
        if let Some(session) = self.session.load_full()
            && !session.is_expired()
        {
            return Ok(session);
        }

        let _guard = self.login_lock.lock().await;
        // Re-check under the lock; a concurrent caller may have logged in.
        if let Some(session) = self.session.load_full()
            && !session.is_expired()
        {
            return Ok(session);
        }
        let credentials = self
            .credentials
            .load_full()
            .ok_or(AuthError::NotAuthenticated)?;
        self.exchange(&credentials).await
    }

    /// Drop the session and stored credentials.
    pub fn logout(&self) {
        self.session.store(None);
        self.credentials.store(None);
        self.state.send_replace(AuthState::Unauthenticated);
        debug!("session cleared");
    }

    // ── Exchange ─────────────────────────────────────────────────────

    /// One login round trip. Caller must hold `login_lock`.
    async fn exchange(&self, credentials: &Credentials) -> Result<Arc<Session>, AuthError> {
        self.state.send_replace(AuthState::Authenticating);
        match self.request_session(credentials).await {
            Ok(session) => {
                let session = Arc::new(session);
                self.session.store(Some(Arc::clone(&session)));
                self.state.send_replace(AuthState::Authenticated);
                info!(user_id = %session.user_id, expires_at = %session.expires_at, "logged in");
                Ok(session)
            }
            Err(e) => {
                self.session.store(None);
                self.state.send_replace(AuthState::Unauthenticated);
                warn!(error = %e, "login failed");
                Err(e)
            }
        }
    }

    async fn request_session(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let url = self
            .base_url
            .join(LOGIN_PATH)
            .map_err(|e| AuthError::NetworkFailure {
                message: format!("invalid login URL: {e}"),
            })?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(&LoginRequest {
                user_name: &credentials.username,
                password: credentials.password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| AuthError::NetworkFailure {
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| AuthError::NetworkFailure {
            message: e.to_string(),
        })?;

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AuthError::NetworkFailure {
                message: format!("login returned HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(AuthError::InvalidCredentials {
                message: login_failure_message(status, &body),
            });
        }

        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::MalformedToken {
                reason: format!("unexpected login response: {e}"),
            })?;
        let (Some(access), Some(id)) = (parsed.accesstoken, parsed.idtoken) else {
            return Err(AuthError::MalformedToken {
                reason: "login response is missing tokens".into(),
            });
        };

        session_from_tokens(access, &id)
    }
}

/// Build a session from the access token and the ID token's claims.
fn session_from_tokens(access_token: String, id_token: &str) -> Result<Session, AuthError> {
    let claims = decode_claims(id_token)?;
    let user_id = claims
        .user_id()
        .ok_or_else(|| AuthError::MalformedToken {
            reason: "token has no user identifier claim".into(),
        })?
        .to_owned();

    let issued_at = claims
        .iat
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);
    let expires_at = claims
        .exp
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(|| issued_at + default_session_ttl());

    Ok(Session {
        token: SecretString::from(access_token),
        user_id,
        issued_at,
        expires_at,
    })
}

fn login_failure_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("description")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| format!("login rejected with HTTP {status}"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;

    fn id_token(claims: &str) -> String {
        format!("h.{}.s", URL_SAFE_NO_PAD.encode(claims))
    }

    #[test]
    fn session_uses_token_timestamps() {
        let id = id_token(r#"{"custom:user_id":"u-42","iat":1700000000,"exp":1700086400}"#);
        let session = session_from_tokens("access".into(), &id).unwrap();
        assert_eq!(session.user_id, "u-42");
        assert_eq!(session.issued_at.timestamp(), 1_700_000_000);
        assert_eq!(session.expires_at.timestamp(), 1_700_086_400);
        assert_eq!(session.token.expose_secret(), "access");
        assert!(session.is_expired());
    }

    #[test]
    fn session_defaults_to_one_hour() {
        let id = id_token(r#"{"custom:user_id":"u-42"}"#);
        let session = session_from_tokens("access".into(), &id).unwrap();
        assert_eq!(session.expires_at - session.issued_at, default_session_ttl());
        assert!(!session.is_expired());
    }

    #[test]
    fn session_requires_user_identifier() {
        let id = id_token(r#"{"email":"a@b.c"}"#);
        let err = session_from_tokens("access".into(), &id).unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken { .. }));
    }

    #[test]
    fn failure_message_prefers_service_description() {
        let msg = login_failure_message(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"status":"failure","description":"Incorrect user name or password"}"#,
        );
        assert_eq!(msg, "Incorrect user name or password");

        let msg = login_failure_message(reqwest::StatusCode::BAD_REQUEST, "oops");
        assert!(msg.contains("400"));
    }

    #[tokio::test]
    async fn ensure_session_without_credentials_fails() {
        let auth = AuthManager::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
        );
        assert!(auth.current_session().is_none());
        assert_eq!(
            auth.ensure_session().await.unwrap_err(),
            AuthError::NotAuthenticated
        );
        assert_eq!(auth.state(), AuthState::Unauthenticated);
    }
}
