// Integration tests for `ApiClient` and `AuthManager` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

use livsync_api::{
    ApiClient, AuthError, AuthState, DeviceParamsUpdate, Error, ErrorKind, ParamsUpdate,
    RetryPolicy,
};

// ── Helpers ─────────────────────────────────────────────────────────

const USERNAME: &str = "me@example.com";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
    }
}

fn id_token(user_id: &str) -> String {
    let claims = json!({"custom:user_id": user_id, "sub": "ignored"}).to_string();
    format!("eyJhbGciOiJSUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(claims))
}

fn login_body(access: &str) -> serde_json::Value {
    json!({
        "status": "success",
        "accesstoken": access,
        "idtoken": id_token("user-1"),
        "refreshtoken": "refresh"
    })
}

fn password() -> SecretString {
    SecretString::from("hunter2")
}

fn client_for(uri: &str, timeout: Duration) -> ApiClient {
    ApiClient::with_client(
        reqwest::Client::new(),
        Url::parse(uri).unwrap(),
        fast_retry(),
        timeout,
    )
}

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), Duration::from_secs(5));
    (server, client)
}

async fn mount_login(server: &MockServer, times: impl Into<Times>) {
    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .and(body_partial_json(json!({"user_name": USERNAME})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1")))
        .expect(times)
        .mount(server)
        .await;
}

async fn logged_in(server: &MockServer, client: &ApiClient) {
    mount_login(server, 1..).await;
    client.login(USERNAME, &password()).await.unwrap();
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_decodes_user_id_from_id_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .and(body_json(json!({"user_name": USERNAME, "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1")))
        .expect(1)
        .mount(&server)
        .await;

    let session = client.login(USERNAME, &password()).await.unwrap();

    assert_eq!(session.user_id, "user-1");
    assert!(!session.is_expired());
    assert_eq!(client.auth().state(), AuthState::Authenticated);
    assert!(client.auth().current_session().is_some());
}

#[tokio::test]
async fn rejected_login_is_invalid_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "failure",
            "description": "Incorrect user name or password"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.login(USERNAME, &password()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Auth(AuthError::InvalidCredentials { ref message }) if message.contains("Incorrect")
    ));
    assert_eq!(client.auth().state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn login_without_user_identifier_is_malformed() {
    let (server, client) = setup().await;

    let claims = URL_SAFE_NO_PAD.encode(r#"{"email":"me@example.com"}"#);
    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accesstoken": "access-1",
            "idtoken": format!("h.{claims}.s")
        })))
        .mount(&server)
        .await;

    let err = client.login(USERNAME, &password()).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::MalformedToken { .. })));
}

#[tokio::test]
async fn unreachable_service_is_network_failure() {
    let client = client_for("http://127.0.0.1:1/", Duration::from_secs(2));

    let err = client.login(USERNAME, &password()).await.unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::NetworkFailure { .. })));
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn login_server_error_is_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, 1).await;

    let session = client.login(USERNAME, &password()).await.unwrap();
    assert_eq!(session.user_id, "user-1");
}

// ── Endpoints ───────────────────────────────────────────────────────

#[tokio::test]
async fn list_nodes_sends_raw_token() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .and(header("Authorization", "access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nodes": ["node-a", "node-b"],
            "total": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let nodes = client.list_nodes().await.unwrap();
    assert_eq!(nodes, vec!["node-a".to_owned(), "node-b".to_owned()]);
}

#[tokio::test]
async fn first_call_logs_in_with_stored_credentials() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    client.auth().set_credentials(livsync_api::Credentials {
        username: USERNAME.into(),
        password: password(),
    });

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": []})))
        .mount(&server)
        .await;

    assert!(client.list_nodes().await.unwrap().is_empty());
    assert!(client.auth().current_session().is_some());
}

#[tokio::test]
async fn get_params_drops_unmodeled_entries() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/params"))
        .and(query_param("nodeid", "node-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LIV Hub": {
                "Enable Repellers": true,
                "LED Brightness": 80,
                "LED Hue": 200,
                "Refill Life": 42.0,
                "System Status": 3,
                "Error": 0,
                "System Runtime": 95,
                "Unknown Key": "x"
            },
            "Time": {"TZ": "UTC"},
            "Schedule": {"Schedules": []}
        })))
        .mount(&server)
        .await;

    let params = client.get_params("node-a").await.unwrap();

    assert_eq!(params.devices.len(), 1);
    let hub = params.device("LIV Hub").unwrap();
    assert_eq!(hub.enable_repellers, Some(true));
    assert_eq!(hub.brightness, Some(80.0));
    assert_eq!(hub.system_status, Some(3));
}

#[tokio::test]
async fn get_status_and_config() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/status"))
        .and(query_param("nodeid", "node-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connectivity": {"connected": true, "timestamp": 1_700_000_000_000_i64}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/config"))
        .and(query_param("nodeid", "node-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "node_id": "node-a",
            "info": {"name": "LIV Hub", "fw_version": "5.3.2", "type": "LIV", "model": "thermacell-hub"},
            "devices": [{"name": "LIV Hub", "type": "esp.device.liv"}]
        })))
        .mount(&server)
        .await;

    let status = client.get_status("node-a").await.unwrap();
    assert!(status.connected);
    assert_eq!(status.last_seen.unwrap().timestamp(), 1_700_000_000);

    let config = client.get_config("node-a").await.unwrap();
    assert_eq!(config.firmware_version.as_deref(), Some("5.3.2"));
    assert_eq!(config.devices[0].name, "LIV Hub");
}

#[tokio::test]
async fn set_params_sends_partial_patch() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("PUT"))
        .and(path("/v1/user/nodes/params"))
        .and(query_param("nodeid", "node-a"))
        .and(body_json(json!({"LIV Hub": {"Enable Repellers": false}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let update = ParamsUpdate::for_device(
        "LIV Hub",
        DeviceParamsUpdate {
            enable_repellers: Some(false),
            ..Default::default()
        },
    );
    let outcome = client.set_params("node-a", &update).await.unwrap();
    assert!(outcome.echoed.is_none());
}

#[tokio::test]
async fn set_params_surfaces_echoed_params() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("PUT"))
        .and(path("/v1/user/nodes/params"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "LIV Hub": {"LED Brightness": 75}
        })))
        .mount(&server)
        .await;

    let update = ParamsUpdate::for_device(
        "LIV Hub",
        DeviceParamsUpdate {
            brightness: Some(80),
            ..Default::default()
        },
    );
    let outcome = client.set_params("node-a", &update).await.unwrap();
    let echoed = outcome.echoed.unwrap();
    assert_eq!(echoed.device("LIV Hub").unwrap().brightness, Some(75.0));
}

// ── Re-authentication ───────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_triggers_one_reauth_then_succeeds() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;
    client.login(USERNAME, &password()).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": ["node-a"]})))
        .expect(1)
        .mount(&server)
        .await;

    let nodes = client.list_nodes().await.unwrap();
    assert_eq!(nodes, vec!["node-a".to_owned()]);
}

#[tokio::test]
async fn repeated_unauthorized_reauthenticates_only_once() {
    let (server, client) = setup().await;
    // Initial login plus exactly one re-authentication.
    mount_login(&server, 2).await;
    client.login(USERNAME, &password()).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.list_nodes().await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::SessionRejected)));
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn revoked_credentials_fail_fatally_on_reauth() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    client.login(USERNAME, &password()).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.list_nodes().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Auth(AuthError::InvalidCredentials { .. })
    ));
}

#[tokio::test]
async fn reauthenticate_replaces_the_session() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;
    let before = client.auth().current_session().unwrap();

    let after = client.auth().reauthenticate().await.unwrap();

    assert!(!std::sync::Arc::ptr_eq(&before, &after));
    assert!(std::sync::Arc::ptr_eq(
        &after,
        &client.auth().current_session().unwrap()
    ));
    assert_eq!(client.auth().state(), AuthState::Authenticated);
}

#[tokio::test]
async fn reauthenticate_with_rejected_login_is_invalid_credentials() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    client.login(USERNAME, &password()).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.auth().reauthenticate().await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials { .. }));
    assert!(client.auth().current_session().is_none());
    assert_eq!(client.auth().state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn reauthenticate_without_credentials_is_not_authenticated() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/login2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("access-1")))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.auth().reauthenticate().await.unwrap_err();

    assert!(matches!(err, AuthError::NotAuthenticated));
}

// ── Retry / backoff ─────────────────────────────────────────────────

#[tokio::test]
async fn server_errors_retry_up_to_three_attempts() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/status"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.get_status("node-a").await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 503, .. }));
}

#[tokio::test]
async fn transient_failure_recovers_within_budget() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/status"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connectivity": {"connected": false}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let status = client.get_status("node-a").await.unwrap();
    assert!(!status.connected);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/params"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": "failure",
            "description": "Node not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get_params("missing").await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 404, .. }));
    assert_eq!(err.kind(), ErrorKind::Api);
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": []})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.list_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_rate_limit_surfaces_rate_limited() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.list_nodes().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
}

#[tokio::test]
async fn slow_responses_time_out_per_attempt() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), Duration::from_millis(100));
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"nodes": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let err = client.list_nodes().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn malformed_payload_is_fatal() {
    let (server, client) = setup().await;
    logged_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/v1/user/nodes/params"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "an", "object"])))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get_params("node-a").await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}
