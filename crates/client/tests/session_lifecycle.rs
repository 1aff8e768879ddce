//! Integration tests for the session lifecycle
//!
//! These tests verify end-to-end login/extend/verify/logoff flows against a
//! mocked platform, including:
//! - Credential-scheme selection and the login exchange per scheme
//! - Connect-time retry policy (transient vs. terminal failures)
//! - Extension semantics (failed extends never tear the session down)
//! - The lazy-extend decision chain
//! - Snapshot persistence and resume

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidora_client::{Client, ClientConfig, Credentials, KeepAliveOptions, SessionSnapshot};

// ============================================================================
// Test helpers
// ============================================================================

fn client_for(server: &MockServer, credentials: Credentials) -> Client {
    let url = Url::parse(&server.uri()).expect("mock server URI");
    let config = ClientConfig::builder(url).credentials(credentials).build();
    Client::new(config).expect("client construction")
}

fn login_body(minutes_from_now: i64) -> serde_json::Value {
    json!({
        "token": "session-token-1",
        "expiration": (Utc::now() + ChronoDuration::minutes(minutes_from_now)).to_rfc3339(),
    })
}

async fn mount_api_key_login(server: &MockServer, minutes_from_now: i64) {
    Mock::given(method("POST"))
        .and(path("/api/v2/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(minutes_from_now)))
        .mount(server)
        .await;
}

// ============================================================================
// Login / logoff
// ============================================================================

/// Tests the API-key lifecycle: authenticate, snapshot, logoff.
#[tokio::test]
async fn test_api_key_login_and_logoff() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 30).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/tokens/test-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("test-key", "test-secret"));
    client.connect().await.expect("connect");

    assert!(client.session().is_connected().await);
    assert!(!client.session().is_expired().await);

    let snapshot = client.session_snapshot().await.expect("snapshot");
    assert_eq!(snapshot.token, "session-token-1");
    assert_eq!(snapshot.api_key.as_deref(), Some("test-key"));

    client.disconnect().await.expect("disconnect");
    assert!(!client.session().is_connected().await);
    assert!(client.session_snapshot().await.is_none());
}

/// Tests username/password login carrying the user id into the session.
#[tokio::test]
async fn test_user_login_captures_user_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "user-token",
            "expiration": (Utc::now() + ChronoDuration::minutes(30)).to_rfc3339(),
            "id": "user-42",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().username_password("alice", "pw"));
    client.connect().await.expect("connect");

    let snapshot = client.session_snapshot().await.expect("snapshot");
    assert_eq!(snapshot.user_id.as_deref(), Some("user-42"));
}

/// Tests that connectedness requires a live expiration, not just a token.
///
/// Assertions:
/// - A login yielding an already-past expiration leaves the session
///   expired.
/// - An expired session does not report connected even though it still
///   holds a token.
#[tokio::test]
async fn test_expired_session_is_not_connected() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, -5).await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.session().login().await.expect("login");

    assert!(client.session().is_expired().await);
    assert!(!client.session().is_connected().await);
    // The token itself is still present for snapshot purposes
    assert!(client.session().token().await.is_some());
}

/// Tests that local state is cleared even when the remote logoff fails.
#[tokio::test]
async fn test_logoff_clears_state_on_remote_failure() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 30).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/tokens/k"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");

    assert!(client.disconnect().await.is_err());
    // Token is gone regardless of the remote failure
    assert!(!client.session().is_connected().await);
}

// ============================================================================
// Connect retry policy
// ============================================================================

/// Tests that transient (5xx) login failures are retried until success.
#[tokio::test]
async fn test_connect_retries_transient_failures() {
    let server = MockServer::start().await;
    // Two failures, then the catch-all success below takes over
    Mock::given(method("POST"))
        .and(path("/api/v2/authenticate"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_api_key_login(&server, 30).await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect should succeed on the third attempt");
    assert!(client.session().is_connected().await);
}

/// Tests that a 401 fails immediately: retrying bad credentials is futile.
#[tokio::test]
async fn test_connect_does_not_retry_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/authenticate"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "code": "InvalidCredentials", "detail": "bad key" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("bad", "creds"));
    let err = client.connect().await.expect_err("connect should fail");
    assert_eq!(err.http_status(), Some(401));
}

/// Tests that a 429 is also terminal (retrying risks account lockout).
#[tokio::test]
async fn test_connect_does_not_retry_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/authenticate"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    let err = client.connect().await.expect_err("connect should fail");
    assert_eq!(err.http_status(), Some(429));
}

// ============================================================================
// Extension
// ============================================================================

/// Tests that a successful extend pushes the expiration forward.
#[tokio::test]
async fn test_extend_updates_expiration() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 10).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/extend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expiration": (Utc::now() + ChronoDuration::minutes(60)).to_rfc3339(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");

    let before = client.session().time_remaining().await;
    client.session().extend().await.expect("extend");
    let after = client.session().time_remaining().await;
    assert!(after > before);
}

/// Tests that a failed extend leaves the session intact: the token stays
/// usable until its natural expiration.
#[tokio::test]
async fn test_failed_extend_keeps_session() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 10).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/extend"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");

    assert!(client.session().extend().await.is_err());
    assert!(client.session().is_connected().await);
    assert!(!client.session().is_expired().await);
    assert_eq!(
        client.session_snapshot().await.expect("snapshot").token,
        "session-token-1"
    );
}

// ============================================================================
// Verification
// ============================================================================

/// Tests that verify maps any outcome to a plain bool.
#[tokio::test]
async fn test_verify_never_fails() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 30).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/user/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user-1" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/user/session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");

    assert!(client.verify().await);
    // Second call hits the 401 mock: reported as false, not an error
    assert!(!client.verify().await);
}

// ============================================================================
// Lazy extension decision chain
// ============================================================================

fn lazy_options(threshold_secs: u64, verify: bool) -> KeepAliveOptions {
    KeepAliveOptions {
        interval: std::time::Duration::from_secs(600),
        extend_threshold: std::time::Duration::from_secs(threshold_secs),
        verify,
    }
}

/// Tests the expired branch: a session past its expiration goes straight to
/// a full re-login.
#[tokio::test]
async fn test_lazy_extend_relogs_expired_session() {
    let server = MockServer::start().await;
    // Expiration already in the past
    mount_api_key_login(&server, -1).await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");
    assert!(client.session().is_expired().await);

    let changed = client.session().lazy_extend(&lazy_options(180, true)).await.expect("lazy");
    assert!(changed);

    let authenticate_calls = server
        .received_requests()
        .await
        .expect("recorded requests")
        .iter()
        .filter(|r| r.url.path() == "/api/v2/authenticate")
        .count();
    assert_eq!(authenticate_calls, 2);
}

/// Tests the comfortable-margin branch: plenty of lifetime left means a
/// plain extend, reported as a change.
#[tokio::test]
async fn test_lazy_extend_extends_when_comfortable() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 30).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/extend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expiration": (Utc::now() + ChronoDuration::minutes(60)).to_rfc3339(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");

    let changed = client.session().lazy_extend(&lazy_options(180, true)).await.expect("lazy");
    assert!(changed);
}

/// Tests the inside-threshold branch: a session that still verifies is left
/// untouched.
#[tokio::test]
async fn test_lazy_extend_leaves_verifying_session_alone() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/user/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");

    // Two minutes left against a three-minute threshold: verify, keep
    let changed = client.session().lazy_extend(&lazy_options(180, true)).await.expect("lazy");
    assert!(!changed);
}

/// Tests the fallback chain: a failed extend falls through to verification,
/// and a failed verification triggers a full re-login.
#[tokio::test]
async fn test_lazy_extend_falls_back_to_relogin() {
    let server = MockServer::start().await;
    mount_api_key_login(&server, 30).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/extend"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/user/session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server, Credentials::new().api_key("k", "s"));
    client.connect().await.expect("connect");

    let changed = client.session().lazy_extend(&lazy_options(180, true)).await.expect("lazy");
    assert!(changed);

    let authenticate_calls = server
        .received_requests()
        .await
        .expect("recorded requests")
        .iter()
        .filter(|r| r.url.path() == "/api/v2/authenticate")
        .count();
    assert_eq!(authenticate_calls, 2);
}

// ============================================================================
// Seeded sessions
// ============================================================================

/// Tests that a token-seeded session is usable without any login exchange.
#[tokio::test]
async fn test_access_token_session_skips_login() {
    let server = MockServer::start().await;
    // No authenticate mock mounted: any login attempt would fail

    let client = client_for(&server, Credentials::new().access_token("external-token"));
    client.connect().await.expect("connect must not hit the network");

    assert!(client.session().is_connected().await);
    assert!(!client.session().is_expired().await);
    assert_eq!(client.session().token().await.as_deref(), Some("external-token"));
}

/// Tests resuming from a persisted snapshot: the serialized session seeds a
/// new client which starts connected with the same token.
#[tokio::test]
async fn test_snapshot_resume() {
    let server = MockServer::start().await;

    let snapshot = SessionSnapshot {
        token: "persisted-token".to_string(),
        expiration: Utc::now() + ChronoDuration::minutes(20),
        user_id: Some("user-7".to_string()),
        refresh_token: None,
        api_key: None,
    };
    let serialized = serde_json::to_string(&snapshot).expect("serialize snapshot");
    let restored: SessionSnapshot = serde_json::from_str(&serialized).expect("deserialize");

    let client = client_for(&server, Credentials::new().session(restored));
    client.connect().await.expect("connect must not hit the network");

    assert_eq!(client.session().token().await.as_deref(), Some("persisted-token"));
    let roundtrip = client.session_snapshot().await.expect("snapshot");
    assert_eq!(roundtrip.user_id.as_deref(), Some("user-7"));
}

/// Tests that a public-only session reports connected and verifies without
/// network calls.
#[tokio::test]
async fn test_public_only_session() {
    let server = MockServer::start().await;

    let client = client_for(&server, Credentials::new().public_only());
    client.connect().await.expect("connect");

    assert!(client.session().is_connected().await);
    assert!(client.verify().await);
    assert_eq!(client.session().token().await, None);
    assert!(server.received_requests().await.expect("recorded requests").is_empty());
}
