//! Integration tests for the background keep-alive loop
//!
//! These run against real (short) durations rather than a paused clock,
//! since the loop interleaves timers with live socket traffic to the mock
//! server. Intervals are kept to a few hundred milliseconds with generous
//! assertion margins.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidora_client::{Client, ClientConfig, Credentials, KeepAliveOptions};

// ============================================================================
// Test helpers
// ============================================================================

/// Install a test-writer subscriber so loop activity shows up under
/// `--nocapture`. Safe to call from every test; later calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("vidora_client=debug")
        .with_test_writer()
        .try_init();
}

fn client_with_keep_alive(server: &MockServer, options: KeepAliveOptions) -> Client {
    let url = Url::parse(&server.uri()).expect("mock server URI");
    let config = ClientConfig::builder(url)
        .credentials(Credentials::new().api_key("k", "s"))
        .keep_alive(options)
        .build();
    Client::new(config).expect("client construction")
}

fn fast_options(verify: bool) -> KeepAliveOptions {
    KeepAliveOptions {
        interval: Duration::from_millis(200),
        extend_threshold: Duration::from_millis(120),
        verify,
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "keep-alive-token",
            "expiration": (Utc::now() + ChronoDuration::seconds(60)).to_rfc3339(),
        })))
        .mount(server)
        .await;
}

async fn count_requests(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .expect("recorded requests")
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .count()
}

// ============================================================================
// Periodic extension
// ============================================================================

/// Tests that the loop extends the session on its interval.
///
/// Assertions:
/// - Multiple extend calls arrive within a few intervals of connecting.
/// - No keep-alive error is recorded.
#[tokio::test]
async fn test_keep_alive_extends_periodically() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/extend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expiration": (Utc::now() + ChronoDuration::seconds(60)).to_rfc3339(),
        })))
        .mount(&server)
        .await;

    let client = client_with_keep_alive(&server, fast_options(false));
    client.connect().await.expect("connect");

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(count_requests(&server, "/api/v2/auth/extend").await >= 2);
    assert!(client.session().keep_alive_error().is_none());
    assert!(client.session().is_connected().await);
}

/// Tests that disconnecting stops the loop: no further extends after logoff.
#[tokio::test]
async fn test_keep_alive_stops_on_disconnect() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/extend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expiration": (Utc::now() + ChronoDuration::seconds(60)).to_rfc3339(),
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/tokens/k"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_with_keep_alive(&server, fast_options(false));
    client.connect().await.expect("connect");
    tokio::time::sleep(Duration::from_millis(300)).await;

    client.disconnect().await.expect("disconnect");
    let extends_at_disconnect = count_requests(&server, "/api/v2/auth/extend").await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(count_requests(&server, "/api/v2/auth/extend").await, extends_at_disconnect);
}

// ============================================================================
// Recovery and failure
// ============================================================================

/// Tests that a session the server stops honoring is re-established: extend
/// fails, verification fails, and the loop falls back to a fresh login.
#[tokio::test]
async fn test_keep_alive_reestablishes_lost_session() {
    init_tracing();
    let server = MockServer::start().await;
    mount_login(&server).await;
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

    let client = client_with_keep_alive(&server, fast_options(true));
    client.connect().await.expect("connect");

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(count_requests(&server, "/api/v2/authenticate").await >= 2);
    assert!(client.session().keep_alive_error().is_none());
    assert!(client.session().is_connected().await);
}

/// Tests that a failed re-login is fatal to the loop: the error is recorded
/// on the session and no further attempts are made.
#[tokio::test]
async fn test_keep_alive_records_fatal_error_and_stops() {
    init_tracing();
    let server = MockServer::start().await;
    // One successful login for connect, terminal 503 afterwards
    Mock::given(method("POST"))
        .and(path("/api/v2/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "keep-alive-token",
            "expiration": (Utc::now() + ChronoDuration::seconds(60)).to_rfc3339(),
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/authenticate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
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

    let client = client_with_keep_alive(&server, fast_options(true));
    client.connect().await.expect("connect");

    // Wait for the loop to hit the fatal re-login failure
    let mut recorded = None;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        recorded = client.session().keep_alive_error();
        if recorded.is_some() {
            break;
        }
    }
    let error = recorded.expect("keep-alive error should be recorded");
    assert!(error.contains("503"));

    // Loop has stopped: the failed-login count stays put
    let logins_at_failure = count_requests(&server, "/api/v2/authenticate").await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(count_requests(&server, "/api/v2/authenticate").await, logins_at_failure);
}
