//! Client facade
//!
//! A cheaply cloneable handle tying together the transport, the session, and
//! the typed API surfaces. Construction is synchronous and validates the
//! credentials bag up front; the first network activity happens in
//! [`Client::connect`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{AuditApi, VideosApi};
use crate::auth::{AuthVariant, Session};
use crate::config::{ClientConfig, RateLimitCategory, SessionSnapshot};
use crate::error::ClientResult;
use crate::transport::HttpTransport;

/// Login attempts made by [`Client::connect`] before giving up
const CONNECT_ATTEMPTS: u32 = 3;

/// Delay between connect attempts
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

struct ClientInner {
    http: Arc<HttpTransport>,
    session: Arc<Session>,
}

/// Handle to one platform tenant
///
/// Clones share the same session and rate-limit state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Build a client from a configuration
    ///
    /// Resolves the credentials bag into a concrete authentication scheme
    /// synchronously; no network activity happens here.
    ///
    /// # Errors
    /// Returns [`ClientError::Config`](crate::error::ClientError::Config)
    /// when the credentials bag holds no recognized combination or the
    /// transport cannot be built.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Arc::new(HttpTransport::new(config.url)?);
        let variant = AuthVariant::from_credentials(&config.credentials)?;
        let session = Arc::new(Session::new(
            Arc::clone(&http),
            variant,
            config.credentials.session.as_ref(),
            config.keep_alive,
            config.rate_limits.as_ref(),
        ));

        Ok(Self { inner: Arc::new(ClientInner { http, session }) })
    }

    /// The session backing this client
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    /// Establish the session
    ///
    /// Already-connected sessions (snapshot-seeded, token-seeded, or
    /// public-only) are left alone. Otherwise the login exchange runs with a
    /// small number of retries; only transient failures (transport errors,
    /// 5xx) are retried, since a 401 is futile and a 429 risks lockout.
    ///
    /// # Errors
    /// The last login failure, once the attempts are exhausted.
    pub async fn connect(&self) -> ClientResult<()> {
        let session = &self.inner.session;
        if session.is_connected().await {
            debug!("session already connected; skipping login");
            Arc::clone(session).ensure_keep_alive();
            return Ok(());
        }

        let mut attempt = 1;
        loop {
            match session.login().await {
                Ok(()) => {
                    Arc::clone(session).ensure_keep_alive();
                    return Ok(());
                }
                Err(e) if attempt < CONNECT_ATTEMPTS && e.is_retryable() => {
                    warn!(error = %e, attempt, "login attempt failed; retrying");
                    attempt += 1;
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Tear the session down
    ///
    /// Stops the keep-alive loop, releases every rate-limit waiter, and
    /// attempts the remote logoff. Local state is cleared even when the
    /// remote call fails.
    ///
    /// # Errors
    /// Propagates the remote logoff failure.
    pub async fn disconnect(&self) -> ClientResult<()> {
        self.inner.session.abort_queues("client disconnecting");
        self.inner.session.logoff().await
    }

    /// Check with the server whether the session is still honored
    pub async fn verify(&self) -> bool {
        self.inner.session.verify().await
    }

    /// Snapshot the live session for host-side persistence
    pub async fn session_snapshot(&self) -> Option<SessionSnapshot> {
        self.inner.session.snapshot().await
    }

    /// Issue a raw API request through the session
    ///
    /// Waits for rate-limit admission in `category` (when given), then sends
    /// the request with the token read at call time, so a token refreshed by
    /// the keep-alive loop is picked up automatically.
    ///
    /// # Errors
    /// Rate-limit cancellation, transport, and API errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        category: Option<RateLimitCategory>,
    ) -> ClientResult<Value> {
        if let Some(category) = category {
            self.inner.session.queue_request(category).await?;
        }
        let token = self.inner.session.token().await;
        self.inner.http.send_json(method, path, query, body, token.as_deref()).await
    }

    /// GET sugar over [`request`](Self::request), throttled as a generic GET
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn get(&self, path: &str, query: &[(String, String)]) -> ClientResult<Value> {
        self.request(Method::GET, path, query, None, Some(RateLimitCategory::Get)).await
    }

    /// POST sugar over [`request`](Self::request), throttled as a generic POST
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn post(&self, path: &str, body: &Value) -> ClientResult<Value> {
        self.request(Method::POST, path, &[], Some(body), Some(RateLimitCategory::Post)).await
    }

    /// PUT sugar over [`request`](Self::request); no default throttle category
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn put(&self, path: &str, body: &Value) -> ClientResult<Value> {
        self.request(Method::PUT, path, &[], Some(body), None).await
    }

    /// PATCH sugar over [`request`](Self::request); no default throttle category
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn patch(&self, path: &str, body: &Value) -> ClientResult<Value> {
        self.request(Method::PATCH, path, &[], Some(body), None).await
    }

    /// DELETE sugar over [`request`](Self::request); no default throttle category
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn delete(&self, path: &str) -> ClientResult<Value> {
        self.request(Method::DELETE, path, &[], None, None).await
    }

    /// Video operations
    #[must_use]
    pub fn videos(&self) -> VideosApi {
        VideosApi::new(Arc::clone(&self.inner.http), Arc::clone(&self.inner.session))
    }

    /// Audit log operations
    #[must_use]
    pub fn audit(&self) -> AuditApi {
        AuditApi::new(Arc::clone(&self.inner.http), Arc::clone(&self.inner.session))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.http.base_url().as_str())
            .field("session", &self.inner.session)
            .finish()
    }
}
