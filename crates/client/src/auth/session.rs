//! Session lifecycle state machine
//!
//! A [`Session`] owns the mutable authentication state (token, expiration,
//! user id, refresh token), runs the login/extend/logoff/verify operations
//! through its [`AuthVariant`], and hosts the per-category rate-limit gates
//! and the optional background keep-alive loop.
//!
//! Invariants maintained here:
//! - `login` clears the previous token before the exchange and publishes the
//!   new token and expiration together, so no observer sees a new token with
//!   a stale expiration.
//! - A failed `extend` leaves the current token in place; the session decays
//!   naturally rather than being torn down early.
//! - `logoff` clears local state even when the remote call fails.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{KeepAliveOptions, RateLimitCategory, RateLimits, SessionSnapshot};
use crate::error::{ClientError, ClientResult};
use crate::ratelimit::RateLimitQueues;
use crate::transport::HttpTransport;

use super::keep_alive::KeepAliveHandle;
use super::variants::AuthVariant;

#[derive(Debug, Default, Clone)]
struct SessionState {
    token: Option<String>,
    expires: Option<DateTime<Utc>>,
    user_id: Option<String>,
    refresh_token: Option<String>,
}

/// An authenticated (or deliberately anonymous) session with the platform
pub struct Session {
    http: Arc<HttpTransport>,
    variant: AuthVariant,
    state: RwLock<SessionState>,
    keep_alive_options: Option<KeepAliveOptions>,
    keep_alive: Mutex<Option<KeepAliveHandle>>,
    keep_alive_error: Mutex<Option<ClientError>>,
    rate_limits: Option<RateLimitQueues>,
}

impl Session {
    /// Build a session for the given variant
    ///
    /// A credentials bag carrying a non-expired snapshot seeds the state, so
    /// the session starts connected without a login exchange.
    pub(crate) fn new(
        http: Arc<HttpTransport>,
        variant: AuthVariant,
        seed: Option<&SessionSnapshot>,
        keep_alive_options: Option<KeepAliveOptions>,
        rate_limits: Option<&RateLimits>,
    ) -> Self {
        let state = match seed {
            Some(snapshot) if !snapshot.is_expired() => SessionState {
                token: Some(snapshot.token.clone()),
                expires: Some(snapshot.expiration),
                user_id: snapshot.user_id.clone(),
                refresh_token: snapshot.refresh_token.clone(),
            },
            _ => SessionState::default(),
        };

        Self {
            http,
            variant,
            state: RwLock::new(state),
            keep_alive_options,
            keep_alive: Mutex::new(None),
            keep_alive_error: Mutex::new(None),
            rate_limits: rate_limits.map(RateLimitQueues::new),
        }
    }

    /// Current bearer token, if any
    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    /// Whether the session holds a token that has not yet expired
    ///
    /// Token-seeded and public-only sessions report connected without any
    /// exchange having happened.
    pub async fn is_connected(&self) -> bool {
        if self.variant.is_degenerate() {
            return true;
        }
        let state = self.state.read().await;
        state.token.is_some() && state.expires.is_some_and(|expires| Utc::now() <= expires)
    }

    /// Whether the session's expiration has passed
    ///
    /// A session with no token at all also reports expired. Degenerate
    /// variants never expire.
    pub async fn is_expired(&self) -> bool {
        if self.variant.is_degenerate() {
            return false;
        }
        let state = self.state.read().await;
        match state.expires {
            Some(expires) => state.token.is_none() || Utc::now() > expires,
            None => true,
        }
    }

    /// Seconds until expiration (zero when already expired or disconnected)
    pub async fn time_remaining(&self) -> Duration {
        let state = self.state.read().await;
        let Some(expires) = state.expires else {
            return Duration::ZERO;
        };
        if state.token.is_none() && !self.variant.is_degenerate() {
            return Duration::ZERO;
        }
        (expires - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Snapshot the live session for host-side persistence
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.state.read().await;
        let token = state.token.clone()?;
        let expiration = state.expires?;
        Some(SessionSnapshot {
            token,
            expiration,
            user_id: state.user_id.clone(),
            refresh_token: state.refresh_token.clone(),
            api_key: self.variant.snapshot_api_key().map(String::from),
        })
    }

    /// Establish the session: run the variant's login exchange
    ///
    /// The previous token is cleared before the exchange; the new token and
    /// expiration are published atomically afterwards.
    ///
    /// # Errors
    /// Propagates the variant's login failure; local state stays cleared.
    pub async fn login(&self) -> ClientResult<()> {
        {
            let mut state = self.state.write().await;
            state.token = None;
            state.expires = None;
        }

        let outcome = self.variant.login(&self.http).await?;
        info!(expiration = %outcome.expiration, "session established");

        {
            let mut state = self.state.write().await;
            state.token = outcome.token;
            state.expires = Some(outcome.expiration);
            state.user_id = outcome.user_id;
            state.refresh_token = outcome.refresh_token;
        }

        self.clear_keep_alive_error();
        Ok(())
    }

    /// Extend the current session's lifetime
    ///
    /// On success the expiration (and, for OAuth variants, the rotated
    /// token pair) is updated. On failure the current state is untouched.
    ///
    /// # Errors
    /// Propagates the variant's extend failure.
    pub async fn extend(&self) -> ClientResult<()> {
        let (token, user_id, refresh_token) = {
            let state = self.state.read().await;
            (state.token.clone(), state.user_id.clone(), state.refresh_token.clone())
        };

        let outcome = self
            .variant
            .extend(&self.http, token.as_deref(), user_id.as_deref(), refresh_token.as_deref())
            .await?;
        debug!(expiration = %outcome.expiration, "session extended");

        let mut state = self.state.write().await;
        state.expires = Some(outcome.expiration);
        if let Some(new_token) = outcome.token {
            state.token = Some(new_token);
        }
        if let Some(new_refresh) = outcome.refresh_token {
            state.refresh_token = Some(new_refresh);
        }
        Ok(())
    }

    /// Tear the session down
    ///
    /// Stops the keep-alive loop, attempts the remote logoff, and clears
    /// local state regardless of whether the remote call succeeded.
    ///
    /// # Errors
    /// Propagates the remote logoff failure (after local state is cleared).
    pub async fn logoff(&self) -> ClientResult<()> {
        self.stop_keep_alive();

        let (token, user_id) = {
            let state = self.state.read().await;
            (state.token.clone(), state.user_id.clone())
        };

        let result = self.variant.logoff(&self.http, token.as_deref(), user_id.as_deref()).await;

        let mut state = self.state.write().await;
        *state = SessionState::default();
        drop(state);

        if let Err(ref e) = result {
            warn!(error = %e, "remote logoff failed; local session state cleared anyway");
        }
        result
    }

    /// Check with the server whether the current token is still honored
    ///
    /// Never fails: any error (including network failure) reports `false`.
    /// Public-only sessions report `true` without a network call.
    pub async fn verify(&self) -> bool {
        if matches!(self.variant, AuthVariant::PublicOnly) {
            return true;
        }
        let token = self.state.read().await.token.clone();
        let Some(token) = token else {
            return false;
        };

        match self
            .http
            .send_json(reqwest::Method::GET, "/api/v2/user/session", &[], None, Some(&token))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "session verification failed");
                false
            }
        }
    }

    /// Bring the session to a usable state with the cheapest sufficient
    /// operation
    ///
    /// Decision order:
    /// 1. Expired or disconnected: full re-login. Returns `true`.
    /// 2. Comfortably inside the lifetime (more than `extend_threshold`
    ///    remaining): try a plain extend; on success return `true`, on
    ///    failure fall through rather than giving up.
    /// 3. Otherwise (or after a failed extend), optionally verify; a session
    ///    that still verifies is left as-is (`false` = nothing changed), one
    ///    that does not is re-logged-in (`true`).
    ///
    /// # Errors
    /// Propagates only re-login failures; extend and verify failures are
    /// absorbed by the fallback chain.
    pub async fn lazy_extend(&self, options: &KeepAliveOptions) -> ClientResult<bool> {
        let remaining = self.time_remaining().await;

        if remaining.is_zero() {
            debug!("session expired; re-establishing");
            self.login().await?;
            return Ok(true);
        }

        if remaining > options.extend_threshold {
            match self.extend().await {
                Ok(()) => return Ok(true),
                Err(e) => {
                    warn!(error = %e, "session extension failed; falling back to verification");
                }
            }
        }

        if !options.verify || self.verify().await {
            return Ok(false);
        }

        debug!("session no longer verifies; re-establishing");
        self.login().await?;
        Ok(true)
    }

    /// Wait for rate-limit admission in the given category
    ///
    /// Sessions without configured limits admit immediately.
    ///
    /// # Errors
    /// Returns [`ClientError::Cancelled`] if the category's queue is aborted
    /// while waiting.
    pub async fn queue_request(&self, category: RateLimitCategory) -> ClientResult<()> {
        match &self.rate_limits {
            Some(queues) => queues.acquire(category).await,
            None => Ok(()),
        }
    }

    /// Abort all rate-limit queues, releasing every waiter
    pub fn abort_queues(&self, reason: &str) {
        if let Some(queues) = &self.rate_limits {
            queues.abort_all(reason);
        }
    }

    /// The error that stopped the keep-alive loop, if it has stopped
    pub fn keep_alive_error(&self) -> Option<String> {
        #[allow(clippy::unwrap_used)]
        let slot = self.keep_alive_error.lock().unwrap();
        slot.as_ref().map(ToString::to_string)
    }

    pub(crate) fn record_keep_alive_error(&self, error: ClientError) {
        #[allow(clippy::unwrap_used)]
        let mut slot = self.keep_alive_error.lock().unwrap();
        *slot = Some(error);
    }

    fn clear_keep_alive_error(&self) {
        #[allow(clippy::unwrap_used)]
        let mut slot = self.keep_alive_error.lock().unwrap();
        *slot = None;
    }

    /// Start (or restart) the background keep-alive loop
    ///
    /// No-op for sessions without keep-alive configured and for degenerate
    /// variants, which have nothing to renew. At most one loop runs per
    /// session; an existing loop is stopped first.
    pub(crate) fn ensure_keep_alive(self: Arc<Self>) {
        let Some(options) = self.keep_alive_options else {
            return;
        };
        if self.variant.is_degenerate() {
            return;
        }
        let handle = KeepAliveHandle::spawn(&self, options);
        #[allow(clippy::unwrap_used)]
        let mut slot = self.keep_alive.lock().unwrap();
        if let Some(previous) = slot.replace(handle) {
            previous.stop();
        }
    }

    /// Stop the background keep-alive loop, if running
    pub fn stop_keep_alive(&self) {
        #[allow(clippy::unwrap_used)]
        let mut slot = self.keep_alive.lock().unwrap();
        if let Some(handle) = slot.take() {
            handle.stop();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("variant", &self.variant).finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.keep_alive.lock() {
            if let Some(handle) = slot.take() {
                handle.stop();
            }
        }
    }
}
