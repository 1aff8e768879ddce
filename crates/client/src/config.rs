//! Client configuration
//!
//! Everything a [`crate::Client`](crate::client::Client) needs at
//! construction time: the platform URL, the credentials bag, keep-alive
//! behavior, and per-category rate limits.
//!
//! The credentials bag is write-once and deliberately opaque: fields are
//! module-private, `Debug` is redacted, and the type does not implement
//! `Serialize`, so secrets cannot leak through accidental logging or
//! serialization. Host applications that want to persist a session use the
//! [`SessionSnapshot`] type instead, which carries only the token and its
//! expiration.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Snapshot of a live session for host-side persistence
///
/// The crate itself owns no on-disk state; a host application may serialize
/// this snapshot, store it, and later seed a new client with it to resume
/// the session without an immediate login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Bearer token for API authentication
    pub token: String,

    /// Absolute expiration timestamp (UTC)
    pub expiration: DateTime<Utc>,

    /// User id associated with the session, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Refresh token, for OAuth sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// API key the session was opened with, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl SessionSnapshot {
    /// Whether this snapshot still represents a live session
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiration
    }
}

/// Keep-alive loop configuration
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveOptions {
    /// Upper bound between extension attempts
    pub interval: Duration,

    /// How close to expiry a session may get before a plain extend is no
    /// longer preferred over verification / re-login
    pub extend_threshold: Duration,

    /// Whether `lazy_extend` should verify the session before treating a
    /// within-threshold token as still valid
    pub verify: bool,
}

impl Default for KeepAliveOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            extend_threshold: Duration::from_secs(3 * 60),
            verify: true,
        }
    }
}

/// Named operation categories for client-side rate limiting
///
/// Each category gets its own independent gate so that throttling one
/// operation type never blocks unrelated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitCategory {
    /// Generic GET requests
    Get,
    /// Generic POST requests
    Post,
    /// Video search queries
    SearchVideos,
    /// Video file uploads
    UploadVideo,
    /// Video metadata updates
    UpdateVideoMetadata,
    /// Single-video detail lookups
    GetVideoDetails,
    /// User login report extraction
    LoginReport,
    /// Audit log queries
    Audit,
    /// Realtime webcast attendee polling
    AttendeesRealtime,
    /// Video view report extraction
    VideoViewReport,
}

impl RateLimitCategory {
    /// All known categories, used to build the per-category queue map
    pub(crate) const ALL: [Self; 10] = [
        Self::Get,
        Self::Post,
        Self::SearchVideos,
        Self::UploadVideo,
        Self::UpdateVideoMetadata,
        Self::GetVideoDetails,
        Self::LoginReport,
        Self::Audit,
        Self::AttendeesRealtime,
        Self::VideoViewReport,
    ];
}

/// Per-category calls-per-minute budgets
///
/// A rate of `0` disables limiting for that category. `RateLimits::default()`
/// carries the platform's documented per-minute quotas.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub get: u32,
    pub post: u32,
    pub search_videos: u32,
    pub upload_video: u32,
    pub update_video_metadata: u32,
    pub get_video_details: u32,
    pub login_report: u32,
    pub audit: u32,
    pub attendees_realtime: u32,
    pub video_view_report: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            get: 0,
            post: 0,
            search_videos: 120,
            upload_video: 30,
            update_video_metadata: 30,
            get_video_details: 2000,
            login_report: 10,
            audit: 60,
            attendees_realtime: 2,
            video_view_report: 120,
        }
    }
}

impl RateLimits {
    /// The configured calls-per-minute budget for one category
    #[must_use]
    pub fn rate_for(&self, category: RateLimitCategory) -> u32 {
        match category {
            RateLimitCategory::Get => self.get,
            RateLimitCategory::Post => self.post,
            RateLimitCategory::SearchVideos => self.search_videos,
            RateLimitCategory::UploadVideo => self.upload_video,
            RateLimitCategory::UpdateVideoMetadata => self.update_video_metadata,
            RateLimitCategory::GetVideoDetails => self.get_video_details,
            RateLimitCategory::LoginReport => self.login_report,
            RateLimitCategory::Audit => self.audit,
            RateLimitCategory::AttendeesRealtime => self.attendees_realtime,
            RateLimitCategory::VideoViewReport => self.video_view_report,
        }
    }
}

/// Write-once credentials bag
///
/// Populated through the fluent setters and inspected exactly once by the
/// session factory, which deterministically selects the matching
/// authentication scheme (see `auth::variants`).
#[derive(Default, Clone)]
pub struct Credentials {
    pub(crate) api_key: Option<String>,
    pub(crate) secret: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) auth_code: Option<String>,
    pub(crate) oauth2_code: Option<String>,
    pub(crate) code_verifier: Option<String>,
    pub(crate) jwt_token: Option<String>,
    pub(crate) guest_registration_token: Option<String>,
    pub(crate) webcast_id: Option<String>,
    pub(crate) access_token: Option<String>,
    pub(crate) session: Option<SessionSnapshot>,
    pub(crate) public_only: bool,
}

impl Credentials {
    /// Start an empty credentials bag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// API key + secret authentication
    #[must_use]
    pub fn api_key<K: Into<String>, S: Into<String>>(mut self, key: K, secret: S) -> Self {
        self.api_key = Some(key.into());
        self.secret = Some(secret.into());
        self
    }

    /// Username + password authentication
    #[must_use]
    pub fn username_password<U: Into<String>, P: Into<String>>(
        mut self,
        username: U,
        password: P,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Legacy OAuth authorization code
    #[must_use]
    pub fn oauth_auth_code<C: Into<String>>(mut self, auth_code: C) -> Self {
        self.auth_code = Some(auth_code.into());
        self
    }

    /// OAuth2 PKCE authorization code + verifier pair
    #[must_use]
    pub fn oauth2_code<C: Into<String>, V: Into<String>>(mut self, code: C, verifier: V) -> Self {
        self.oauth2_code = Some(code.into());
        self.code_verifier = Some(verifier.into());
        self
    }

    /// JWT authentication
    #[must_use]
    pub fn jwt<T: Into<String>>(mut self, jwt_token: T) -> Self {
        self.jwt_token = Some(jwt_token.into());
        self
    }

    /// Guest registration for a public webcast
    #[must_use]
    pub fn guest_registration<W: Into<String>, R: Into<String>>(
        mut self,
        webcast_id: W,
        registration_token: R,
    ) -> Self {
        self.webcast_id = Some(webcast_id.into());
        self.guest_registration_token = Some(registration_token.into());
        self
    }

    /// Externally supplied access token (verify-only session)
    #[must_use]
    pub fn access_token<T: Into<String>>(mut self, token: T) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Resume from a previously persisted session snapshot
    #[must_use]
    pub fn session(mut self, snapshot: SessionSnapshot) -> Self {
        self.session = Some(snapshot);
        self
    }

    /// Anonymous access to public resources only
    #[must_use]
    pub fn public_only(mut self) -> Self {
        self.public_only = true;
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets never appear in debug output
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("has_auth_code", &self.auth_code.is_some())
            .field("has_oauth2_code", &self.oauth2_code.is_some())
            .field("has_jwt", &self.jwt_token.is_some())
            .field("has_guest_registration", &self.guest_registration_token.is_some())
            .field("has_access_token", &self.access_token.is_some())
            .field("has_session", &self.session.is_some())
            .field("public_only", &self.public_only)
            .finish()
    }
}

/// Full client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the platform tenant (e.g. `https://company.vidora.example`)
    pub url: Url,

    /// Credentials bag, inspected once by the session factory
    pub credentials: Credentials,

    /// Keep-alive behavior; `None` disables the background loop
    pub keep_alive: Option<KeepAliveOptions>,

    /// Per-category rate limits; `None` disables client-side throttling
    pub rate_limits: Option<RateLimits>,
}

impl ClientConfig {
    /// Start building a configuration for the given tenant URL
    #[must_use]
    pub fn builder(url: Url) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                url,
                credentials: Credentials::default(),
                keep_alive: None,
                rate_limits: None,
            },
        }
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the credentials bag
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    /// Enable the keep-alive loop with the given options
    #[must_use]
    pub fn keep_alive(mut self, options: KeepAliveOptions) -> Self {
        self.config.keep_alive = Some(options);
        self
    }

    /// Enable client-side rate limiting
    #[must_use]
    pub fn rate_limits(mut self, limits: RateLimits) -> Self {
        self.config.rate_limits = Some(limits);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
