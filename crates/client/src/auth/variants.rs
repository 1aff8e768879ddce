//! Credential-scheme variants and their remote auth exchanges
//!
//! The original design modeled each credential scheme as a subclass of an
//! abstract session. Here the schemes are a tagged union sharing the state
//! machine in [`super::session`]; each variant only supplies the
//! login/extend/logoff exchanges against its own endpoints.
//!
//! Selection happens once, at construction, via [`AuthVariant::from_credentials`]
//! with a fixed priority order. An unrecognized combination is a
//! configuration error raised before any network activity.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Credentials;
use crate::error::{ClientError, ClientResult};
use crate::transport::HttpTransport;

/// Result of a successful login exchange
#[derive(Debug, Clone)]
pub(crate) struct LoginOutcome {
    /// `None` only for the anonymous public variant
    pub token: Option<String>,
    pub expiration: DateTime<Utc>,
    pub user_id: Option<String>,
    pub refresh_token: Option<String>,
}

/// Result of a successful extend exchange
///
/// `token`/`refresh_token` are `Some` only when the variant rotates them
/// (OAuth); `None` means "keep the current value".
#[derive(Debug, Clone)]
pub(crate) struct ExtendOutcome {
    pub expiration: DateTime<Utc>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    expiration: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserLoginResponse {
    token: String,
    expiration: DateTime<Utc>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendResponse {
    expiration: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthTokenResponse {
    access_token: String,
    expiration: DateTime<Utc>,
    refresh_token: Option<String>,
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> ClientResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::Parse(format!("unexpected auth response shape: {e}")))
}

/// Sessions for pre-supplied tokens and anonymous access have no real
/// credential exchange; they are given an expiry far enough out that the
/// lifecycle machinery never tries to renew them.
fn far_future() -> DateTime<Utc> {
    Utc::now() + Duration::days(365 * 10)
}

/// One authentication scheme, selected from the credentials bag
#[derive(Clone)]
pub(crate) enum AuthVariant {
    ApiKey { key: String, secret: String },
    UserPassword { username: String, password: String },
    OAuthLegacy { auth_code: Option<String> },
    OAuth2Pkce { code: String, verifier: String },
    Jwt { jwt_token: String },
    GuestRegistration { webcast_id: String, registration_token: String },
    AccessToken { token: String },
    PublicOnly,
}

impl AuthVariant {
    /// Select the authentication scheme for a credentials bag
    ///
    /// Priority order: OAuth2 PKCE > legacy OAuth (auth code, or a resumed
    /// session carrying a refresh token) > API key > JWT > guest
    /// registration > username/password > pre-existing session token >
    /// explicit public-only.
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] when no recognized combination is
    /// present.
    pub(crate) fn from_credentials(credentials: &Credentials) -> ClientResult<Self> {
        if let (Some(code), Some(verifier)) =
            (&credentials.oauth2_code, &credentials.code_verifier)
        {
            return Ok(Self::OAuth2Pkce { code: code.clone(), verifier: verifier.clone() });
        }
        let resumed_refresh =
            credentials.session.as_ref().and_then(|s| s.refresh_token.as_ref()).is_some();
        if credentials.auth_code.is_some() || resumed_refresh {
            return Ok(Self::OAuthLegacy { auth_code: credentials.auth_code.clone() });
        }
        if let (Some(key), Some(secret)) = (&credentials.api_key, &credentials.secret) {
            return Ok(Self::ApiKey { key: key.clone(), secret: secret.clone() });
        }
        if let Some(jwt_token) = &credentials.jwt_token {
            return Ok(Self::Jwt { jwt_token: jwt_token.clone() });
        }
        if let (Some(webcast_id), Some(registration_token)) =
            (&credentials.webcast_id, &credentials.guest_registration_token)
        {
            return Ok(Self::GuestRegistration {
                webcast_id: webcast_id.clone(),
                registration_token: registration_token.clone(),
            });
        }
        if let (Some(username), Some(password)) = (&credentials.username, &credentials.password) {
            return Ok(Self::UserPassword {
                username: username.clone(),
                password: password.clone(),
            });
        }
        if let Some(token) = &credentials.access_token {
            return Ok(Self::AccessToken { token: token.clone() });
        }
        if let Some(snapshot) = &credentials.session {
            if !snapshot.is_expired() {
                return Ok(Self::AccessToken { token: snapshot.token.clone() });
            }
        }
        if credentials.public_only {
            return Ok(Self::PublicOnly);
        }

        Err(ClientError::config("no recognized credential combination was supplied"))
    }

    /// Variants whose connected/expired state is hardcoded because there is
    /// no real credential exchange to track
    pub(crate) fn is_degenerate(&self) -> bool {
        matches!(self, Self::AccessToken { .. } | Self::PublicOnly)
    }

    /// The API key to expose in session snapshots, when applicable
    pub(crate) fn snapshot_api_key(&self) -> Option<&str> {
        match self {
            Self::ApiKey { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Run the variant's login exchange
    pub(crate) async fn login(&self, http: &HttpTransport) -> ClientResult<LoginOutcome> {
        match self {
            Self::ApiKey { key, secret } => {
                let body = json!({ "apiKey": key, "secret": secret });
                let value = http
                    .send_json(Method::POST, "/api/v2/authenticate", &[], Some(&body), None)
                    .await?;
                let response: TokenResponse = parse(value)?;
                Ok(LoginOutcome {
                    token: Some(response.token),
                    expiration: response.expiration,
                    user_id: None,
                    refresh_token: None,
                })
            }
            Self::UserPassword { username, password } => {
                let body = json!({ "username": username, "password": password });
                let value = http
                    .send_json(Method::POST, "/api/v2/user/login", &[], Some(&body), None)
                    .await?;
                let response: UserLoginResponse = parse(value)?;
                Ok(LoginOutcome {
                    token: Some(response.token),
                    expiration: response.expiration,
                    user_id: response.id,
                    refresh_token: None,
                })
            }
            Self::OAuthLegacy { auth_code } => {
                let auth_code = auth_code.as_ref().ok_or_else(|| {
                    ClientError::config(
                        "legacy OAuth session has no authorization code; resume with a refresh token instead",
                    )
                })?;
                let body = json!({ "authCode": auth_code, "grantType": "authorization_code" });
                Self::oauth_exchange(http, "/api/v2/oauth/token", &body).await
            }
            Self::OAuth2Pkce { code, verifier } => {
                let body = json!({
                    "authCode": code,
                    "codeVerifier": verifier,
                    "grantType": "authorization_code",
                });
                Self::oauth_exchange(http, "/api/v2/oauth2/token", &body).await
            }
            Self::Jwt { jwt_token } => {
                let query = [("jwt_token".to_string(), jwt_token.clone())];
                let value = http
                    .send_json(Method::GET, "/api/v2/jwtauthenticate", &query, None, None)
                    .await?;
                let response: OAuthTokenResponse = parse(value)?;
                Ok(LoginOutcome {
                    token: Some(response.access_token),
                    expiration: response.expiration,
                    user_id: None,
                    refresh_token: None,
                })
            }
            Self::GuestRegistration { webcast_id, registration_token } => {
                let path = format!("/api/v2/scheduled-events/{webcast_id}/guest-registration");
                let body = json!({ "registrationToken": registration_token });
                let value = http.send_json(Method::POST, &path, &[], Some(&body), None).await?;
                let response: OAuthTokenResponse = parse(value)?;
                Ok(LoginOutcome {
                    token: Some(response.access_token),
                    expiration: response.expiration,
                    user_id: None,
                    refresh_token: None,
                })
            }
            Self::AccessToken { token } => {
                debug!("access-token session: no login exchange");
                Ok(LoginOutcome {
                    token: Some(token.clone()),
                    expiration: far_future(),
                    user_id: None,
                    refresh_token: None,
                })
            }
            Self::PublicOnly => {
                debug!("public-only session: no login exchange");
                Ok(LoginOutcome {
                    token: None,
                    expiration: far_future(),
                    user_id: None,
                    refresh_token: None,
                })
            }
        }
    }

    /// Run the variant's extend exchange
    ///
    /// `token`/`user_id`/`refresh_token` are the session's current values,
    /// needed by endpoints that identify the session being extended.
    pub(crate) async fn extend(
        &self,
        http: &HttpTransport,
        token: Option<&str>,
        user_id: Option<&str>,
        refresh_token: Option<&str>,
    ) -> ClientResult<ExtendOutcome> {
        match self {
            Self::ApiKey { key, .. } => {
                let body = json!({ "apiKey": key });
                let value = http
                    .send_json(Method::POST, "/api/v2/auth/extend", &[], Some(&body), token)
                    .await?;
                let response: ExtendResponse = parse(value)?;
                Ok(ExtendOutcome {
                    expiration: response.expiration,
                    token: None,
                    refresh_token: None,
                })
            }
            Self::UserPassword { .. } | Self::AccessToken { .. } => {
                let body = user_id.map(|id| json!({ "userId": id }));
                let value = http
                    .send_json(
                        Method::POST,
                        "/api/v2/user/extend-session",
                        &[],
                        body.as_ref(),
                        token,
                    )
                    .await?;
                let response: ExtendResponse = parse(value)?;
                Ok(ExtendOutcome {
                    expiration: response.expiration,
                    token: None,
                    refresh_token: None,
                })
            }
            Self::OAuthLegacy { .. } => {
                let refresh_token = refresh_token.ok_or_else(|| {
                    ClientError::config("OAuth session has no refresh token to extend with")
                })?;
                let body = json!({ "refreshToken": refresh_token, "grantType": "refresh_token" });
                let outcome = Self::oauth_exchange(http, "/api/v2/oauth/token", &body).await?;
                Ok(ExtendOutcome {
                    expiration: outcome.expiration,
                    token: outcome.token,
                    refresh_token: outcome.refresh_token,
                })
            }
            Self::OAuth2Pkce { .. } => {
                let refresh_token = refresh_token.ok_or_else(|| {
                    ClientError::config("OAuth2 session has no refresh token to extend with")
                })?;
                let body = json!({ "refreshToken": refresh_token, "grantType": "refresh_token" });
                let outcome = Self::oauth_exchange(http, "/api/v2/oauth2/token", &body).await?;
                Ok(ExtendOutcome {
                    expiration: outcome.expiration,
                    token: outcome.token,
                    refresh_token: outcome.refresh_token,
                })
            }
            // These schemes have no extension endpoint; re-run login
            Self::Jwt { .. } | Self::GuestRegistration { .. } => {
                let outcome = self.login(http).await?;
                Ok(ExtendOutcome {
                    expiration: outcome.expiration,
                    token: outcome.token,
                    refresh_token: outcome.refresh_token,
                })
            }
            Self::PublicOnly => {
                Ok(ExtendOutcome { expiration: far_future(), token: None, refresh_token: None })
            }
        }
    }

    /// Run the variant's logoff exchange
    pub(crate) async fn logoff(
        &self,
        http: &HttpTransport,
        token: Option<&str>,
        user_id: Option<&str>,
    ) -> ClientResult<()> {
        match self {
            Self::ApiKey { key, .. } => {
                let path = format!("/api/v2/tokens/{key}");
                http.send_json(Method::DELETE, &path, &[], None, token).await?;
                Ok(())
            }
            Self::UserPassword { .. }
            | Self::OAuthLegacy { .. }
            | Self::OAuth2Pkce { .. }
            | Self::AccessToken { .. } => {
                let body = user_id.map(|id| json!({ "userId": id }));
                http.send_json(Method::POST, "/api/v2/user/logoff", &[], body.as_ref(), token)
                    .await?;
                Ok(())
            }
            // Nothing to tear down server-side
            Self::Jwt { .. } | Self::GuestRegistration { .. } | Self::PublicOnly => Ok(()),
        }
    }

    async fn oauth_exchange(
        http: &HttpTransport,
        path: &str,
        body: &Value,
    ) -> ClientResult<LoginOutcome> {
        let value = http.send_json(Method::POST, path, &[], Some(body), None).await?;
        let response: OAuthTokenResponse = parse(value)?;
        Ok(LoginOutcome {
            token: Some(response.access_token),
            expiration: response.expiration,
            user_id: None,
            refresh_token: response.refresh_token,
        })
    }
}

impl std::fmt::Debug for AuthVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret material stays out of debug output
        let name = match self {
            Self::ApiKey { .. } => "ApiKey",
            Self::UserPassword { .. } => "UserPassword",
            Self::OAuthLegacy { .. } => "OAuthLegacy",
            Self::OAuth2Pkce { .. } => "OAuth2Pkce",
            Self::Jwt { .. } => "Jwt",
            Self::GuestRegistration { .. } => "GuestRegistration",
            Self::AccessToken { .. } => "AccessToken",
            Self::PublicOnly => "PublicOnly",
        };
        f.write_str(name)
    }
}
