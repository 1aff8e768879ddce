//! HTTP call primitive
//!
//! A thin wrapper around [`reqwest::Client`] that builds endpoint URLs,
//! attaches the bearer token, and maps non-success responses into
//! [`ClientError::Api`] with the platform's structured error body when one
//! is present.
//!
//! The transport is constructed once and injected into both the session and
//! the client (replacing the original implementation's mutable global
//! environment object), so there is no initialization-ordering hazard: a
//! component either has a transport or it does not exist yet.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Default request timeout applied to the underlying HTTP client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Structured error body returned by the platform on failure
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    detail: Option<String>,
}

/// Shared HTTP transport for every remote call made by the crate
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport rooted at the given base URL
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: Url) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// The base URL this transport is rooted at
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a request and return the parsed JSON body
    ///
    /// The bearer token is read by the caller at call time (not cached at
    /// construction), so a token refreshed by the keep-alive loop is visible
    /// to requests issued afterwards.
    ///
    /// An empty success body is returned as [`Value::Null`].
    ///
    /// # Errors
    /// - [`ClientError::Transport`] on connection-level failures
    /// - [`ClientError::Api`] on non-2xx responses, carrying the structured
    ///   error body when it was parseable
    /// - [`ClientError::Parse`] when a non-empty success body is not JSON
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        token: Option<&str>,
    ) -> ClientResult<Value> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::config(format!("invalid request path '{path}': {e}")))?;

        debug!(%method, %url, "sending API request");

        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::error_from_body(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ClientError::Parse(format!("invalid JSON response: {e}")))
    }

    /// Build an [`ClientError::Api`] from a failed response body
    fn error_from_body(status: StatusCode, text: &str) -> ClientError {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(text).ok();
        match parsed {
            Some(body) => ClientError::api(status.as_u16(), body.code, body.detail),
            None => {
                let detail = if text.trim().is_empty() { None } else { Some(text.to_string()) };
                ClientError::api(status.as_u16(), None, detail)
            }
        }
    }
}
