//! Scroll-cursor search source
//!
//! The platform's search endpoints window large result sets behind a
//! server-side scroll cursor: the first response carries a `scrollId`, each
//! follow-up request echoes it back, and the cursor expires after a short
//! TTL. This module adapts that protocol to the [`PageSource`] trait so the
//! generic engine can drive it.
//!
//! Two quirks are handled here rather than leaking to callers:
//! - Some endpoints report failures (an expired cursor in particular) inside
//!   an HTTP-2xx body as `statusCode`/`statusDescription`. These become a
//!   typed [`ScrollError`] in [`RawPage::error`].
//! - The end of the result set is signaled by an empty hits array or by the
//!   response omitting the cursor, whichever comes first.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::Session;
use crate::config::RateLimitCategory;
use crate::error::{ClientError, ClientResult, ScrollError};
use crate::transport::HttpTransport;

use super::{PageSource, RawPage};

/// Shape of one scroll-search endpoint
#[derive(Debug, Clone)]
pub struct SearchDefinition {
    /// Endpoint path, e.g. `/api/v2/videos/search`
    pub endpoint: String,
    /// HTTP method (scroll endpoints are GET or POST depending on API)
    pub method: Method,
    /// Response key holding the hits array, e.g. `videos`
    pub hits_key: String,
    /// Response key holding the total count, e.g. `totalVideos`
    pub total_key: String,
}

/// A running scroll search, usable as a [`PageSource`]
pub struct SearchRequest<T> {
    http: Arc<HttpTransport>,
    session: Arc<Session>,
    definition: SearchDefinition,
    category: Option<RateLimitCategory>,
    query: Map<String, Value>,
    scroll_id: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SearchRequest<T> {
    pub(crate) fn new(
        http: Arc<HttpTransport>,
        session: Arc<Session>,
        definition: SearchDefinition,
        category: Option<RateLimitCategory>,
        query: Map<String, Value>,
    ) -> Self {
        Self {
            http,
            session,
            definition,
            category,
            query,
            scroll_id: None,
            _marker: PhantomData,
        }
    }

    /// Render the query map as URL parameters for GET endpoints
    fn query_params(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Detect a failure reported inside a successful response body
    fn soft_error(body: &Value) -> Option<ScrollError> {
        let status = body.get("statusCode").and_then(Value::as_u64)?;
        if status < 400 {
            return None;
        }
        let code = body.get("statusDescription").and_then(Value::as_str)?;
        Some(ScrollError {
            status: u16::try_from(status).unwrap_or(500),
            code: code.to_string(),
            detail: body.get("detail").and_then(Value::as_str).map(String::from),
        })
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send> PageSource for SearchRequest<T> {
    type Item = T;

    async fn request_page(&mut self) -> ClientResult<RawPage<T>> {
        if let Some(category) = self.category {
            self.session.queue_request(category).await?;
        }
        let token = self.session.token().await;

        // Follow-up requests echo the cursor back
        if let Some(scroll_id) = &self.scroll_id {
            self.query.insert("scrollId".to_string(), Value::String(scroll_id.clone()));
        }

        let body = if self.definition.method == Method::GET {
            self.http
                .send_json(
                    Method::GET,
                    &self.definition.endpoint,
                    &self.query_params(),
                    None,
                    token.as_deref(),
                )
                .await?
        } else {
            let payload = Value::Object(self.query.clone());
            self.http
                .send_json(
                    self.definition.method.clone(),
                    &self.definition.endpoint,
                    &[],
                    Some(&payload),
                    token.as_deref(),
                )
                .await?
        };

        if let Some(error) = Self::soft_error(&body) {
            debug!(status = error.status, code = %error.code, "search reported in-body error");
            return Ok(RawPage {
                items: Vec::new(),
                total: None,
                done: true,
                error: Some(ClientError::Scroll(error)),
            });
        }

        let total = body.get(&self.definition.total_key).and_then(Value::as_u64);
        let hits = match body.get(&self.definition.hits_key) {
            Some(Value::Array(hits)) => hits.clone(),
            _ => Vec::new(),
        };

        let items: Vec<T> = hits
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| ClientError::Parse(format!("invalid search hit: {e}")))?;

        let next_scroll = body.get("scrollId").and_then(Value::as_str).map(String::from);
        let done = items.is_empty() || next_scroll.is_none();
        self.scroll_id = next_scroll;

        Ok(RawPage { items, total, done, error: None })
    }
}
