//! Audit log operations
//!
//! The audit endpoint pages with a continuation token rather than a scroll
//! cursor: each response carries `nextContinuationToken` until the feed is
//! exhausted. [`AuditSource`] adapts that protocol to the generic pagination
//! engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;

use crate::auth::Session;
use crate::config::RateLimitCategory;
use crate::error::{ClientError, ClientResult};
use crate::pagination::{PagedRequest, PageOptions, PageSource, RawPage};
use crate::transport::HttpTransport;

/// One audit log entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub principal: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
}

/// Time window for an audit query
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditPage {
    #[serde(default)]
    entries: Vec<AuditEntry>,
    #[serde(default)]
    total_entries: Option<u64>,
    #[serde(default)]
    next_continuation_token: Option<String>,
}

/// Continuation-token source over the audit feed
pub struct AuditSource {
    http: Arc<HttpTransport>,
    session: Arc<Session>,
    query: AuditQuery,
    continuation: Option<String>,
}

#[async_trait]
impl PageSource for AuditSource {
    type Item = AuditEntry;

    async fn request_page(&mut self) -> ClientResult<RawPage<AuditEntry>> {
        self.session.queue_request(RateLimitCategory::Audit).await?;
        let token = self.session.token().await;

        let mut params = Vec::new();
        if let Some(from) = self.query.from {
            params.push(("fromDate".to_string(), from.to_rfc3339()));
        }
        if let Some(to) = self.query.to {
            params.push(("toDate".to_string(), to.to_rfc3339()));
        }
        if let Some(continuation) = &self.continuation {
            params.push(("nextContinuationToken".to_string(), continuation.clone()));
        }

        let body = self
            .http
            .send_json(Method::GET, "/api/v2/audit/entries", &params, None, token.as_deref())
            .await?;
        let page: AuditPage = serde_json::from_value(body)
            .map_err(|e| ClientError::Parse(format!("invalid audit page: {e}")))?;

        let done = page.next_continuation_token.is_none() || page.entries.is_empty();
        self.continuation = page.next_continuation_token;

        Ok(RawPage { items: page.entries, total: page.total_entries, done, error: None })
    }
}

/// Audit API surface
#[derive(Debug)]
pub struct AuditApi {
    http: Arc<HttpTransport>,
    session: Arc<Session>,
}

impl AuditApi {
    pub(crate) fn new(http: Arc<HttpTransport>, session: Arc<Session>) -> Self {
        Self { http, session }
    }

    /// Page through audit entries in a time window
    #[must_use]
    pub fn entries(
        &self,
        query: AuditQuery,
        options: PageOptions<AuditEntry>,
    ) -> PagedRequest<AuditSource> {
        let source = AuditSource {
            http: Arc::clone(&self.http),
            session: Arc::clone(&self.session),
            query,
            continuation: None,
        };
        PagedRequest::new(source, options)
    }
}
