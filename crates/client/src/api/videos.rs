//! Video operations
//!
//! Search runs through the scroll-cursor protocol (the search endpoint
//! windows results behind a short-lived server-side cursor); detail lookups
//! and metadata updates are plain request/response calls. Each operation is
//! throttled under its own rate-limit category.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::Session;
use crate::config::RateLimitCategory;
use crate::error::{ClientError, ClientResult};
use crate::pagination::search::{SearchDefinition, SearchRequest};
use crate::pagination::{PagedRequest, PageOptions};
use crate::transport::HttpTransport;

/// One hit from a video search
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoHit {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub when_uploaded: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Filter parameters for a video search
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSearchQuery {
    /// Free-text query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// Restrict to videos uploaded by this user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaders: Option<String>,

    /// Lower bound on upload time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_upload_date: Option<DateTime<Utc>>,

    /// Upper bound on upload time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_upload_date: Option<DateTime<Utc>>,

    /// Server-side page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Video API surface
#[derive(Debug)]
pub struct VideosApi {
    http: Arc<HttpTransport>,
    session: Arc<Session>,
}

impl VideosApi {
    pub(crate) fn new(http: Arc<HttpTransport>, session: Arc<Session>) -> Self {
        Self { http, session }
    }

    /// Search videos through the scroll cursor
    ///
    /// Returns a paged request; consume it with `next_page`, `exec`, or
    /// `into_stream`.
    ///
    /// # Errors
    /// Returns [`ClientError::Parse`] if the query cannot be rendered.
    pub fn search(
        &self,
        query: &VideoSearchQuery,
        options: PageOptions<VideoHit>,
    ) -> ClientResult<PagedRequest<SearchRequest<VideoHit>>> {
        let rendered = serde_json::to_value(query)
            .map_err(|e| ClientError::Parse(format!("invalid search query: {e}")))?;
        let Value::Object(params) = rendered else {
            return Err(ClientError::Parse("search query did not render as an object".into()));
        };

        let definition = SearchDefinition {
            endpoint: "/api/v2/videos/search".to_string(),
            method: Method::GET,
            hits_key: "videos".to_string(),
            total_key: "totalVideos".to_string(),
        };
        let source = SearchRequest::new(
            Arc::clone(&self.http),
            Arc::clone(&self.session),
            definition,
            Some(RateLimitCategory::SearchVideos),
            params,
        );
        Ok(PagedRequest::new(source, options))
    }

    /// Fetch the full detail record for one video
    ///
    /// # Errors
    /// Rate-limit cancellation, transport, and API errors (404 for an
    /// unknown id).
    pub async fn details(&self, video_id: &str) -> ClientResult<Value> {
        self.session.queue_request(RateLimitCategory::GetVideoDetails).await?;
        let token = self.session.token().await;
        let path = format!("/api/v2/videos/{video_id}/details");
        self.http.send_json(Method::GET, &path, &[], None, token.as_deref()).await
    }

    /// Update metadata fields on one video
    ///
    /// `fields` carries only the properties to change.
    ///
    /// # Errors
    /// Rate-limit cancellation, transport, and API errors.
    pub async fn update_metadata(
        &self,
        video_id: &str,
        fields: &Map<String, Value>,
    ) -> ClientResult<()> {
        self.session.queue_request(RateLimitCategory::UpdateVideoMetadata).await?;
        let token = self.session.token().await;
        let path = format!("/api/v2/videos/{video_id}");
        let body = Value::Object(fields.clone());
        self.http.send_json(Method::PATCH, &path, &[], Some(&body), token.as_deref()).await?;
        Ok(())
    }
}
