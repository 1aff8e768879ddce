//! Generic page-by-page retrieval engine
//!
//! A [`PagedRequest`] drives any [`PageSource`] (scroll-cursor search,
//! continuation-token feeds, ...) through a uniform consumption surface:
//! single-step [`next_page`](PagedRequest::next_page), drain-everything
//! [`exec`](PagedRequest::exec), or per-item [`into_stream`](PagedRequest::into_stream).
//!
//! The engine enforces the consumption contract regardless of source:
//! - `max_results` caps both the reported total and the items delivered; a
//!   truncating page finishes the request.
//! - The reported total never decreases once observed.
//! - A finished request returns empty pages forever without touching the
//!   source again.
//! - Cancellation finishes the request; the streaming surface additionally
//!   yields one cancellation error before terminating.

pub mod search;

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// One raw page as produced by a source
#[derive(Debug)]
pub struct RawPage<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Total result count reported by the server, when known
    pub total: Option<u64>,
    /// Whether the source has no further pages
    pub done: bool,
    /// A soft error reported inside an otherwise-successful response
    /// (e.g. an expired scroll cursor)
    pub error: Option<ClientError>,
}

/// A paged data source
///
/// Implementations hold their own cursor state; `request_page` is called at
/// most once per engine step and never again after a page with `done` set
/// (or after an error).
#[async_trait]
pub trait PageSource: Send {
    type Item: Send;

    /// Fetch the next raw page
    ///
    /// # Errors
    /// Hard failures (transport, non-success HTTP status) are returned as
    /// `Err`; in-body soft errors belong in [`RawPage::error`] instead.
    async fn request_page(&mut self) -> ClientResult<RawPage<Self::Item>>;
}

/// What to do when a page fetch fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnError {
    /// Propagate the error to the caller (default)
    #[default]
    Fail,
    /// Log it, keep whatever was already retrieved, and finish quietly
    Ignore,
}

/// Per-request consumption options
pub struct PageOptions<T> {
    /// Upper bound on items delivered across all pages
    pub max_results: Option<u64>,
    /// Invoked after each fetched page with (page items, items so far, total)
    pub on_progress: Option<Box<dyn FnMut(&[T], u64, Option<u64>) + Send>>,
    /// Error policy
    pub on_error: OnError,
    /// Cancelling this token finishes the request
    pub cancel: CancellationToken,
}

impl<T> Default for PageOptions<T> {
    fn default() -> Self {
        Self {
            max_results: None,
            on_progress: None,
            on_error: OnError::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl<T> PageOptions<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of items delivered
    #[must_use]
    pub fn max_results(mut self, max: u64) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Register a progress callback
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&[T], u64, Option<u64>) + Send + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Set the error policy
    #[must_use]
    pub fn on_error(mut self, policy: OnError) -> Self {
        self.on_error = policy;
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

impl<T> std::fmt::Debug for PageOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageOptions")
            .field("max_results", &self.max_results)
            .field("has_on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error)
            .finish_non_exhaustive()
    }
}

/// One processed page delivered to the caller
#[derive(Debug)]
pub struct Page<T> {
    /// Items on this page (already capped by `max_results`)
    pub items: Vec<T>,
    /// Items delivered so far, including this page
    pub current: u64,
    /// Server-reported total, capped by `max_results`, when known
    pub total: Option<u64>,
    /// Whether the request is finished
    pub done: bool,
}

/// Driver for a [`PageSource`]
pub struct PagedRequest<S: PageSource> {
    source: S,
    options: PageOptions<S::Item>,
    current: u64,
    total: Option<u64>,
    done: bool,
}

impl<S: PageSource> PagedRequest<S> {
    pub fn new(source: S, options: PageOptions<S::Item>) -> Self {
        Self { source, options, current: 0, total: None, done: false }
    }

    /// Items delivered so far
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Server-reported total, capped by `max_results`, when known
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Whether the request is finished
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch and process the next page
    ///
    /// A finished or cancelled request returns an empty, done page without
    /// touching the source.
    ///
    /// # Errors
    /// With [`OnError::Fail`] (the default), a source failure or in-body
    /// soft error is returned after the request is marked done. With
    /// [`OnError::Ignore`] the error is logged and an empty done page is
    /// returned instead.
    pub async fn next_page(&mut self) -> ClientResult<Page<S::Item>> {
        if self.done {
            return Ok(self.empty_page());
        }
        if self.options.cancel.is_cancelled() {
            debug!("pagination cancelled");
            self.done = true;
            return Ok(self.empty_page());
        }

        let raw = match self.source.request_page().await {
            Ok(raw) => raw,
            Err(e) => return self.fail(e),
        };

        self.absorb_total(raw.total);

        let mut items = raw.items;
        let mut done = raw.done;
        if let Some(max) = self.options.max_results {
            let remaining = max.saturating_sub(self.current);
            if items.len() as u64 >= remaining {
                items.truncate(remaining as usize);
                done = true;
            }
        }

        self.current += items.len() as u64;
        if let Some(total) = self.total {
            if self.current >= total {
                done = true;
            }
        }
        self.done = done;

        if let Some(callback) = self.options.on_progress.as_mut() {
            callback(&items, self.current, self.total);
        }

        if let Some(error) = raw.error {
            self.done = true;
            return match self.options.on_error {
                OnError::Fail => Err(error),
                OnError::Ignore => {
                    warn!(error = %error, "page fetch reported an error; stopping early");
                    Ok(Page { items, current: self.current, total: self.total, done: true })
                }
            };
        }

        Ok(Page { items, current: self.current, total: self.total, done: self.done })
    }

    /// Drain every remaining page into one vector
    ///
    /// # Errors
    /// Propagates the first [`next_page`](Self::next_page) failure; items
    /// retrieved before the failure are dropped.
    pub async fn exec(mut self) -> ClientResult<Vec<S::Item>> {
        let mut all = Vec::new();
        while !self.done {
            let page = self.next_page().await?;
            all.extend(page.items);
        }
        Ok(all)
    }

    /// Consume the request as a per-item stream
    ///
    /// Pages are fetched lazily as the stream is polled. A failure is
    /// yielded as one `Err` item, after which the stream terminates.
    /// Cancellation between items yields a single cancellation error.
    pub fn into_stream(self) -> impl Stream<Item = ClientResult<S::Item>> {
        struct State<S: PageSource> {
            request: PagedRequest<S>,
            buffer: VecDeque<S::Item>,
            finished: bool,
        }

        let state = State { request: self, buffer: VecDeque::new(), finished: false };
        futures::stream::unfold(state, |mut st| async move {
            loop {
                if st.finished {
                    return None;
                }
                if st.request.options.cancel.is_cancelled() {
                    st.finished = true;
                    return Some((Err(ClientError::cancelled("pagination cancelled")), st));
                }
                if let Some(item) = st.buffer.pop_front() {
                    return Some((Ok(item), st));
                }
                if st.request.done {
                    return None;
                }
                match st.request.next_page().await {
                    Ok(page) => st.buffer.extend(page.items),
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }
        })
    }

    fn empty_page(&self) -> Page<S::Item> {
        Page { items: Vec::new(), current: self.current, total: self.total, done: true }
    }

    /// Record a server-reported total: capped by `max_results`, and never
    /// allowed to shrink once observed
    fn absorb_total(&mut self, reported: Option<u64>) {
        let Some(mut reported) = reported else {
            return;
        };
        if let Some(max) = self.options.max_results {
            reported = reported.min(max);
        }
        self.total = Some(match self.total {
            Some(existing) => existing.max(reported),
            None => reported,
        });
    }

    fn fail(&mut self, error: ClientError) -> ClientResult<Page<S::Item>> {
        self.done = true;
        match self.options.on_error {
            OnError::Fail => Err(error),
            OnError::Ignore => {
                warn!(error = %error, "page fetch failed; stopping early");
                Ok(self.empty_page())
            }
        }
    }
}
