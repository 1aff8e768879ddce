//! Client-side rate limiting
//!
//! Fixed-bucket token gates: each queue admits at most `limit` calls per
//! `interval`, and once a bucket fills, subsequent callers are scheduled into
//! the next bucket (and the one after, and so on). Bucket boundaries are
//! fixed relative to the first call, not sliding, so a full bucket plus an
//! immediate burst at the next boundary is expected behavior.
//!
//! Per-minute platform quotas are mapped onto five-second buckets by
//! [`RateLimitQueue::per_minute`], which smooths bursts without changing the
//! per-minute total.
//!
//! Every category gets an independent queue ([`RateLimitQueues`]) so that
//! saturating one operation type never delays unrelated ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{RateLimitCategory, RateLimits};
use crate::error::{ClientError, ClientResult};

/// Bucket length used when mapping per-minute quotas
const BUCKET_INTERVAL: Duration = Duration::from_secs(5);

const BUCKETS_PER_MINUTE: u32 = 12;

#[derive(Debug)]
struct BucketState {
    /// Start of the bucket the next admission falls into. Advances past the
    /// current wall-clock time when callers are scheduled into future buckets.
    window_start: Instant,
    /// Admissions consumed in that bucket
    used: u32,
}

/// A single fixed-bucket admission gate
#[derive(Debug)]
pub struct RateLimitQueue {
    limit: u32,
    interval: Duration,
    state: Mutex<BucketState>,
    cancel: Mutex<CancellationToken>,
    pending: AtomicUsize,
}

impl RateLimitQueue {
    /// Create a gate admitting `limit` calls per `interval`
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] when `limit` is zero or `interval` is
    /// zero-length.
    pub fn new(limit: u32, interval: Duration) -> ClientResult<Self> {
        if limit == 0 {
            return Err(ClientError::config("rate limit must admit at least one call"));
        }
        if interval.is_zero() {
            return Err(ClientError::config("rate limit interval must be non-zero"));
        }

        Ok(Self {
            limit,
            interval,
            state: Mutex::new(BucketState { window_start: Instant::now(), used: 0 }),
            cancel: Mutex::new(CancellationToken::new()),
            pending: AtomicUsize::new(0),
        })
    }

    /// Create a gate for a per-minute platform quota, smoothed over
    /// five-second buckets
    ///
    /// Returns `None` for a rate of zero (limiting disabled). The per-bucket
    /// limit rounds up, so low quotas still admit at least one call per
    /// bucket.
    #[must_use]
    pub fn per_minute(rate: u32) -> Option<Self> {
        if rate == 0 {
            return None;
        }
        let per_bucket = rate.div_ceil(BUCKETS_PER_MINUTE);
        // Both arguments are statically non-zero here
        Self::new(per_bucket, BUCKET_INTERVAL).ok()
    }

    /// Number of callers currently waiting for admission
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until this call is admitted
    ///
    /// Reserves a slot immediately (so concurrent callers are ordered at
    /// reservation time), then sleeps until the slot's bucket opens.
    ///
    /// # Errors
    /// Returns [`ClientError::Cancelled`] if [`abort`](Self::abort) fires
    /// while waiting.
    pub async fn acquire(&self) -> ClientResult<()> {
        let (admit_at, cancel) = self.reserve();

        if Instant::now() >= admit_at {
            return Ok(());
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        let result = tokio::select! {
            () = cancel.cancelled() => {
                Err(ClientError::cancelled("rate limit queue aborted"))
            }
            () = tokio::time::sleep_until(admit_at) => Ok(()),
        };
        self.pending.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// Reserve the next admission slot and return when it opens
    fn reserve(&self) -> (Instant, CancellationToken) {
        let now = Instant::now();
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();

        // Wall clock passed the reserved bucket: restart from now
        if now >= state.window_start + self.interval {
            state.window_start = now;
            state.used = 0;
        }
        // Bucket full: roll the reservation into the next one
        if state.used >= self.limit {
            state.window_start += self.interval;
            state.used = 0;
        }
        state.used += 1;
        let admit_at = state.window_start;

        #[allow(clippy::unwrap_used)]
        let cancel = self.cancel.lock().unwrap().clone();
        (admit_at, cancel)
    }

    /// Release every waiter with a cancellation error and reset the gate
    ///
    /// The queue stays usable: calls made after the abort start a fresh
    /// bucket.
    pub fn abort(&self, reason: &str) {
        debug!(reason, "aborting rate limit queue");
        {
            #[allow(clippy::unwrap_used)]
            let mut cancel = self.cancel.lock().unwrap();
            cancel.cancel();
            *cancel = CancellationToken::new();
        }
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        state.window_start = Instant::now();
        state.used = 0;
    }
}

/// Per-category gates built from a [`RateLimits`] table
#[derive(Debug, Default)]
pub struct RateLimitQueues {
    queues: HashMap<RateLimitCategory, RateLimitQueue>,
}

impl RateLimitQueues {
    /// Build one gate per category with a non-zero quota
    #[must_use]
    pub fn new(limits: &RateLimits) -> Self {
        let mut queues = HashMap::new();
        for category in RateLimitCategory::ALL {
            if let Some(queue) = RateLimitQueue::per_minute(limits.rate_for(category)) {
                queues.insert(category, queue);
            }
        }
        Self { queues }
    }

    /// Wait for admission in the given category
    ///
    /// Categories without a configured quota admit immediately.
    ///
    /// # Errors
    /// Returns [`ClientError::Cancelled`] if the category's queue is aborted
    /// while waiting.
    pub async fn acquire(&self, category: RateLimitCategory) -> ClientResult<()> {
        match self.queues.get(&category) {
            Some(queue) => queue.acquire().await,
            None => Ok(()),
        }
    }

    /// Abort every queue, releasing all waiters with a cancellation error
    pub fn abort_all(&self, reason: &str) {
        for queue in self.queues.values() {
            queue.abort(reason);
        }
    }
}
