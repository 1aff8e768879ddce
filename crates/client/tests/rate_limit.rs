//! Integration tests for the fixed-bucket rate-limit gates
//!
//! Timing is driven by tokio's paused clock, so the bucket math is asserted
//! deterministically: batches admit up to the per-bucket budget immediately
//! and overflow rolls into subsequent buckets at fixed boundaries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use vidora_client::ratelimit::{RateLimitQueue, RateLimitQueues};
use vidora_client::{ClientError, RateLimitCategory, RateLimits};

// ============================================================================
// Bucket pacing
// ============================================================================

/// Tests a burst of concurrent callers through a 4-per-bucket gate.
///
/// Assertions:
/// - Ten tasks complete in three waves: four at t=0, four at t=5s, two at
///   t=10s.
#[tokio::test(start_paused = true)]
async fn test_concurrent_burst_is_paced_in_waves() {
    let queue = Arc::new(RateLimitQueue::new(4, Duration::from_secs(5)).expect("queue"));
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let q = queue.clone();
        tasks.push(tokio::spawn(async move {
            q.acquire().await.expect("acquire");
            Instant::now() - start
        }));
    }

    let mut offsets: Vec<Duration> = Vec::new();
    for task in tasks {
        offsets.push(task.await.expect("join"));
    }
    offsets.sort();

    assert!(offsets[..4].iter().all(|o| *o == Duration::ZERO));
    assert!(offsets[4..8].iter().all(|o| *o == Duration::from_secs(5)));
    assert!(offsets[8..].iter().all(|o| *o == Duration::from_secs(10)));
}

/// Tests that bucket boundaries are fixed, not sliding: capacity freed at a
/// boundary admits a fresh burst immediately.
#[tokio::test(start_paused = true)]
async fn test_fixed_boundaries_allow_boundary_burst() {
    let queue = RateLimitQueue::new(2, Duration::from_secs(5)).expect("queue");
    let start = Instant::now();

    queue.acquire().await.expect("acquire");
    queue.acquire().await.expect("acquire");
    // Third call waits for the next bucket
    queue.acquire().await.expect("acquire");
    assert_eq!(Instant::now() - start, Duration::from_secs(5));
    // The new bucket still has one slot: admitted without further waiting
    queue.acquire().await.expect("acquire");
    assert_eq!(Instant::now() - start, Duration::from_secs(5));
}

// ============================================================================
// Category independence
// ============================================================================

/// Tests that saturating one category never delays another.
#[tokio::test(start_paused = true)]
async fn test_categories_are_independent() {
    let limits = RateLimits { attendees_realtime: 2, get_video_details: 2000, ..RateLimits::default() };
    let queues = Arc::new(RateLimitQueues::new(&limits));

    // Saturate the realtime category (1 per bucket after smoothing)
    queues.acquire(RateLimitCategory::AttendeesRealtime).await.expect("acquire");
    let saturated = {
        let q = queues.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            q.acquire(RateLimitCategory::AttendeesRealtime).await.expect("acquire");
            Instant::now() - start
        })
    };

    // A different category admits immediately meanwhile
    let start = Instant::now();
    for _ in 0..20 {
        queues.acquire(RateLimitCategory::GetVideoDetails).await.expect("acquire");
    }
    assert_eq!(Instant::now() - start, Duration::ZERO);

    assert_eq!(saturated.await.expect("join"), Duration::from_secs(5));
}

/// Tests that categories without a configured quota are never throttled.
#[tokio::test(start_paused = true)]
async fn test_unconfigured_category_is_unthrottled() {
    let queues = RateLimitQueues::new(&RateLimits::default());
    let start = Instant::now();
    for _ in 0..100 {
        queues.acquire(RateLimitCategory::Get).await.expect("acquire");
    }
    assert_eq!(Instant::now() - start, Duration::ZERO);
}

// ============================================================================
// Abort semantics
// ============================================================================

/// Tests that aborting releases every waiter across tasks with a
/// cancellation error, and the gate is immediately reusable.
#[tokio::test(start_paused = true)]
async fn test_abort_releases_all_waiters() {
    let queue = Arc::new(RateLimitQueue::new(1, Duration::from_secs(60)).expect("queue"));
    queue.acquire().await.expect("acquire");

    let mut waiters = Vec::new();
    for _ in 0..5 {
        let q = queue.clone();
        waiters.push(tokio::spawn(async move { q.acquire().await }));
    }
    tokio::task::yield_now().await;
    assert_eq!(queue.pending(), 5);

    queue.abort("client disconnecting");

    for waiter in waiters {
        let result = waiter.await.expect("join");
        assert!(matches!(result, Err(ClientError::Cancelled { .. })));
    }

    // Fresh bucket after the abort
    let start = Instant::now();
    queue.acquire().await.expect("acquire");
    assert_eq!(Instant::now() - start, Duration::ZERO);
}

/// Tests that aborting the whole map flushes waiters in every category.
#[tokio::test(start_paused = true)]
async fn test_abort_all_categories() {
    let limits = RateLimits { attendees_realtime: 2, audit: 12, ..RateLimits::default() };
    let queues = Arc::new(RateLimitQueues::new(&limits));

    queues.acquire(RateLimitCategory::AttendeesRealtime).await.expect("acquire");
    queues.acquire(RateLimitCategory::Audit).await.expect("acquire");

    let mut waiters = Vec::new();
    for category in [RateLimitCategory::AttendeesRealtime, RateLimitCategory::Audit] {
        let q = queues.clone();
        waiters.push(tokio::spawn(async move { q.acquire(category).await }));
    }
    tokio::task::yield_now().await;

    queues.abort_all("shutting down");

    for waiter in waiters {
        let result = waiter.await.expect("join");
        assert!(matches!(result, Err(ClientError::Cancelled { .. })));
    }
}
