//! Async client library for the Vidora video platform REST API.
//!
//! The crate covers three concerns a host application would otherwise have
//! to hand-roll:
//!
//! - **Session lifecycle**: eight authentication schemes behind one
//!   [`Credentials`] bag, automatic token extension via a background
//!   keep-alive loop, and host-side session persistence through
//!   [`SessionSnapshot`].
//! - **Client-side rate limiting**: per-category fixed-bucket gates matching
//!   the platform's per-minute quotas, so well-behaved batch jobs never trip
//!   server-side throttling.
//! - **Paged retrieval**: one engine over the platform's scroll-cursor
//!   search and continuation-token feeds, consumable page-by-page, as a
//!   drained vector, or as a per-item async stream with cancellation.
//!
//! # Example
//!
//! ```no_run
//! use vidora_client::{Client, ClientConfig, Credentials, PageOptions};
//! use vidora_client::api::VideoSearchQuery;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let url = url::Url::parse("https://company.vidora.example")?;
//! let config = ClientConfig::builder(url)
//!     .credentials(Credentials::new().api_key("my-key", "my-secret"))
//!     .rate_limits(Default::default())
//!     .build();
//!
//! let client = Client::new(config)?;
//! client.connect().await?;
//!
//! let query = VideoSearchQuery { q: Some("town hall".into()), ..Default::default() };
//! let hits = client.videos().search(&query, PageOptions::new().max_results(100))?
//!     .exec()
//!     .await?;
//! println!("found {} videos", hits.len());
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod pagination;
pub mod ratelimit;
pub mod transport;

// Re-export the types most hosts touch
pub use auth::Session;
pub use client::Client;
pub use config::{
    ClientConfig, ClientConfigBuilder, Credentials, KeepAliveOptions, RateLimitCategory,
    RateLimits, SessionSnapshot,
};
pub use error::{ClientError, ClientResult, ScrollError};
pub use pagination::{OnError, Page, PagedRequest, PageOptions, PageSource, RawPage};
