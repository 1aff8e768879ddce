//! Typed API surfaces
//!
//! Each surface wraps the shared transport and session, picks the right
//! rate-limit category per operation, and exposes paged results through the
//! generic engine in [`crate::pagination`].

mod audit;
mod videos;

pub use audit::{AuditApi, AuditEntry, AuditQuery, AuditSource};
pub use videos::{VideoHit, VideoSearchQuery, VideosApi};
