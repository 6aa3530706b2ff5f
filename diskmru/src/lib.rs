//! A memory-bounded, disk-backed most-recently-used cache for out-of-core
//! datasets.
//!
//! # Overview
//! - **Saveable items**: any type implementing [`Saveable`] can be tracked. The
//!   cache only manages residency; the owning collection keeps ownership.
//! - **Bounded memory**: [`DiskMru`] keeps the total footprint of resident items
//!   under a budget by writing the least recently used ones back to disk.
//! - **Write-buffer**: evicted items can be staged and flushed in id order once
//!   enough of them accumulate.
//! - **Busy pins**: a busy item is never saved or dropped by the cache.
//! - **Owning MRU list**: [`MruList`] is a count-bounded MRU container for
//!   callers that want the list to own its items.
//! - **Reference store**: the [`storage`] module provides a file-backed
//!   [`Saveable`] block.

// Public modules that form the API
pub mod builder;
pub mod disk_mru;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod mru;
pub mod saveable;
pub mod storage;

// Internal, crate-only modules
mod list;

// Re-export the primary user-facing types for convenience
pub use builder::{DiskMruBuilder, DiskMruConfig};
pub use disk_mru::DiskMru;
pub use error::{BuildError, Error, Result};
pub use listener::{EvictionListener, EvictionReason};
pub use metrics::MetricsSnapshot;
pub use mru::{Identified, MruList};
pub use saveable::{ItemId, PinGuard, Placement, Saveable, SaveableState};
