use std::fmt;
use std::sync::Arc;

/// Describes why an item left the cache's resident set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The item was saved by the eviction walk and is no longer tracked.
  Saved,
  /// The item was moved into the write-buffer. It has not been saved yet.
  Buffered,
  /// The item was saved by a write-buffer flush and is no longer tracked.
  Flushed,
}

impl EvictionReason {
  /// Whether the item's data is on disk and may be cleared from memory.
  pub fn is_persisted(&self) -> bool {
    matches!(self, EvictionReason::Saved | EvictionReason::Flushed)
  }
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Saved => write!(f, "saved by eviction"),
      EvictionReason::Buffered => write!(f, "moved to the write-buffer"),
      EvictionReason::Flushed => write!(f, "saved by write-buffer flush"),
    }
  }
}

/// A listener that can be registered with the cache to hear about items
/// leaving memory.
///
/// The owning collection typically uses this to call
/// `clear_data_from_memory()` on persisted items. Events are delivered in the
/// order they happened, after the cache lock has been released, so the
/// listener may call back into the cache. By then another thread may already
/// have touched the item again.
pub trait EvictionListener<S: ?Sized>: Send + Sync {
  fn on_evict(&self, item: &Arc<S>, reason: EvictionReason);
}
