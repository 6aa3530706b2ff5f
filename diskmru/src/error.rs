use crate::saveable::ItemId;

use std::io;

use thiserror::Error;

/// Errors that can occur when building a `DiskMru`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The cache was configured with a memory budget of zero. Leave the budget
  /// unset for an unbounded cache.
  #[error("memory budget cannot be zero")]
  ZeroMemory,
}

/// The main error type for cache operations.
#[derive(Debug, Error)]
pub enum Error {
  /// An item's `save()` failed while the cache was evicting or flushing it.
  /// The item is still tracked by the cache, so nothing was lost.
  #[error("failed to save item {id}: {source}")]
  Save {
    id: ItemId,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Build(#[from] BuildError),
}

impl Error {
  /// Returns the id of the item whose save failed, if any.
  pub fn item_id(&self) -> Option<ItemId> {
    match self {
      Error::Save { id, .. } => Some(*id),
      Error::Build(_) => None,
    }
  }
}

/// A specialized `Result` type for `diskmru` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
