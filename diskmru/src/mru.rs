use crate::list::RecencyList;
use crate::saveable::ItemId;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Anything with a stable identity the MRU structures can key on.
pub trait Identified {
  fn id(&self) -> ItemId;
}

impl<T: Identified + ?Sized> Identified for Arc<T> {
  #[inline]
  fn id(&self) -> ItemId {
    (**self).id()
  }
}

impl<T: Identified + ?Sized> Identified for Box<T> {
  #[inline]
  fn id(&self) -> ItemId {
    (**self).id()
  }
}

impl<T: Identified + ?Sized> Identified for &T {
  #[inline]
  fn id(&self) -> ItemId {
    (**self).id()
  }
}

/// A thread-safe most-recently-used list that owns its items and holds at
/// most `max_items` of them.
///
/// Inserting past the bound hands the least-recently-used item back to the
/// caller, who decides what to do with it (write it out, drop it, ...).
/// Items removed with [`delete_index`](Self::delete_index) or
/// [`clear`](Self::clear) are dropped by the list.
pub struct MruList<T> {
  inner: Mutex<RecencyList<T>>,
  max_items: usize,
}

impl<T> fmt::Debug for MruList<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MruList")
      .field("max_items", &self.max_items)
      .field("size", &self.inner.lock().len())
      .finish()
  }
}

impl<T: Identified> MruList<T> {
  pub fn new(max_items: usize) -> Self {
    Self {
      inner: Mutex::new(RecencyList::new()),
      max_items,
    }
  }

  /// Moves `item` to the front of the list.
  ///
  /// If an item with the same id is already present it is relocated instead
  /// and `item` is dropped. Returns the evicted tail when the list grew past
  /// `max_items`. The caller must not hand the evicted item back to this
  /// list while still disposing of it.
  pub fn insert(&self, item: T) -> Option<T> {
    let mut list = self.inner.lock();
    let id = item.id();
    if !list.push_front(id, item, 1) {
      return None;
    }

    if list.len() > self.max_items {
      list.pop_back().map(|(_, evicted, _)| evicted)
    } else {
      None
    }
  }

  /// Returns a clone of the item with `id`, without changing its recency.
  pub fn find(&self, id: ItemId) -> Option<T>
  where
    T: Clone,
  {
    self.inner.lock().get(id).cloned()
  }

  /// Applies `f` to the item with `id` while the list lock is held.
  pub fn with<F, R>(&self, id: ItemId, f: F) -> Option<R>
  where
    F: FnOnce(&T) -> R,
  {
    self.inner.lock().get(id).map(f)
  }

  /// Removes and drops the item with `id`. Returns whether it was present.
  pub fn delete_index(&self, id: ItemId) -> bool {
    let removed = self.inner.lock().remove(id);
    // Dropped outside the lock.
    removed.is_some()
  }

  /// Drops every item in the list.
  pub fn clear(&self) {
    let drained = std::mem::take(&mut *self.inner.lock());
    drop(drained);
  }

  pub fn size(&self) -> usize {
    self.inner.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().is_empty()
  }

  pub fn max_items(&self) -> usize {
    self.max_items
  }

  /// Ids from most to least recently used.
  pub fn ids(&self) -> Vec<ItemId> {
    self.inner.lock().ids()
  }
}
