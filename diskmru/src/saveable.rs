//! The contract for any unit of data the cache can keep resident or push to
//! disk.
//!
//! Items are shared: the owning collection holds them, algorithms read and
//! mutate them, and the cache only tracks their residency. All bookkeeping in
//! [`SaveableState`] is therefore interior-mutable, so any holder of a `&`
//! view can pin an item or record where it was written.

use crate::mru::Identified;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// The identity of an item within its owning collection.
///
/// Ids should follow on-disk adjacency: the write-buffer flushes in id order.
pub type ItemId = u64;

/// Where an item was written in its backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
  /// Offset of the first byte, in store-defined units.
  pub position: u64,
  /// Extent reserved for the item, in the same units.
  pub size: u64,
}

impl Placement {
  pub fn new(position: u64, size: u64) -> Self {
    Self { position, size }
  }

  /// The first offset past this extent.
  #[inline]
  pub fn end(&self) -> u64 {
    self.position + self.size
  }
}

/// Per-item flags and disk placement shared between an item, its owner and
/// the cache.
#[derive(Debug, Default)]
pub struct SaveableState {
  busy: AtomicBool,
  data_changed: AtomicBool,
  // `Some` once the item has been written at least once.
  placement: Mutex<Option<Placement>>,
}

impl SaveableState {
  /// A fresh state for an item that has never been saved.
  pub fn new() -> Self {
    Self::default()
  }

  /// A state for an item that already lives on disk, e.g. one indexed from
  /// an existing file.
  pub fn on_disk(placement: Placement) -> Self {
    Self {
      busy: AtomicBool::new(false),
      data_changed: AtomicBool::new(false),
      placement: Mutex::new(Some(placement)),
    }
  }

  #[inline]
  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Acquire)
  }

  #[inline]
  pub fn set_busy(&self, busy: bool) {
    self.busy.store(busy, Ordering::Release);
  }

  #[inline]
  pub fn is_data_changed(&self) -> bool {
    self.data_changed.load(Ordering::Acquire)
  }

  #[inline]
  pub fn set_data_changed(&self, changed: bool) {
    self.data_changed.store(changed, Ordering::Release);
  }

  #[inline]
  pub fn was_saved(&self) -> bool {
    self.placement.lock().is_some()
  }

  #[inline]
  pub fn placement(&self) -> Option<Placement> {
    *self.placement.lock()
  }

  /// Records where the item was written. This marks it as saved.
  pub fn set_placement(&self, placement: Placement) {
    *self.placement.lock() = Some(placement);
  }
}

/// A cacheable, disk-resident unit of data.
///
/// Implementors supply the payload-specific parts (`mru_memory`, `save`,
/// `load`, `clear_data_from_memory`) and expose a [`SaveableState`]; the flag
/// and placement accessors are provided on top of it.
///
/// The cache never calls `load` or `clear_data_from_memory` itself. It only
/// guarantees that an item it reports as evicted has completed a `save`.
pub trait Saveable: Identified + Send + Sync {
  /// The memory the item currently occupies while resident. Must reflect the
  /// live payload, as the cache re-reads it when the item is touched again.
  fn mru_memory(&self) -> u64;

  /// The item's shared bookkeeping.
  fn state(&self) -> &SaveableState;

  /// Writes the in-memory contents to the item's location on disk.
  ///
  /// Must be a no-op when `is_data_changed()` is false and the item was
  /// saved before. Errors are not swallowed by the cache.
  fn save(&self) -> io::Result<()>;

  /// Repopulates the in-memory contents from disk.
  fn load(&self) -> io::Result<()>;

  /// Releases the in-memory payload. Only safe once the data is on disk.
  fn clear_data_from_memory(&self);

  #[inline]
  fn is_busy(&self) -> bool {
    self.state().is_busy()
  }

  #[inline]
  fn set_busy(&self, busy: bool) {
    self.state().set_busy(busy)
  }

  #[inline]
  fn is_data_changed(&self) -> bool {
    self.state().is_data_changed()
  }

  #[inline]
  fn set_data_changed(&self, changed: bool) {
    self.state().set_data_changed(changed)
  }

  #[inline]
  fn was_saved(&self) -> bool {
    self.state().was_saved()
  }

  /// Offset of the item in its store. Zero if it was never saved.
  fn file_position(&self) -> u64 {
    self.state().placement().map_or(0, |p| p.position)
  }

  /// Extent of the item in its store. Zero if it was never saved.
  fn file_size(&self) -> u64 {
    self.state().placement().map_or(0, |p| p.size)
  }

  /// Records where and how much was written, marking the item as saved.
  fn set_file_position(&self, position: u64, size: u64) {
    self.state().set_placement(Placement::new(position, size))
  }

  /// Pins the item until the returned guard is dropped.
  ///
  /// Pins do not nest: dropping any guard unpins the item.
  fn pin(&self) -> PinGuard<'_> {
    self.state().set_busy(true);
    PinGuard {
      state: self.state(),
    }
  }
}

/// RAII pin returned by [`Saveable::pin`].
#[must_use = "the item is unpinned as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PinGuard<'a> {
  state: &'a SaveableState,
}

impl Drop for PinGuard<'_> {
  fn drop(&mut self) {
    self.state.set_busy(false);
  }
}
