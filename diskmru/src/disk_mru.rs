//! The disk cache controller.
//!
//! [`DiskMru`] bounds the total footprint of resident items. Items are touched
//! through [`DiskMru::loading`]. When the budget is exceeded the controller
//! either saves the oldest non-busy items right away, or moves the oldest
//! items into a write-buffer that is flushed in id order once it holds
//! `write_buffer_size` worth of data.
//!
//! Every mutating operation runs under one lock, including the `save()` calls
//! it makes. An item is only reported as evicted once its `save()` returned
//! successfully or it sits in the write-buffer.

use crate::builder::DiskMruBuilder;
use crate::error::{Error, Result};
use crate::list::RecencyList;
use crate::listener::{EvictionListener, EvictionReason};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::saveable::{ItemId, Saveable};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// An item waiting in the write-buffer, with the footprint charged for it.
struct Pending<S: ?Sized> {
  item: Arc<S>,
  footprint: u64,
}

/// Everything guarded by the controller lock.
struct State<S: ?Sized> {
  // Resident items; node cost is the footprint charged to `memory_used`.
  resident: RecencyList<Arc<S>>,
  // Ordered by id so flushes follow on-disk adjacency.
  write_buffer: BTreeMap<ItemId, Pending<S>>,
  memory_to_write: u64,
  memory_available: u64,
  write_buffer_size: u64,
}

impl<S: ?Sized> State<S> {
  #[inline]
  fn memory_used(&self) -> u64 {
    self.resident.current_total_cost()
  }

  #[inline]
  fn over_budget(&self) -> bool {
    self.memory_used() > self.memory_available
  }

  /// Takes `id` out of the write-buffer, uncharging it.
  fn reclaim(&mut self, id: ItemId) -> Option<Pending<S>> {
    let pending = self.write_buffer.remove(&id)?;
    self.memory_to_write = self.memory_to_write.saturating_sub(pending.footprint);
    Some(pending)
  }

  /// Moves a resident entry into the write-buffer, transferring its charge.
  fn stage(&mut self, id: ItemId, item: Arc<S>, footprint: u64) {
    self.memory_to_write += footprint;
    self.write_buffer.insert(id, Pending { item, footprint });
  }
}

/// Eviction events gathered under the lock and delivered after it.
struct Outbox<S: ?Sized> {
  enabled: bool,
  events: Vec<(Arc<S>, EvictionReason)>,
}

impl<S: ?Sized> Outbox<S> {
  fn new(enabled: bool) -> Self {
    Self {
      enabled,
      events: Vec::new(),
    }
  }

  #[inline]
  fn push(&mut self, item: &Arc<S>, reason: EvictionReason) {
    if self.enabled {
      self.events.push((Arc::clone(item), reason));
    }
  }
}

/// A memory-bounded MRU cache over disk-backed [`Saveable`] items.
///
/// The cache holds shared handles to items but never owns their lifecycle:
/// the owning collection creates and destroys them, and calls
/// [`remove`](Self::remove) before destroying one that may still be tracked.
pub struct DiskMru<S: Saveable + ?Sized> {
  state: Mutex<State<S>>,
  use_write_buffer: bool,
  listener: Option<Arc<dyn EvictionListener<S>>>,
  metrics: Metrics,
}

impl<S: Saveable + ?Sized> fmt::Debug for DiskMru<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("DiskMru")
      .field("memory_available", &state.memory_available)
      .field("write_buffer_size", &state.write_buffer_size)
      .field("use_write_buffer", &self.use_write_buffer)
      .field("memory_used", &state.memory_used())
      .field("memory_to_write", &state.memory_to_write)
      .field("resident", &state.resident.len())
      .field("pending", &state.write_buffer.len())
      .field("has_listener", &self.listener.is_some())
      .finish()
  }
}

impl<S: Saveable + ?Sized> Drop for DiskMru<S> {
  fn drop(&mut self) {
    let state = self.state.get_mut();
    if !state.write_buffer.is_empty() {
      warn!(
        pending = state.write_buffer.len(),
        memory_to_write = state.memory_to_write,
        "cache dropped with unflushed items in the write-buffer"
      );
    }
  }
}

impl<S: Saveable + ?Sized> DiskMru<S> {
  /// Returns a builder for configuring a new cache.
  pub fn builder() -> DiskMruBuilder<S> {
    DiskMruBuilder::new()
  }

  pub(crate) fn from_parts(
    memory_available: u64,
    write_buffer_size: u64,
    use_write_buffer: bool,
    listener: Option<Arc<dyn EvictionListener<S>>>,
  ) -> Self {
    Self {
      state: Mutex::new(State {
        resident: RecencyList::new(),
        write_buffer: BTreeMap::new(),
        memory_to_write: 0,
        memory_available,
        write_buffer_size,
      }),
      use_write_buffer,
      listener,
      metrics: Metrics::new(),
    }
  }

  /// Notifies the cache that `item` is being used.
  ///
  /// `None` is accepted and ignored. See [`touch`](Self::touch).
  pub fn loading(&self, item: Option<&Arc<S>>) -> Result<()> {
    match item {
      Some(item) => self.touch(item),
      None => Ok(()),
    }
  }

  /// Marks `item` as the most recently used and enforces the memory budget.
  ///
  /// Without a write-buffer, the oldest non-busy items are saved and dropped
  /// until the budget holds again; the item just touched is never evicted.
  /// If everything older is busy the cache stays over budget.
  ///
  /// With a write-buffer, the oldest items are staged for writing regardless
  /// of their busy flag, and the buffer is flushed once it reaches
  /// `write_buffer_size`.
  ///
  /// A failed `save()` leaves the item tracked and returns the error.
  pub fn touch(&self, item: &Arc<S>) -> Result<()> {
    Metrics::incr(&self.metrics.loads);
    let mut outbox = Outbox::new(self.listener.is_some());

    let result = {
      let mut state = self.state.lock();
      if state.reclaim(item.id()).is_some() {
        Metrics::incr(&self.metrics.reclaimed_from_buffer);
        trace!(id = item.id(), "reclaimed item from the write-buffer");
      }
      self.admit(&mut state, item);

      if self.use_write_buffer {
        self.evict_to_buffer(&mut state, &mut outbox)
      } else {
        self.evict_to_disk(&mut state, &mut outbox)
      }
    };

    self.dispatch(outbox);
    result
  }

  /// Saves every non-busy item in the write-buffer and drops it from the
  /// buffer. Busy items stay buffered for the next flush.
  ///
  /// If a save fails the pass stops: the failing item and every item not yet
  /// visited stay buffered, and the error is returned.
  pub fn write_old_objects(&self) -> Result<()> {
    let mut outbox = Outbox::new(self.listener.is_some());
    let result = {
      let mut state = self.state.lock();
      self.flush_write_buffer(&mut state, &mut outbox)
    };
    self.dispatch(outbox);
    result
  }

  /// Moves every resident item into the write-buffer, ignoring the budget,
  /// then flushes it. Used at shutdown to get all data onto disk.
  pub fn flush_cache(&self) -> Result<()> {
    let mut outbox = Outbox::new(self.listener.is_some());
    let result = {
      let mut state = self.state.lock();
      while let Some((id, item, footprint)) = state.resident.pop_back() {
        Metrics::incr(&self.metrics.buffered);
        outbox.push(&item, EvictionReason::Buffered);
        state.stage(id, item, footprint);
      }
      debug!(
        pending = state.write_buffer.len(),
        memory_to_write = state.memory_to_write,
        "draining cache"
      );
      self.flush_write_buffer(&mut state, &mut outbox)
    };
    self.dispatch(outbox);
    result
  }

  /// Stops tracking the item with `id` without saving it.
  ///
  /// The owner calls this before destroying an item, so the busy flag is
  /// not consulted: a pinned item is dropped from tracking like any other.
  /// Returns whether the item was resident or buffered.
  pub fn remove(&self, id: ItemId) -> bool {
    let (resident, pending) = {
      let mut state = self.state.lock();
      let resident = state.resident.remove(id);
      let pending = state.reclaim(id);
      (resident, pending)
    };

    let removed = resident.is_some() || pending.is_some();
    if removed {
      Metrics::incr(&self.metrics.removals);
      trace!(id, "stopped tracking item");
    }
    removed
  }

  /// Changes the resident budget. It is enforced on the next touch.
  pub fn set_memory_available(&self, memory_available: u64) {
    self.state.lock().memory_available = memory_available;
  }

  /// Changes the flush threshold. It is checked on the next touch.
  pub fn set_write_buffer_size(&self, write_buffer_size: u64) {
    self.state.lock().write_buffer_size = write_buffer_size;
  }

  pub fn memory_available(&self) -> u64 {
    self.state.lock().memory_available
  }

  pub fn write_buffer_size(&self) -> u64 {
    self.state.lock().write_buffer_size
  }

  pub fn uses_write_buffer(&self) -> bool {
    self.use_write_buffer
  }

  /// Footprint currently charged to resident items.
  pub fn memory_used(&self) -> u64 {
    self.state.lock().memory_used()
  }

  /// Footprint currently waiting in the write-buffer.
  pub fn memory_to_write(&self) -> u64 {
    self.state.lock().memory_to_write
  }

  pub fn resident_len(&self) -> usize {
    self.state.lock().resident.len()
  }

  pub fn write_buffer_len(&self) -> usize {
    self.state.lock().write_buffer.len()
  }

  /// Resident ids, most recently used first.
  pub fn resident_ids(&self) -> Vec<ItemId> {
    self.state.lock().resident.ids()
  }

  /// Buffered ids, in the order a flush would write them.
  pub fn pending_ids(&self) -> Vec<ItemId> {
    self.state.lock().write_buffer.keys().copied().collect()
  }

  pub fn is_resident(&self, id: ItemId) -> bool {
    self.state.lock().resident.contains(id)
  }

  pub fn is_pending(&self, id: ItemId) -> bool {
    self.state.lock().write_buffer.contains_key(&id)
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    let (memory_used, memory_to_write) = {
      let state = self.state.lock();
      (state.memory_used(), state.memory_to_write)
    };
    self.metrics.snapshot(memory_used, memory_to_write)
  }

  // Pushes `item` to the front, charging a new item or re-charging a known
  // one at its current footprint.
  fn admit(&self, state: &mut State<S>, item: &Arc<S>) {
    let id = item.id();
    let footprint = item.mru_memory();
    if state.resident.push_front(id, Arc::clone(item), footprint) {
      Metrics::incr(&self.metrics.inserts);
      trace!(id, footprint, "item became resident");
    } else {
      Metrics::incr(&self.metrics.relocations);
    }
  }

  // Single pass from the tail towards the head, saving non-busy items.
  fn evict_to_disk(&self, state: &mut State<S>, outbox: &mut Outbox<S>) -> Result<()> {
    if !state.over_budget() {
      return Ok(());
    }

    let head = state.resident.head_id();
    let mut cursor = state.resident.tail_id();
    while state.over_budget() {
      let id = match cursor {
        Some(id) if Some(id) != head => id,
        _ => break,
      };
      cursor = state.resident.prev_id(id);

      let candidate = match state.resident.get(id) {
        Some(item) => Arc::clone(item),
        None => break,
      };
      if candidate.is_busy() {
        Metrics::incr(&self.metrics.busy_skips);
        trace!(id, "skipping busy item");
        continue;
      }

      self.save_item(id, &candidate)?;
      state.resident.remove(id);
      trace!(id, memory_used = state.memory_used(), "evicted item to disk");
      outbox.push(&candidate, EvictionReason::Saved);
    }

    if state.over_budget() {
      warn!(
        memory_used = state.memory_used(),
        memory_available = state.memory_available,
        "eviction ended over budget; remaining older items are busy"
      );
    }
    Ok(())
  }

  // Stages tail items until the budget holds, then flushes if the buffer
  // reached its threshold.
  fn evict_to_buffer(&self, state: &mut State<S>, outbox: &mut Outbox<S>) -> Result<()> {
    while state.over_budget() {
      match state.resident.pop_back() {
        Some((id, item, footprint)) => {
          Metrics::incr(&self.metrics.buffered);
          trace!(id, footprint, "moved item to the write-buffer");
          outbox.push(&item, EvictionReason::Buffered);
          state.stage(id, item, footprint);
        }
        None => break,
      }
    }

    if !state.write_buffer.is_empty() && state.memory_to_write >= state.write_buffer_size {
      self.flush_write_buffer(state, outbox)?;
    }
    Ok(())
  }

  fn flush_write_buffer(&self, state: &mut State<S>, outbox: &mut Outbox<S>) -> Result<()> {
    Metrics::incr(&self.metrics.flushes);

    let mut remaining = std::mem::take(&mut state.write_buffer).into_iter();
    let mut retained = BTreeMap::new();
    let mut saved = 0usize;
    let mut failure = None;

    for (id, pending) in remaining.by_ref() {
      if pending.item.is_busy() {
        Metrics::incr(&self.metrics.busy_skips);
        retained.insert(id, pending);
        continue;
      }
      match self.save_item(id, &pending.item) {
        Ok(()) => {
          saved += 1;
          outbox.push(&pending.item, EvictionReason::Flushed);
        }
        Err(err) => {
          retained.insert(id, pending);
          failure = Some(err);
          break;
        }
      }
    }
    retained.extend(remaining);

    // Whatever is still buffered is charged at its live footprint.
    let mut memory_to_write = 0;
    for pending in retained.values_mut() {
      pending.footprint = pending.item.mru_memory();
      memory_to_write += pending.footprint;
    }
    state.write_buffer = retained;
    state.memory_to_write = memory_to_write;

    debug!(
      saved,
      retained = state.write_buffer.len(),
      memory_to_write,
      "flushed write-buffer"
    );

    match failure {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  fn save_item(&self, id: ItemId, item: &S) -> Result<()> {
    match item.save() {
      Ok(()) => {
        Metrics::incr(&self.metrics.saves);
        Ok(())
      }
      Err(source) => {
        Metrics::incr(&self.metrics.save_failures);
        warn!(id, error = %source, "failed to save item");
        Err(Error::Save { id, source })
      }
    }
  }

  fn dispatch(&self, outbox: Outbox<S>) {
    if let Some(listener) = &self.listener {
      for (item, reason) in outbox.events {
        listener.on_evict(&item, reason);
      }
    }
  }
}
