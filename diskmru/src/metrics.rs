use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Touches ---
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) relocations: CachePadded<AtomicU64>,
  pub(crate) reclaimed_from_buffer: CachePadded<AtomicU64>,

  // --- Write-back ---
  pub(crate) saves: CachePadded<AtomicU64>,
  pub(crate) save_failures: CachePadded<AtomicU64>,
  pub(crate) buffered: CachePadded<AtomicU64>,
  pub(crate) busy_skips: CachePadded<AtomicU64>,
  pub(crate) flushes: CachePadded<AtomicU64>,

  pub(crate) removals: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      loads: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      relocations: CachePadded::new(AtomicU64::new(0)),
      reclaimed_from_buffer: CachePadded::new(AtomicU64::new(0)),
      saves: CachePadded::new(AtomicU64::new(0)),
      save_failures: CachePadded::new(AtomicU64::new(0)),
      buffered: CachePadded::new(AtomicU64::new(0)),
      busy_skips: CachePadded::new(AtomicU64::new(0)),
      flushes: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot. The memory gauges are owned by the
  /// cache's locked state and passed in by the caller.
  pub(crate) fn snapshot(&self, memory_used: u64, memory_to_write: u64) -> MetricsSnapshot {
    MetricsSnapshot {
      loads: self.loads.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      relocations: self.relocations.load(Ordering::Relaxed),
      reclaimed_from_buffer: self.reclaimed_from_buffer.load(Ordering::Relaxed),
      saves: self.saves.load(Ordering::Relaxed),
      save_failures: self.save_failures.load(Ordering::Relaxed),
      buffered: self.buffered.load(Ordering::Relaxed),
      busy_skips: self.busy_skips.load(Ordering::Relaxed),
      flushes: self.flushes.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      memory_used,
      memory_to_write,
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// The number of `loading` calls that carried an item.
  pub loads: u64,
  /// The number of items that entered the resident list.
  pub inserts: u64,
  /// The number of touches on items that were already resident.
  pub relocations: u64,
  /// The number of items taken back out of the write-buffer by a touch.
  pub reclaimed_from_buffer: u64,
  /// The number of successful `save()` calls made by the cache.
  pub saves: u64,
  /// The number of `save()` calls that returned an error.
  pub save_failures: u64,
  /// The number of items moved into the write-buffer.
  pub buffered: u64,
  /// The number of times a busy item was passed over or kept back.
  pub busy_skips: u64,
  /// The number of write-buffer flush passes.
  pub flushes: u64,
  /// The number of items the owner stopped tracking via `remove`.
  pub removals: u64,
  /// Footprint currently charged to the resident list.
  pub memory_used: u64,
  /// Footprint currently waiting in the write-buffer.
  pub memory_to_write: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("loads", &self.loads)
      .field("inserts", &self.inserts)
      .field("relocations", &self.relocations)
      .field("reclaimed_from_buffer", &self.reclaimed_from_buffer)
      .field("saves", &self.saves)
      .field("save_failures", &self.save_failures)
      .field("buffered", &self.buffered)
      .field("busy_skips", &self.busy_skips)
      .field("flushes", &self.flushes)
      .field("removals", &self.removals)
      .field("memory_used", &self.memory_used)
      .field("memory_to_write", &self.memory_to_write)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
