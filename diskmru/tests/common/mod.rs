#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use diskmru::{DiskMru, EvictionListener, EvictionReason, Identified, ItemId, Saveable, SaveableState};

/// Installs a test-friendly tracing subscriber. Honors `RUST_LOG`.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// A fake backing store shared by test items. Records the order of saves and
/// can be taken offline to make every save fail.
#[derive(Debug, Default)]
pub struct FakeDisk {
  order: Mutex<Vec<ItemId>>,
  offline: AtomicBool,
}

impl FakeDisk {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn save_order(&self) -> Vec<ItemId> {
    self.order.lock().unwrap().clone()
  }
}

/// A saveable item with a settable footprint and a save counter.
#[derive(Debug)]
pub struct TestItem {
  id: ItemId,
  footprint: AtomicU64,
  state: SaveableState,
  saves: AtomicUsize,
  fail_saves: AtomicBool,
  disk: Arc<FakeDisk>,
}

impl TestItem {
  pub fn new(id: ItemId, footprint: u64) -> Arc<Self> {
    Self::on(&FakeDisk::new(), id, footprint)
  }

  pub fn on(disk: &Arc<FakeDisk>, id: ItemId, footprint: u64) -> Arc<Self> {
    let item = Self {
      id,
      footprint: AtomicU64::new(footprint),
      state: SaveableState::new(),
      saves: AtomicUsize::new(0),
      fail_saves: AtomicBool::new(false),
      disk: disk.clone(),
    };
    item.set_data_changed(true);
    Arc::new(item)
  }

  pub fn saves(&self) -> usize {
    self.saves.load(Ordering::SeqCst)
  }

  pub fn set_footprint(&self, footprint: u64) {
    self.footprint.store(footprint, Ordering::SeqCst);
  }

  pub fn fail_saves(&self, fail: bool) {
    self.fail_saves.store(fail, Ordering::SeqCst);
  }
}

impl Identified for TestItem {
  fn id(&self) -> ItemId {
    self.id
  }
}

impl Saveable for TestItem {
  fn mru_memory(&self) -> u64 {
    self.footprint.load(Ordering::SeqCst)
  }

  fn state(&self) -> &SaveableState {
    &self.state
  }

  fn save(&self) -> io::Result<()> {
    if self.disk.offline.load(Ordering::SeqCst) || self.fail_saves.load(Ordering::SeqCst) {
      return Err(io::Error::new(io::ErrorKind::Other, "disk unavailable"));
    }
    self.saves.fetch_add(1, Ordering::SeqCst);
    self.disk.order.lock().unwrap().push(self.id);
    self.set_file_position(self.id * 1_000, self.mru_memory());
    self.set_data_changed(false);
    Ok(())
  }

  fn load(&self) -> io::Result<()> {
    Ok(())
  }

  fn clear_data_from_memory(&self) {}
}

/// Builds `n` items with ids `0..n`, all of the same footprint, on one disk.
pub fn items(disk: &Arc<FakeDisk>, n: u64, footprint: u64) -> Vec<Arc<TestItem>> {
  (0..n).map(|id| TestItem::on(disk, id, footprint)).collect()
}

/// Records every eviction event it hears about.
#[derive(Debug, Default, Clone)]
pub struct RecordingListener {
  pub events: Arc<Mutex<Vec<(ItemId, EvictionReason)>>>,
}

impl RecordingListener {
  pub fn events(&self) -> Vec<(ItemId, EvictionReason)> {
    self.events.lock().unwrap().clone()
  }
}

impl<S: Saveable + ?Sized> EvictionListener<S> for RecordingListener {
  fn on_evict(&self, item: &Arc<S>, reason: EvictionReason) {
    self.events.lock().unwrap().push((item.id(), reason));
  }
}

/// Sum of the live footprints of every item the cache currently tracks.
pub fn tracked_footprint(cache: &DiskMru<TestItem>, all: &[Arc<TestItem>]) -> u64 {
  all
    .iter()
    .filter(|item| cache.is_resident(item.id()) || cache.is_pending(item.id()))
    .map(|item| item.mru_memory())
    .sum()
}

pub fn unbuffered(memory_available: u64) -> DiskMru<TestItem> {
  DiskMru::builder()
    .memory_available(memory_available)
    .build()
    .unwrap()
}

pub fn buffered(memory_available: u64, write_buffer_size: u64) -> DiskMru<TestItem> {
  DiskMru::builder()
    .memory_available(memory_available)
    .write_buffer_size(write_buffer_size)
    .use_write_buffer(true)
    .build()
    .unwrap()
}
