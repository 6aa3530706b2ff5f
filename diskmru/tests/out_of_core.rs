mod common;
use common::*;

use std::sync::Arc;

use diskmru::storage::{BlockFile, DiskBlock};
use diskmru::{DiskMru, EvictionListener, EvictionReason, Identified, Saveable};

/// Drops the in-memory copy of anything that reached disk.
struct ClearOnPersist;

impl<S: Saveable + ?Sized> EvictionListener<S> for ClearOnPersist {
  fn on_evict(&self, item: &Arc<S>, reason: EvictionReason) {
    if reason.is_persisted() {
      item.clear_data_from_memory();
    }
  }
}

fn blocks(file: &Arc<BlockFile>, n: u64) -> Vec<Arc<DiskBlock>> {
  (0..n).map(|id| Arc::new(DiskBlock::new(id, file.clone()))).collect()
}

fn run_rounds(cache: &DiskMru<DiskBlock>, all: &[Arc<DiskBlock>], rounds: usize) {
  for _ in 0..rounds {
    for block in all {
      block.append(&[block.id() as u8; 8]).unwrap();
      cache.touch(block).unwrap();
    }
  }
}

#[test]
fn test_blocks_survive_eviction_round_trips() {
  init_tracing();
  let dir = tempfile::tempdir().unwrap();
  let file = Arc::new(BlockFile::create(dir.path().join("events.bin")).unwrap());
  let all = blocks(&file, 16);
  let cache = DiskMru::<DiskBlock>::builder()
    .memory_available(64)
    .eviction_listener(ClearOnPersist)
    .build()
    .unwrap();

  run_rounds(&cache, &all, 3);
  assert!(cache.memory_used() <= 64);
  assert!(
    all.iter().filter(|block| block.is_loaded()).count() < all.len(),
    "evicted blocks must have released their data"
  );

  cache.flush_cache().unwrap();
  file.flush().unwrap();
  assert!(all.iter().all(|block| !block.is_loaded()));
  assert!(file.len() >= 16 * 24);

  for block in &all {
    block.load().unwrap();
    let expected = vec![block.id() as u8; 24];
    assert_eq!(block.read(|bytes| bytes.to_vec()), Some(expected));
  }
}

#[test]
fn test_buffered_blocks_survive_eviction_round_trips() {
  let dir = tempfile::tempdir().unwrap();
  let file = Arc::new(BlockFile::create(dir.path().join("events.bin")).unwrap());
  let all = blocks(&file, 16);
  let cache = DiskMru::<DiskBlock>::builder()
    .memory_available(64)
    .write_buffer_size(48)
    .use_write_buffer(true)
    .eviction_listener(ClearOnPersist)
    .build()
    .unwrap();

  run_rounds(&cache, &all, 3);
  assert!(cache.metrics().flushes > 0);

  cache.flush_cache().unwrap();
  assert_eq!(cache.write_buffer_len(), 0);

  for block in &all {
    block.load().unwrap();
    let expected = vec![block.id() as u8; 24];
    assert_eq!(block.read(|bytes| bytes.to_vec()), Some(expected));
  }
}

#[test]
fn test_blocks_reopen_from_recorded_placement() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("events.bin");
  let placements = {
    let file = Arc::new(BlockFile::create(&path).unwrap());
    let all = blocks(&file, 4);
    let cache = DiskMru::<DiskBlock>::builder()
      .memory_available(16)
      .build()
      .unwrap();
    run_rounds(&cache, &all, 1);
    cache.flush_cache().unwrap();
    file.flush().unwrap();
    all
      .iter()
      .map(|block| block.state().placement().unwrap())
      .collect::<Vec<_>>()
  };

  let file = Arc::new(BlockFile::open(&path).unwrap());
  for (id, placement) in placements.into_iter().enumerate() {
    let block = DiskBlock::on_disk(id as u64, file.clone(), placement);
    block.load().unwrap();
    assert_eq!(block.read(|bytes| bytes.to_vec()), Some(vec![id as u8; 8]));
  }
}

#[test]
fn test_mixed_item_types_share_one_budget() {
  let dir = tempfile::tempdir().unwrap();
  let file = Arc::new(BlockFile::create(dir.path().join("mixed.bin")).unwrap());
  let listener = RecordingListener::default();
  let cache = DiskMru::<dyn Saveable>::builder()
    .memory_available(50)
    .eviction_listener(listener.clone())
    .build()
    .unwrap();

  let block = Arc::new(DiskBlock::new(7, file.clone()));
  block.append(&[1; 30]).unwrap();
  let block: Arc<dyn Saveable> = block;
  let item: Arc<dyn Saveable> = TestItem::new(8, 30);

  cache.touch(&block).unwrap();
  cache.touch(&item).unwrap();

  assert_eq!(listener.events(), vec![(7, EvictionReason::Saved)]);
  assert_eq!(cache.resident_ids(), vec![8]);
  assert!(block.was_saved());
  assert_eq!(file.len(), 30);
}
