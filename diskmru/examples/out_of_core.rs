use diskmru::storage::{BlockFile, DiskBlock};
use diskmru::{DiskMru, EvictionListener, EvictionReason, Identified, Saveable};
use std::sync::Arc;

// Drops the in-memory payload of every block that made it to disk.
struct ReleaseMemory;

impl EvictionListener<DiskBlock> for ReleaseMemory {
  fn on_evict(&self, block: &Arc<DiskBlock>, reason: EvictionReason) {
    println!("[Listener] Block {} {}.", block.id(), reason);
    if reason.is_persisted() {
      block.clear_data_from_memory();
    }
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let dir = std::env::temp_dir().join("diskmru-demo");
  std::fs::create_dir_all(&dir)?;
  let file = Arc::new(BlockFile::create(dir.join("events.bin"))?);

  // Room for roughly four 32-byte blocks; the rest live on disk.
  let cache = DiskMru::<DiskBlock>::builder()
    .memory_available(128)
    .write_buffer_size(64)
    .use_write_buffer(true)
    .eviction_listener(ReleaseMemory)
    .build()?;

  let blocks: Vec<Arc<DiskBlock>> = (0..10)
    .map(|id| Arc::new(DiskBlock::new(id, file.clone())))
    .collect();

  println!("--- Appending events to 10 blocks, two passes ---");
  for pass in 0..2u8 {
    for block in &blocks {
      block.append(&[pass; 16])?;
      cache.touch(block)?;
    }
    println!(
      "After pass {}: {} bytes resident, {} bytes waiting to be written.",
      pass,
      cache.memory_used(),
      cache.memory_to_write()
    );
  }

  println!("\n--- Flushing everything to disk ---");
  cache.flush_cache()?;
  file.flush()?;
  println!("File holds {} bytes.", file.len());

  let block = &blocks[3];
  block.load()?;
  let len = block.read(|bytes| bytes.len()).unwrap_or_default();
  println!("Block 3 reloaded with {} bytes.", len);

  println!("\nFinal metrics: {:#?}", cache.metrics());
  Ok(())
}
