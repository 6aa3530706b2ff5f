use super::file::BlockFile;
use crate::mru::Identified;
use crate::saveable::{ItemId, Placement, Saveable, SaveableState};

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

/// A byte payload stored as one block of a [`BlockFile`].
///
/// The payload is `None` while the block is not resident. Its footprint is
/// the resident payload length in bytes.
pub struct DiskBlock {
  id: ItemId,
  state: SaveableState,
  data: RwLock<Option<Vec<u8>>>,
  file: Arc<BlockFile>,
}

impl fmt::Debug for DiskBlock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DiskBlock")
      .field("id", &self.id)
      .field("state", &self.state)
      .field("resident_bytes", &self.mru_memory())
      .finish_non_exhaustive()
  }
}

impl DiskBlock {
  /// A new, empty, resident block that has never been written.
  pub fn new(id: ItemId, file: Arc<BlockFile>) -> Self {
    Self {
      id,
      state: SaveableState::new(),
      data: RwLock::new(Some(Vec::new())),
      file,
    }
  }

  /// A block that already exists at `placement` and is not resident.
  pub fn on_disk(id: ItemId, file: Arc<BlockFile>, placement: Placement) -> Self {
    Self {
      id,
      state: SaveableState::on_disk(placement),
      data: RwLock::new(None),
      file,
    }
  }

  pub fn is_loaded(&self) -> bool {
    self.data.read().is_some()
  }

  /// Appends `bytes`, loading the block first if needed. Marks it dirty.
  pub fn append(&self, bytes: &[u8]) -> io::Result<()> {
    // Retries if the payload is cleared between the load and the write lock.
    loop {
      self.load()?;
      let mut data = self.data.write();
      if let Some(payload) = data.as_mut() {
        payload.extend_from_slice(bytes);
        self.state.set_data_changed(true);
        return Ok(());
      }
    }
  }

  /// Applies `f` to the resident payload. `None` if it is not resident.
  pub fn read<F, R>(&self, f: F) -> Option<R>
  where
    F: FnOnce(&[u8]) -> R,
  {
    self.data.read().as_deref().map(f)
  }
}

impl Identified for DiskBlock {
  fn id(&self) -> ItemId {
    self.id
  }
}

impl Saveable for DiskBlock {
  fn mru_memory(&self) -> u64 {
    self.data.read().as_ref().map_or(0, |payload| payload.len() as u64)
  }

  fn state(&self) -> &SaveableState {
    &self.state
  }

  fn save(&self) -> io::Result<()> {
    // The read lock keeps writers out until the dirty flag is cleared.
    let data = self.data.read();
    if !self.state.is_data_changed() && self.state.was_saved() {
      return Ok(());
    }

    if let Some(payload) = data.as_ref() {
      let placement = self.file.write_block(self.state.placement(), payload)?;
      self.state.set_placement(placement);
      self.state.set_data_changed(false);
    }
    Ok(())
  }

  fn load(&self) -> io::Result<()> {
    let mut data = self.data.write();
    if data.is_some() {
      return Ok(());
    }

    let placement = self.state.placement().ok_or_else(|| {
      io::Error::new(
        io::ErrorKind::NotFound,
        format!("block {} was never saved", self.id),
      )
    })?;
    *data = Some(self.file.read_block(placement)?);
    Ok(())
  }

  fn clear_data_from_memory(&self) {
    let mut data = self.data.write();
    // Dropping unsaved changes would lose data.
    if self.state.is_data_changed() {
      return;
    }
    *data = None;
  }
}
