use crate::saveable::Placement;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug)]
struct Inner {
  file: File,
  // First byte past the last written block.
  end: u64,
}

/// A file of variable-size blocks addressed by [`Placement`].
#[derive(Debug)]
pub struct BlockFile {
  inner: Mutex<Inner>,
  path: PathBuf,
}

impl BlockFile {
  /// Creates (or truncates) the file at `path`.
  pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(path.as_ref())?;
    Ok(Self {
      inner: Mutex::new(Inner { file, end: 0 }),
      path: path.as_ref().to_path_buf(),
    })
  }

  /// Opens an existing file. New blocks are appended after its current end.
  pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
    let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
    let end = file.metadata()?.len();
    Ok(Self {
      inner: Mutex::new(Inner { file, end }),
      path: path.as_ref().to_path_buf(),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The first offset past the last written block.
  pub fn len(&self) -> u64 {
    self.inner.lock().end
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Writes `bytes` as one block and returns where it landed.
  ///
  /// The block goes back to `previous` when it still fits there, otherwise it
  /// is appended at the end of the file.
  pub fn write_block(&self, previous: Option<Placement>, bytes: &[u8]) -> io::Result<Placement> {
    let len = bytes.len() as u64;
    let mut inner = self.inner.lock();

    // TODO: track extents abandoned by growing blocks so they can be reused.
    let position = match previous {
      Some(extent) if len <= extent.size => extent.position,
      _ => inner.end,
    };

    inner.file.seek(SeekFrom::Start(position))?;
    inner.file.write_all(bytes)?;
    inner.end = inner.end.max(position + len);

    trace!(position, len, "wrote block");
    Ok(Placement::new(position, len))
  }

  /// Reads back the block at `placement`.
  pub fn read_block(&self, placement: Placement) -> io::Result<Vec<u8>> {
    let mut inner = self.inner.lock();
    if placement.end() > inner.end {
      return Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
          "block at {}..{} runs past the end of the file ({})",
          placement.position,
          placement.end(),
          inner.end
        ),
      ));
    }

    let mut buf = vec![0u8; placement.size as usize];
    inner.file.seek(SeekFrom::Start(placement.position))?;
    inner.file.read_exact(&mut buf)?;
    Ok(buf)
  }

  /// Flushes written blocks through to the storage device.
  pub fn flush(&self) -> io::Result<()> {
    let mut inner = self.inner.lock();
    inner.file.flush()?;
    inner.file.sync_data()
  }
}
