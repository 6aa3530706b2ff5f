use crate::disk_mru::DiskMru;
use crate::error::BuildError;
use crate::listener::EvictionListener;
use crate::saveable::Saveable;

use core::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

/// The plain-data part of a cache configuration.
///
/// With the `serde` feature this can be read from any serde format; fields
/// that are left out take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
  feature = "serde",
  derive(serde::Serialize, serde::Deserialize),
  serde(default)
)]
pub struct DiskMruConfig {
  /// Maximum total footprint of resident items.
  pub memory_available: u64,
  /// Footprint of buffered items at which a flush is triggered.
  pub write_buffer_size: u64,
  /// Stage evicted items in a write-buffer instead of saving them at once.
  pub use_write_buffer: bool,
}

impl Default for DiskMruConfig {
  fn default() -> Self {
    Self {
      memory_available: u64::MAX,
      write_buffer_size: 0,
      use_write_buffer: false,
    }
  }
}

/// A builder for creating `DiskMru` instances.
pub struct DiskMruBuilder<S: ?Sized> {
  config: DiskMruConfig,
  listener: Option<Arc<dyn EvictionListener<S>>>,
  _item_marker: PhantomData<fn(&S)>,
}

impl<S: ?Sized> fmt::Debug for DiskMruBuilder<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DiskMruBuilder")
      .field("config", &self.config)
      .field("has_listener", &self.listener.is_some())
      .finish()
  }
}

impl<S: Saveable + ?Sized> Default for DiskMruBuilder<S> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: Saveable + ?Sized> DiskMruBuilder<S> {
  /// Creates a builder for an unbounded cache without a write-buffer.
  pub fn new() -> Self {
    Self::from_config(DiskMruConfig::default())
  }

  /// Creates a builder seeded from a configuration.
  pub fn from_config(config: DiskMruConfig) -> Self {
    Self {
      config,
      listener: None,
      _item_marker: PhantomData,
    }
  }

  /// Sets the maximum total footprint of resident items.
  pub fn memory_available(mut self, memory_available: u64) -> Self {
    self.config.memory_available = memory_available;
    self
  }

  /// Removes the memory bound.
  pub fn unbounded(mut self) -> Self {
    self.config.memory_available = u64::MAX;
    self
  }

  /// Sets the buffered footprint at which a write-buffer flush runs.
  pub fn write_buffer_size(mut self, write_buffer_size: u64) -> Self {
    self.config.write_buffer_size = write_buffer_size;
    self
  }

  /// Selects between deferred (buffered) and immediate write-back.
  pub fn use_write_buffer(mut self, use_write_buffer: bool) -> Self {
    self.config.use_write_buffer = use_write_buffer;
    self
  }

  /// Sets the eviction listener for the cache.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener<S> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// The configuration this builder will build with.
  pub fn config(&self) -> DiskMruConfig {
    self.config
  }

  pub fn build(self) -> Result<DiskMru<S>, BuildError> {
    self.validate()?;
    debug!(
      memory_available = self.config.memory_available,
      write_buffer_size = self.config.write_buffer_size,
      use_write_buffer = self.config.use_write_buffer,
      "building disk cache"
    );
    Ok(DiskMru::from_parts(
      self.config.memory_available,
      self.config.write_buffer_size,
      self.config.use_write_buffer,
      self.listener,
    ))
  }

  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.config.memory_available == 0 {
      return Err(BuildError::ZeroMemory);
    }
    Ok(())
  }
}
