//! A minimal block store implementing the [`Saveable`](crate::Saveable)
//! contract on top of a single file.
//!
//! Each [`DiskBlock`] is one variable-size run of bytes in a shared
//! [`BlockFile`]. A block is rewritten in place while it fits its previous
//! extent, and appended at the end of the file once it outgrows it.

mod block;
mod file;

pub use block::DiskBlock;
pub use file::BlockFile;
