//! Cached file handles and on-disk preallocation.
//!
//! A session has far more logical files than the process can keep open. The
//! [`Fileset`] holds a small fixed number of open handles keyed by
//! [`FileKey`] (torrent id plus file index) and closes the least recently
//! used one when it needs room.
//!
//! # Components
//!
//! - [`Fileset`] - Fixed-capacity handle cache with LRU eviction
//! - [`CachedFile`] - One slot of the cache
//! - [`PreallocationMode`] / [`AllocStep`] - How new files get their disk space
//! - [`TorrentLayout`] - Maps torrent byte ranges onto its files
//!
//! # Examples
//!
//! ```no_run
//! use rbit_fdlimit::storage::{FileKey, Fileset, PreallocationMode};
//! use std::io::Write;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut files = Fileset::new(32);
//! let key = FileKey::new(1, 0);
//!
//! let file = files.checkout(
//!     key,
//!     Path::new("./downloads/file.dat"),
//!     true,
//!     PreallocationMode::Sparse,
//!     16384,
//! )?;
//! file.write_all(b"hello")?;
//!
//! // Cheap while still cached; None once evicted.
//! assert!(files.peek(key, false).is_some());
//! # Ok(())
//! # }
//! ```
//!
//! Returned handles are borrowed from the cache. Any later checkout may evict
//! them, so callers check out again instead of holding on to a handle.
//!
//! # Security
//!
//! [`TorrentLayout`] rejects file paths containing `..`, a root, or a prefix.

mod cached_file;
mod error;
mod fileset;
mod layout;
mod preallocate;

pub use cached_file::{CachedFile, FileIndex, FileKey, TorrentId};
pub use error::{FileError, StorageError};
pub use fileset::Fileset;
pub use layout::{FileEntry, FileSpan, TorrentLayout};
pub use preallocate::{preallocate_full, preallocate_sparse, AllocStep, PreallocationMode};
