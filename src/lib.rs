//! rbit-fdlimit - File handle and socket budgeting for a BitTorrent session
//!
//! A session juggles many torrents, each with many files and peers, while the
//! operating system only allows a limited number of open descriptors. This
//! crate keeps that number bounded: file handles live in a small LRU cache
//! and peer sockets are counted against a configurable limit.
//!
//! # Modules
//!
//! - [`storage`] - Cached file handles, preallocation, torrent file layout
//! - [`net`] - Peer socket admission types and errors
//! - [`limits`] - Process open-file limit negotiation
//!
//! # Overview
//!
//! ```no_run
//! use rbit_fdlimit::{PreallocationMode, ResourceConfig, Session};
//! use std::io::Write;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new(ResourceConfig::default());
//!
//! {
//!     let mut resources = session.resources();
//!     let file = resources.checkout(
//!         1,
//!         0,
//!         Path::new("./downloads/file.dat"),
//!         true,
//!         PreallocationMode::Sparse,
//!         1 << 20,
//!     )?;
//!     file.write_all(b"piece data")?;
//! }
//!
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod limits;
pub mod manager;
pub mod net;
pub mod session;
pub mod storage;

pub use config::ResourceConfig;
pub use manager::ResourceManager;
pub use net::{Domain, OwnedSocket, PeerSocket, SocketError, SocketKind};
pub use session::Session;
pub use storage::{
    FileEntry, FileError, FileIndex, FileKey, Fileset, PreallocationMode, StorageError, TorrentId,
    TorrentLayout,
};
