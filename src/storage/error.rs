use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a file checkout.
///
/// Each variant carries the OS error that caused it; preallocation problems
/// never show up here because they do not make a file unusable.
#[derive(Debug, Error)]
pub enum FileError {
    /// A parent directory of a writable file could not be created.
    #[error("couldn't create \"{}\": {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// The file could not be opened.
    #[error("couldn't open \"{}\": {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    /// An existing file was larger than expected and could not be shrunk.
    #[error("couldn't truncate \"{}\": {source}", path.display())]
    Truncate { path: PathBuf, source: io::Error },
}

impl FileError {
    /// The path the failed operation was acting on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::CreateDir { path, .. } | Self::Open { path, .. } | Self::Truncate { path, .. } => {
                path
            }
        }
    }

    /// The underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::CreateDir { source, .. }
            | Self::Open { source, .. }
            | Self::Truncate { source, .. } => source,
        }
    }

    /// The OS error code, when the failure came from a system call.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().raw_os_error()
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Checkout(#[from] FileError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("range {offset}+{length} is outside the torrent ({total} bytes)")]
    InvalidRange { offset: u64, length: u64, total: u64 },

    #[error("file {index} starts at {found}, expected {expected}")]
    NonContiguousFile {
        index: u32,
        expected: u64,
        found: u64,
    },

    #[error("file at {offset} with length {length} overflows the torrent size")]
    LayoutOverflow { offset: u64, length: u64 },

    #[error("no file with index {0}")]
    UnknownFile(u32),

    #[error("path traversal detected in file path: {0}")]
    PathTraversal(String),
}
