use super::error::FileError;
use super::preallocate::{preallocate_full, preallocate_sparse, PreallocationMode};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Instant;

/// Torrent identifier assigned by the session.
pub type TorrentId = u32;

/// Index of a file within its torrent.
pub type FileIndex = u32;

/// Composite identity of a logical file: which torrent, which file in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub torrent: TorrentId,
    pub file: FileIndex,
}

impl FileKey {
    pub fn new(torrent: TorrentId, file: FileIndex) -> Self {
        Self { torrent, file }
    }
}

/// One slot of the file cache.
///
/// The key is only meaningful while `file` is `Some`.
#[derive(Debug, Default)]
pub struct CachedFile {
    pub(crate) file: Option<File>,
    pub(crate) is_writable: bool,
    pub(crate) key: Option<FileKey>,
    pub(crate) last_used: Option<Instant>,
}

impl CachedFile {
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.is_writable
    }

    pub fn last_used(&self) -> Option<Instant> {
        self.last_used
    }

    pub(crate) fn matches(&self, key: FileKey) -> bool {
        self.is_open() && self.key == Some(key)
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Some(Instant::now());
    }

    /// Drops the descriptor, returning the slot to the free pool.
    pub(crate) fn close(&mut self) {
        debug_assert!(self.is_open(), "closing a slot that isn't open");
        self.file = None;
        self.key = None;
        self.is_writable = false;
    }

    /// Hands out this slot's file for `key`, opening `path` first if the slot
    /// is free.
    ///
    /// An existing file longer than `size` is truncated, which forces the
    /// handle writable even if a read-only one was requested.
    pub(crate) fn checkout(
        &mut self,
        key: FileKey,
        path: &Path,
        writable: bool,
        mode: PreallocationMode,
        size: u64,
    ) -> Result<&mut File, FileError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let (file, writable) = open_file(path, writable, mode, size)?;
                tracing::debug!(
                    "opened \"{}\" writable {}",
                    path.display(),
                    if writable { 'y' } else { 'n' }
                );
                self.is_writable = writable;
                file
            }
        };

        tracing::trace!("checking out \"{}\"", path.display());
        self.key = Some(key);
        self.touch();
        Ok(self.file.insert(file))
    }
}

fn open_file(
    path: &Path,
    mut writable: bool,
    mode: PreallocationMode,
    size: u64,
) -> Result<(File, bool), FileError> {
    if writable {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| {
                tracing::error!("Couldn't create \"{}\": {}", dir.display(), source);
                FileError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                }
            })?;
        }
    }

    let existing_len = std::fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len());
    let already_existed = existing_len.is_some();

    if writable && !already_existed && mode == PreallocationMode::Full && preallocate_full(path, size)
    {
        tracing::debug!("Preallocated file \"{}\"", path.display());
    }

    // can't shrink without write access
    let resize_needed = existing_len.is_some_and(|len| len > size);
    writable |= resize_needed;

    let mut options = OpenOptions::new();
    options.read(true);
    if writable {
        options.write(true).create(true);
    }

    let mut file = options.open(path).map_err(|source| {
        tracing::error!("Couldn't open \"{}\": {}", path.display(), source);
        FileError::Open {
            path: path.to_path_buf(),
            source,
        }
    })?;
    advise_sequential(&file);

    // The torrent was updated and this file shrank; drop the stale tail.
    if resize_needed {
        file.set_len(size).map_err(|source| {
            tracing::error!("Couldn't truncate \"{}\": {}", path.display(), source);
            FileError::Truncate {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }

    if writable && !already_existed && mode == PreallocationMode::Sparse {
        if preallocate_sparse(&mut file, size) {
            tracing::debug!("Preallocated sparse file \"{}\"", path.display());
        } else {
            tracing::warn!("Couldn't preallocate \"{}\"", path.display());
        }
    }

    Ok((file, writable))
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn advise_sequential(file: &File) {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let code = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL) };
    if code != 0 {
        tracing::trace!("posix_fadvise failed: {}", std::io::Error::from_raw_os_error(code));
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn advise_sequential(_file: &File) {}
