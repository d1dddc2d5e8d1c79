use super::cached_file::{CachedFile, FileKey, TorrentId};
use super::error::FileError;
use super::preallocate::PreallocationMode;
use std::fs::File;
use std::path::Path;
use std::time::SystemTime;

/// A fixed number of file slots shared by every torrent in a session.
///
/// Lookups are linear scans; the set is small and its size never changes
/// after construction. When every slot is open, the least recently used one
/// is closed to make room.
#[derive(Debug)]
pub struct Fileset {
    slots: Box<[CachedFile]>,
}

impl Fileset {
    /// Creates a set with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| CachedFile::default()).collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently holding an open file.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_open()).count()
    }

    pub fn slots(&self) -> &[CachedFile] {
        &self.slots
    }

    /// Finds the open slot holding `key`.
    pub fn lookup(&self, key: FileKey) -> Option<usize> {
        self.slots.iter().position(|slot| slot.matches(key))
    }

    /// Picks the slot `key` should live in.
    ///
    /// Returns the slot already holding `key` if there is one, then the first
    /// free slot, and otherwise closes and returns the least recently used
    /// slot. Among equally stale slots the first one wins.
    pub fn acquire_slot_for(&mut self, key: FileKey) -> usize {
        if let Some(index) = self.lookup(key) {
            return index;
        }

        if let Some(index) = self.slots.iter().position(|slot| !slot.is_open()) {
            return index;
        }

        let index = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, slot)| slot.last_used())
            .map(|(index, _)| index)
            .unwrap_or(0);

        let victim = &mut self.slots[index];
        if let Some(old) = victim.key {
            tracing::debug!(
                "evicting torrent {} file {} for torrent {} file {}",
                old.torrent,
                old.file,
                key.torrent,
                key.file
            );
        }
        victim.close();
        index
    }

    /// Returns an open handle for `key`, opening `path` if it isn't cached.
    ///
    /// A cached read-only handle is reopened when `writable` is requested; a
    /// cached writable handle is served as-is for read-only requests.
    pub fn checkout(
        &mut self,
        key: FileKey,
        path: &Path,
        writable: bool,
        mode: PreallocationMode,
        size: u64,
    ) -> Result<&mut File, FileError> {
        let index = match self.lookup(key) {
            Some(index) => {
                let slot = &mut self.slots[index];
                if writable && !slot.is_writable() {
                    tracing::debug!("reopening \"{}\" writable", path.display());
                    slot.close();
                }
                index
            }
            None => self.acquire_slot_for(key),
        };

        self.slots[index].checkout(key, path, writable, mode, size)
    }

    /// Returns the cached handle for `key` without opening anything.
    ///
    /// Misses when nothing is cached for `key`, or when `require_writable` is
    /// set and the cached handle is read-only.
    pub fn peek(&mut self, key: FileKey, require_writable: bool) -> Option<&mut File> {
        let index = self.lookup(key)?;
        let slot = &mut self.slots[index];
        if require_writable && !slot.is_writable() {
            return None;
        }

        slot.touch();
        slot.file.as_mut()
    }

    /// Modification time of the cached file for `key`, read from the open
    /// handle. Leaves the cache untouched.
    pub fn peek_mtime(&self, key: FileKey) -> Option<SystemTime> {
        let file = self.slots[self.lookup(key)?].file.as_ref()?;
        file.metadata().and_then(|meta| meta.modified()).ok()
    }

    /// Closes the cached handle for `key`, syncing it first if writable so
    /// its modification time is current. Does nothing if `key` isn't cached.
    pub fn close_member(&mut self, key: FileKey) {
        let Some(index) = self.lookup(key) else {
            return;
        };

        let slot = &mut self.slots[index];
        if slot.is_writable() {
            if let Some(file) = &slot.file {
                if let Err(e) = file.sync_all() {
                    tracing::debug!("sync before close failed: {}", e);
                }
            }
        }
        slot.close();
    }

    /// Closes every handle belonging to `torrent`.
    pub fn close_owner(&mut self, torrent: TorrentId) {
        for slot in self.slots.iter_mut() {
            if slot.is_open() && slot.key.is_some_and(|key| key.torrent == torrent) {
                slot.close();
            }
        }
    }

    /// Closes every open handle.
    pub fn close_all(&mut self) {
        for slot in self.slots.iter_mut().filter(|slot| slot.is_open()) {
            slot.close();
        }
    }
}
