use super::cached_file::{FileIndex, FileKey, TorrentId};
use super::error::StorageError;
use super::preallocate::PreallocationMode;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub length: u64,
    pub offset: u64,
}

impl FileEntry {
    pub fn new(path: PathBuf, length: u64, offset: u64) -> Self {
        Self {
            path,
            length,
            offset,
        }
    }

    /// Torrent-global bytes covered by this file.
    pub fn byte_range(&self) -> Result<std::ops::Range<u64>, StorageError> {
        let end = self
            .offset
            .checked_add(self.length)
            .ok_or(StorageError::LayoutOverflow {
                offset: self.offset,
                length: self.length,
            })?;
        Ok(self.offset..end)
    }
}

/// A contiguous piece of a torrent-global byte range that falls in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpan {
    pub file_index: FileIndex,
    pub file_offset: u64,
    pub length: u64,
}

/// Where a torrent's files live on disk and how they are laid end to end.
#[derive(Debug, Clone)]
pub struct TorrentLayout {
    id: TorrentId,
    base_path: PathBuf,
    files: Vec<FileEntry>,
    total_length: u64,
    allocation_mode: PreallocationMode,
}

fn validate_file_path(file_path: &Path) -> Result<(), StorageError> {
    for component in file_path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::PathTraversal(file_path.display().to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

impl TorrentLayout {
    /// Builds a layout from files laid end to end, in order, starting at 0.
    pub fn new(id: TorrentId, base_path: PathBuf, files: Vec<FileEntry>) -> Result<Self, StorageError> {
        let mut total_length = 0u64;
        for (index, file) in files.iter().enumerate() {
            validate_file_path(&file.path)?;

            if file.offset != total_length {
                return Err(StorageError::NonContiguousFile {
                    index: index as FileIndex,
                    expected: total_length,
                    found: file.offset,
                });
            }
            total_length = file.byte_range()?.end;
        }

        Ok(Self {
            id,
            base_path,
            files,
            total_length,
            allocation_mode: PreallocationMode::default(),
        })
    }

    pub fn with_allocation_mode(mut self, mode: PreallocationMode) -> Self {
        self.allocation_mode = mode;
        self
    }

    pub fn id(&self) -> TorrentId {
        self.id
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn allocation_mode(&self) -> PreallocationMode {
        self.allocation_mode
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn key(&self, file_index: FileIndex) -> FileKey {
        FileKey::new(self.id, file_index)
    }

    pub fn file(&self, file_index: FileIndex) -> Result<&FileEntry, StorageError> {
        self.files
            .get(file_index as usize)
            .ok_or(StorageError::UnknownFile(file_index))
    }

    pub fn file_path(&self, file_index: FileIndex) -> Result<PathBuf, StorageError> {
        Ok(self.base_path.join(&self.file(file_index)?.path))
    }

    /// Splits `offset..offset + length` into per-file spans.
    pub fn spans(&self, offset: u64, length: u64) -> Result<Vec<FileSpan>, StorageError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.total_length => {}
            _ => {
                return Err(StorageError::InvalidRange {
                    offset,
                    length,
                    total: self.total_length,
                })
            }
        }

        let mut spans = Vec::new();
        let mut remaining = length;
        let mut current_offset = offset;

        for (file_idx, file) in self.files.iter().enumerate() {
            if remaining == 0 {
                break;
            }

            let file_end = file.offset + file.length;

            if current_offset >= file.offset && current_offset < file_end {
                let file_offset = current_offset - file.offset;
                let take = remaining.min(file_end - current_offset);

                spans.push(FileSpan {
                    file_index: file_idx as FileIndex,
                    file_offset,
                    length: take,
                });

                current_offset += take;
                remaining -= take;
            }
        }

        if remaining != 0 {
            return Err(StorageError::InvalidRange {
                offset,
                length,
                total: self.total_length,
            });
        }

        Ok(spans)
    }
}
