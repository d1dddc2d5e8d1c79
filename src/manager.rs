//! Session-wide file handle and socket accounting.

use crate::config::ResourceConfig;
use crate::limits;
use crate::net::{is_family_unsupported, Domain, OwnedSocket, PeerSocket, SocketError, SocketKind};
use crate::storage::{
    FileError, FileIndex, FileKey, Fileset, PreallocationMode, StorageError, TorrentId,
    TorrentLayout,
};
use bytes::{Bytes, BytesMut};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::time::SystemTime;

/// Owns every cached file descriptor of a session and counts its sockets.
///
/// All methods take `&mut self`; a session shares one manager behind a
/// mutex (see [`Session`]). Handles returned by [`checkout`] and
/// [`peek_cached`] are borrowed and may be closed by the next call that
/// evicts, so they are never kept across calls.
///
/// [`Session`]: crate::Session
/// [`checkout`]: ResourceManager::checkout
/// [`peek_cached`]: ResourceManager::peek_cached
#[derive(Debug)]
pub struct ResourceManager {
    files: Fileset,
    socket_count: usize,
    socket_limit: usize,
    open_file_limit: Option<u64>,
    buffers_logged: bool,
}

impl ResourceManager {
    /// Builds the manager, raising the process open-file limit if configured.
    pub fn new(config: &ResourceConfig) -> Self {
        let open_file_limit = if config.raise_fd_limit {
            limits::raise_open_file_limit(config.descriptor_ceiling)
        } else {
            limits::open_file_limit().map(|(soft, _)| soft)
        };

        Self {
            files: Fileset::new(config.file_cache_size),
            socket_count: 0,
            socket_limit: config.peer_limit,
            open_file_limit,
            buffers_logged: false,
        }
    }

    pub fn files(&self) -> &Fileset {
        &self.files
    }

    pub fn open_count(&self) -> usize {
        self.files.open_count()
    }

    pub fn capacity(&self) -> usize {
        self.files.capacity()
    }

    /// Soft open-file limit observed when the manager was built.
    pub fn open_file_limit(&self) -> Option<u64> {
        self.open_file_limit
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    /// Returns an open handle for `torrent`'s file `index`.
    ///
    /// Opens `path` when the file isn't cached, evicting the least recently
    /// used handle if the cache is full. New writable files are preallocated
    /// to `size` per `mode`; existing files longer than `size` are truncated.
    pub fn checkout(
        &mut self,
        torrent: TorrentId,
        index: FileIndex,
        path: &Path,
        writable: bool,
        mode: PreallocationMode,
        size: u64,
    ) -> Result<&mut File, FileError> {
        self.files
            .checkout(FileKey::new(torrent, index), path, writable, mode, size)
    }

    /// Returns the cached handle without opening anything, or `None` if it
    /// isn't cached or is read-only while `require_writable` is set.
    pub fn peek_cached(
        &mut self,
        torrent: TorrentId,
        index: FileIndex,
        require_writable: bool,
    ) -> Option<&mut File> {
        self.files.peek(FileKey::new(torrent, index), require_writable)
    }

    /// Modification time of a cached file, without touching the cache.
    pub fn peek_mtime(&self, torrent: TorrentId, index: FileIndex) -> Option<SystemTime> {
        self.files.peek_mtime(FileKey::new(torrent, index))
    }

    /// Syncs and closes one cached file. No-op if it isn't open.
    pub fn close_member(&mut self, torrent: TorrentId, index: FileIndex) {
        self.files.close_member(FileKey::new(torrent, index));
    }

    /// Closes every cached file of `torrent`.
    pub fn close_owner(&mut self, torrent: TorrentId) {
        self.files.close_owner(torrent);
    }

    pub fn close_all(&mut self) {
        self.files.close_all();
    }

    /// Reads `length` bytes starting at torrent-global `offset`.
    pub fn read_block(
        &mut self,
        layout: &TorrentLayout,
        offset: u64,
        length: u64,
    ) -> Result<Bytes, StorageError> {
        let spans = layout.spans(offset, length)?;
        let mut data = BytesMut::zeroed(length as usize);
        let mut data_offset = 0usize;

        for span in spans {
            let file = self.layout_file(layout, span.file_index, false)?;
            file.seek(SeekFrom::Start(span.file_offset))?;

            let end = data_offset + span.length as usize;
            file.read_exact(&mut data[data_offset..end])?;
            data_offset = end;
        }

        Ok(data.freeze())
    }

    /// Writes `data` starting at torrent-global `offset`.
    pub fn write_block(
        &mut self,
        layout: &TorrentLayout,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StorageError> {
        let spans = layout.spans(offset, data.len() as u64)?;
        let mut data_offset = 0usize;

        for span in spans {
            let file = self.layout_file(layout, span.file_index, true)?;
            file.seek(SeekFrom::Start(span.file_offset))?;

            let chunk = &data[data_offset..data_offset + span.length as usize];
            file.write_all(chunk)?;

            data_offset += span.length as usize;
        }

        Ok(())
    }

    fn layout_file(
        &mut self,
        layout: &TorrentLayout,
        index: FileIndex,
        writable: bool,
    ) -> Result<&mut File, StorageError> {
        let entry = layout.file(index)?;
        let path = layout.file_path(index)?;
        let file = self.files.checkout(
            layout.key(index),
            &path,
            writable,
            layout.allocation_mode(),
            entry.length,
        )?;
        Ok(file)
    }

    // ------------------------------------------------------------------------
    // Sockets
    // ------------------------------------------------------------------------

    pub fn socket_count(&self) -> usize {
        self.socket_count
    }

    pub fn socket_limit(&self) -> usize {
        self.socket_limit
    }

    /// Changes the peer limit. Sockets already open stay open.
    pub fn set_socket_limit(&mut self, limit: usize) {
        self.socket_limit = limit;
    }

    fn has_socket_budget(&self) -> bool {
        self.socket_count < self.socket_limit
    }

    /// Creates a socket if the peer limit allows it.
    ///
    /// Refuses without touching the OS once the limit is reached.
    pub fn create_socket(
        &mut self,
        domain: Domain,
        kind: SocketKind,
    ) -> Result<PeerSocket, SocketError> {
        if !self.has_socket_budget() {
            tracing::trace!("refusing socket: {} of {} open", self.socket_count, self.socket_limit);
            return Err(SocketError::LimitReached {
                limit: self.socket_limit,
            });
        }

        let socket = PeerSocket::open(domain, kind).map_err(|e| {
            if !is_family_unsupported(&e) {
                tracing::error!("Couldn't create socket: {}", e);
            }
            SocketError::Io(e)
        })?;

        self.socket_count += 1;

        if !self.buffers_logged {
            self.buffers_logged = true;
            match socket.buffer_sizes() {
                Ok((send, recv)) => {
                    tracing::debug!("SO_SNDBUF size is {}", send);
                    tracing::debug!("SO_RCVBUF size is {}", recv);
                }
                Err(e) => tracing::debug!("couldn't read socket buffer sizes: {}", e),
            }
        }

        Ok(socket)
    }

    /// Accepts a pending connection from `listener`.
    ///
    /// The connection is always accepted; if the peer limit is reached it is
    /// closed straight away and [`SocketError::LimitReached`] is returned.
    /// A peer address the OS can't describe fails the accept and the
    /// connection is closed as well.
    pub fn accept_socket(
        &mut self,
        listener: &TcpListener,
    ) -> Result<(TcpStream, SocketAddr), SocketError> {
        let (stream, addr) = listener.accept()?;

        if !self.has_socket_budget() {
            tracing::trace!("dropping incoming connection from {}: peer limit reached", addr);
            drop(stream);
            return Err(SocketError::LimitReached {
                limit: self.socket_limit,
            });
        }

        self.socket_count += 1;
        Ok((stream, addr))
    }

    /// Closes a socket obtained from [`create_socket`] or [`accept_socket`].
    ///
    /// [`create_socket`]: ResourceManager::create_socket
    /// [`accept_socket`]: ResourceManager::accept_socket
    pub fn close_socket<S: OwnedSocket>(&mut self, socket: S) {
        drop(socket);
        debug_assert!(self.socket_count > 0, "closed more sockets than were opened");
        self.socket_count = self.socket_count.saturating_sub(1);
    }

    /// Closes every cached file and forgets the socket count. Sockets must
    /// already have been closed by their owners.
    pub(crate) fn shutdown(&mut self) {
        tracing::debug!(
            "closing {} cached files, {} sockets still counted",
            self.files.open_count(),
            self.socket_count
        );
        self.files.close_all();
        self.socket_count = 0;
    }
}
