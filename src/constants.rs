//! Resource limits and tuning parameters.
//!
//! This module contains the constants used by the file-handle cache and the
//! peer socket admission controller.
//!
//! These values follow the defaults used by Transmission and libtorrent, which
//! keep a small set of open files and a peer cap well below the process
//! descriptor limit.

// ============================================================================
// File handle cache
// ============================================================================

/// Number of file handles kept open per session
pub const FILE_CACHE_SIZE: usize = 32;

/// Chunk size used when preallocating by writing zeros
pub const ZERO_FILL_CHUNK: usize = 4096;

/// Largest length the sparse fallback can seek to (signed 64-bit offset)
pub const MAX_SPARSE_LENGTH: u64 = i64::MAX as u64;

// ============================================================================
// Descriptor limits
// ============================================================================

/// Largest descriptor number select(2) can watch (FD_SETSIZE on Linux and BSD).
/// The soft limit is never raised above this.
pub const SOCKET_SET_CEILING: u64 = 1024;

// ============================================================================
// Connection limits
// ============================================================================

/// Default global peer connection limit (Transmission: 200, qBittorrent: 500)
pub const DEFAULT_PEER_LIMIT: usize = 200;
