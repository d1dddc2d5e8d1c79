//! Session resource configuration.

use crate::constants::{DEFAULT_PEER_LIMIT, FILE_CACHE_SIZE, SOCKET_SET_CEILING};

/// Settings consumed when a session builds its [`ResourceManager`].
///
/// [`ResourceManager`]: crate::ResourceManager
///
/// # Examples
///
/// ```
/// use rbit_fdlimit::ResourceConfig;
///
/// let config = ResourceConfig::default()
///     .with_file_cache_size(64)
///     .with_peer_limit(50)
///     .with_raise_fd_limit(false);
///
/// assert_eq!(config.file_cache_size, 64);
/// assert_eq!(config.peer_limit, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Number of file handles the cache keeps open. Clamped to at least 1.
    pub file_cache_size: usize,
    /// Maximum number of peer sockets open at once.
    pub peer_limit: usize,
    /// Whether to raise the process open-file soft limit on first use.
    pub raise_fd_limit: bool,
    /// Upper bound for the raised soft limit.
    pub descriptor_ceiling: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            file_cache_size: FILE_CACHE_SIZE,
            peer_limit: DEFAULT_PEER_LIMIT,
            raise_fd_limit: true,
            descriptor_ceiling: SOCKET_SET_CEILING,
        }
    }
}

impl ResourceConfig {
    pub fn with_file_cache_size(mut self, size: usize) -> Self {
        self.file_cache_size = size.max(1);
        self
    }

    pub fn with_peer_limit(mut self, limit: usize) -> Self {
        self.peer_limit = limit;
        self
    }

    pub fn with_raise_fd_limit(mut self, raise: bool) -> Self {
        self.raise_fd_limit = raise;
        self
    }

    pub fn with_descriptor_ceiling(mut self, ceiling: u64) -> Self {
        self.descriptor_ceiling = ceiling;
        self
    }
}
