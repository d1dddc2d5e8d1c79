//! Session-level ownership of the resource manager.

use crate::config::ResourceConfig;
use crate::manager::ResourceManager;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Owns a session's [`ResourceManager`].
///
/// The manager is built on first use (which is also when the process
/// open-file limit is raised) and torn down once by [`Session::close`] or
/// when the session is dropped. The open-file limit is negotiated at most
/// once per session, even if the session is used again after a close. Access is serialized by a mutex around the
/// whole manager.
///
/// # Examples
///
/// ```no_run
/// use rbit_fdlimit::{Domain, ResourceConfig, Session, SocketKind};
///
/// let session = Session::new(ResourceConfig::default().with_peer_limit(60));
///
/// let socket = session
///     .resources()
///     .create_socket(Domain::Ipv4, SocketKind::Stream)?;
/// // ... connect and use the socket ...
/// session.resources().close_socket(socket);
/// # Ok::<(), rbit_fdlimit::SocketError>(())
/// ```
#[derive(Debug)]
pub struct Session {
    config: ResourceConfig,
    peer_limit: AtomicUsize,
    fd_limit_negotiated: AtomicBool,
    resources: OnceLock<Mutex<ResourceManager>>,
}

impl Session {
    pub fn new(config: ResourceConfig) -> Self {
        Self {
            peer_limit: AtomicUsize::new(config.peer_limit),
            fd_limit_negotiated: AtomicBool::new(false),
            config,
            resources: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Locks the resource manager, building it on first call.
    pub fn resources(&self) -> MutexGuard<'_, ResourceManager> {
        let mut resources = self
            .resources
            .get_or_init(|| {
                let raise = self.config.raise_fd_limit
                    && !self.fd_limit_negotiated.swap(true, Ordering::AcqRel);
                let config = self
                    .config
                    .clone()
                    .with_raise_fd_limit(raise)
                    .with_peer_limit(self.peer_limit.load(Ordering::SeqCst));
                Mutex::new(ResourceManager::new(&config))
            })
            .lock();

        // A set_peer_limit racing the first init may have missed the manager.
        let limit = self.peer_limit.load(Ordering::SeqCst);
        if resources.socket_limit() != limit {
            resources.set_socket_limit(limit);
        }
        resources
    }

    /// Whether the process open-file limit has been negotiated yet.
    pub fn fd_limit_negotiated(&self) -> bool {
        self.fd_limit_negotiated.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.get().is_some()
    }

    pub fn peer_limit(&self) -> usize {
        self.peer_limit.load(Ordering::SeqCst)
    }

    /// Changes the peer limit. Lowering it never closes open sockets.
    pub fn set_peer_limit(&self, limit: usize) {
        self.peer_limit.store(limit, Ordering::SeqCst);
        if let Some(resources) = self.resources.get() {
            resources.lock().set_socket_limit(limit);
        }
    }

    /// Closes every cached file and drops the manager.
    ///
    /// Sockets must be closed by their owners first; their count is
    /// forgotten. Calling this again is a no-op. Using [`resources`]
    /// afterwards starts from a fresh, empty manager without negotiating the
    /// open-file limit again.
    ///
    /// [`resources`]: Session::resources
    pub fn close(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.into_inner().shutdown();
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ResourceConfig::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Domain, SocketKind};
    use crate::storage::PreallocationMode;
    use tempfile::TempDir;

    fn test_session() -> Session {
        Session::new(
            ResourceConfig::default()
                .with_file_cache_size(2)
                .with_peer_limit(1)
                .with_raise_fd_limit(false),
        )
    }

    #[test]
    fn test_lazy_construction() {
        let session = test_session();
        assert!(!session.is_initialized());

        assert_eq!(session.resources().capacity(), 2);
        assert!(session.is_initialized());
    }

    #[test]
    fn test_peer_limit_before_and_after_init() {
        let session = test_session();
        session.set_peer_limit(3);
        assert_eq!(session.resources().socket_limit(), 3);

        session.set_peer_limit(0);
        assert_eq!(session.peer_limit(), 0);
        let result = session
            .resources()
            .create_socket(Domain::Ipv4, SocketKind::Stream);
        assert!(result.unwrap_err().is_refusal());
    }

    #[test]
    fn test_close_releases_files() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session();
        let path = temp.path().join("a.dat");

        session
            .resources()
            .checkout(1, 0, &path, true, PreallocationMode::Sparse, 100)
            .unwrap();
        assert_eq!(session.resources().open_count(), 1);

        session.close();
        assert!(!session.is_initialized());
        session.close();

        let mut resources = session.resources();
        assert_eq!(resources.open_count(), 0);
        resources
            .checkout(1, 0, &path, false, PreallocationMode::Sparse, 100)
            .unwrap();
        assert_eq!(resources.open_count(), 1);
    }

    #[test]
    fn test_reuse_after_close_skips_limit_negotiation() {
        let mut session = Session::new(
            ResourceConfig::default()
                .with_file_cache_size(2)
                .with_raise_fd_limit(true)
                // Never above the current soft limit, so nothing changes.
                .with_descriptor_ceiling(0),
        );
        assert!(!session.fd_limit_negotiated());

        assert_eq!(session.resources().capacity(), 2);
        assert!(session.fd_limit_negotiated());

        session.close();
        assert!(!session.is_initialized());
        assert_eq!(session.resources().open_count(), 0);
        assert!(session.fd_limit_negotiated());
    }

    #[test]
    fn test_manager_follows_latest_peer_limit() {
        let session = test_session();
        session.set_peer_limit(5);
        session.resources().set_socket_limit(1);

        assert_eq!(session.resources().socket_limit(), 5);
    }

    #[test]
    fn test_shared_across_threads() {
        let temp = TempDir::new().unwrap();
        let session = std::sync::Arc::new(test_session());

        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let session = session.clone();
                let path = temp.path().join(format!("{}.dat", i));
                std::thread::spawn(move || {
                    let mut resources = session.resources();
                    resources
                        .checkout(i, 0, &path, true, PreallocationMode::None, 0)
                        .map(|_| ())
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(session.resources().open_count(), 2);
    }
}
