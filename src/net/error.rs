use thiserror::Error;

/// Errors from the socket admission controller.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The session's peer limit is reached. No OS socket was left open;
    /// retrying after another socket closes may succeed.
    #[error("peer limit reached ({limit} sockets open)")]
    LimitReached { limit: usize },

    /// The operating system refused the socket call.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SocketError {
    /// Whether this is a deliberate refusal rather than an OS failure.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::LimitReached { .. })
    }
}
