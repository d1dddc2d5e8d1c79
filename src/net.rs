//! Peer socket admission.
//!
//! Every peer socket the session opens or accepts is counted against a
//! configured peer limit. Past the limit new sockets are refused with
//! [`SocketError::LimitReached`], which callers treat as "try later" rather
//! than as a broken environment.
//!
//! The counting itself lives on [`ResourceManager`]; this module provides
//! the socket types and errors it works with.
//!
//! [`ResourceManager`]: crate::ResourceManager

mod error;
mod socket;

pub use error::SocketError;
pub use socket::{Domain, OwnedSocket, PeerSocket, SocketKind};

pub(crate) use socket::is_family_unsupported;
