use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tokio::net::TcpSocket;

/// Address family of a new socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Ipv4,
    Ipv6,
}

impl Domain {
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => Self::Ipv4,
            SocketAddr::V6(_) => Self::Ipv6,
        }
    }

    fn unspecified(self) -> SocketAddr {
        match self {
            Self::Ipv4 => (Ipv4Addr::UNSPECIFIED, 0).into(),
            Self::Ipv6 => (Ipv6Addr::UNSPECIFIED, 0).into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Datagram,
}

/// A socket created through the admission controller.
///
/// Stream sockets come back unconnected, ready for
/// [`TcpSocket::connect`]. Datagram sockets are bound to an ephemeral port
/// on the unspecified address.
#[derive(Debug)]
pub enum PeerSocket {
    Stream(TcpSocket),
    Datagram(UdpSocket),
}

impl PeerSocket {
    pub(crate) fn open(domain: Domain, kind: SocketKind) -> io::Result<Self> {
        match kind {
            SocketKind::Stream => {
                let socket = match domain {
                    Domain::Ipv4 => TcpSocket::new_v4()?,
                    Domain::Ipv6 => TcpSocket::new_v6()?,
                };
                Ok(Self::Stream(socket))
            }
            SocketKind::Datagram => Ok(Self::Datagram(UdpSocket::bind(domain.unspecified())?)),
        }
    }

    pub fn kind(&self) -> SocketKind {
        match self {
            Self::Stream(_) => SocketKind::Stream,
            Self::Datagram(_) => SocketKind::Datagram,
        }
    }

    /// Kernel send and receive buffer sizes, in bytes.
    pub fn buffer_sizes(&self) -> io::Result<(usize, usize)> {
        match self {
            Self::Stream(socket) => Ok((
                socket.send_buffer_size()? as usize,
                socket.recv_buffer_size()? as usize,
            )),
            Self::Datagram(socket) => datagram_buffer_sizes(socket),
        }
    }

    pub fn into_stream(self) -> Option<TcpSocket> {
        match self {
            Self::Stream(socket) => Some(socket),
            Self::Datagram(_) => None,
        }
    }

    pub fn into_datagram(self) -> Option<UdpSocket> {
        match self {
            Self::Datagram(socket) => Some(socket),
            Self::Stream(_) => None,
        }
    }
}

/// A socket value whose count is tracked by the admission controller.
///
/// Passing one to [`ResourceManager::close_socket`] closes it.
///
/// [`ResourceManager::close_socket`]: crate::ResourceManager::close_socket
pub trait OwnedSocket {}

impl OwnedSocket for PeerSocket {}
impl OwnedSocket for TcpSocket {}
impl OwnedSocket for tokio::net::TcpStream {}
impl OwnedSocket for tokio::net::UdpSocket {}
impl OwnedSocket for std::net::TcpStream {}
impl OwnedSocket for UdpSocket {}

/// Address family not supported by the host, e.g. IPv6 disabled. Hosts
/// without IPv6 hit this on every attempt, so it isn't logged as an error.
#[cfg(unix)]
pub(crate) fn is_family_unsupported(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EAFNOSUPPORT)
}

#[cfg(windows)]
pub(crate) fn is_family_unsupported(err: &io::Error) -> bool {
    // WSAEAFNOSUPPORT
    err.raw_os_error() == Some(10047)
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn is_family_unsupported(_err: &io::Error) -> bool {
    false
}

#[cfg(unix)]
fn datagram_buffer_sizes(socket: &UdpSocket) -> io::Result<(usize, usize)> {
    use std::os::fd::AsRawFd;

    let fd = socket.as_raw_fd();
    Ok((
        socket_option(fd, libc::SO_SNDBUF)?,
        socket_option(fd, libc::SO_RCVBUF)?,
    ))
}

#[cfg(unix)]
fn socket_option(fd: std::os::fd::RawFd, name: libc::c_int) -> io::Result<usize> {
    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // SAFETY: `value` and `len` are valid for writes and sized for a c_int option.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            name,
            (&mut value as *mut libc::c_int).cast(),
            &mut len,
        )
    };

    if rc == 0 {
        Ok(value.max(0) as usize)
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn datagram_buffer_sizes(_socket: &UdpSocket) -> io::Result<(usize, usize)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "buffer size query not available on this platform",
    ))
}
