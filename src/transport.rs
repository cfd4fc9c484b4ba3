//! The narrow boundary between the connection engine and the outside
//! world (spec.md §5): anything that looks like a bidirectional byte
//! stream with an optional peer address. A TLS listener, h2c upgrade
//! negotiation, and worker-pool dispatch all live on the other side of
//! this trait and are out of scope here.

use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Transport for tokio::net::TcpStream {
    fn peer_addr(&self) -> Option<SocketAddr> {
        tokio::net::TcpStream::peer_addr(self).ok()
    }
}

// Blanket impl so both the in-crate unit tests and the integration tests
// under `tests/` can drive the engine over an in-memory duplex pipe
// instead of a real socket.
impl Transport for tokio::io::DuplexStream {}
