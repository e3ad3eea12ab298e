use async_trait::async_trait;
use bytes::Bytes;

use crate::error::NetError;

/// An established, exclusively-owned transport connection.
///
/// Implementations may be TCP sockets or in-memory doubles for tests.
/// Connections are handed out by the pool one owner at a time, so the
/// methods take `&self` but are never raced by two writers.
#[async_trait]
pub trait Conn: Send + Sync + 'static {
    /// Write the whole buffer and flush it.
    async fn write_all(&self, data: Bytes) -> Result<(), NetError>;

    /// Read exactly `len` bytes.
    ///
    /// Returns [`NetError::ConnectionClosed`] if the peer hangs up
    /// before `len` bytes arrive.
    async fn read_exact(&self, len: usize) -> Result<Bytes, NetError>;

    /// Close the connection; repeated closes are harmless.
    async fn close(&self);

    /// The remote address this connection was dialed to.
    fn peer(&self) -> &str;
}

/// Dials new connections for the pool.
#[async_trait]
pub trait Connector<C: Conn>: Send + Sync {
    async fn connect(&self, addr: &str) -> Result<C, NetError>;
}
