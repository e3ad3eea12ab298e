use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::conn::{Conn, Connector};
use crate::error::NetError;

/// TCP connection backed by a tokio stream split into halves, so a
/// reader and writer never contend on one lock.
pub struct TcpConn {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer: String,
}

impl TcpConn {
    pub fn from_stream(stream: TcpStream, peer: String) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: Mutex::new(read_half),
            writer: Mutex::new(write_half),
            peer,
        }
    }
}

#[async_trait]
impl Conn for TcpConn {
    async fn write_all(&self, data: Bytes) -> Result<(), NetError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(&data).await.map_err(NetError::Write)?;
        writer.flush().await.map_err(NetError::Write)?;
        Ok(())
    }

    async fn read_exact(&self, len: usize) -> Result<Bytes, NetError> {
        let mut buf = BytesMut::zeroed(len);
        let mut reader = self.reader.lock().await;
        match reader.read_exact(&mut buf).await {
            Ok(_) => Ok(buf.freeze()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(NetError::ConnectionClosed)
            }
            Err(e) => Err(NetError::Read(e)),
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

impl std::fmt::Debug for TcpConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConn").field("peer", &self.peer).finish()
    }
}

/// Dials plain TCP connections with `TCP_NODELAY` set; admin packets
/// are small and latency-sensitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector<TcpConn> for TcpConnector {
    async fn connect(&self, addr: &str) -> Result<TcpConn, NetError> {
        let stream = TcpStream::connect(addr).await.map_err(|source| NetError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        let _ = stream.set_nodelay(true);
        Ok(TcpConn::from_stream(stream, addr.to_string()))
    }
}
