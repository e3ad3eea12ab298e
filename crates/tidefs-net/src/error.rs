use std::time::Duration;

use thiserror::Error;

/// Errors raised by the transport layer.
///
/// The connect/write/read split matters to callers: a connect failure
/// aborts the current dispatch batch, while write failures only skip
/// the task that hit them.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("packet write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("packet write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("packet read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("packet read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error(transparent)]
    Packet(#[from] tidefs_proto::PacketError),
}

impl NetError {
    /// Whether this error happened while acquiring a connection, as
    /// opposed to using one.
    pub fn is_connect(&self) -> bool {
        matches!(self, NetError::Connect { .. } | NetError::ConnectTimeout { .. })
    }
}
