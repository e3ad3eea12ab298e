use std::time::Duration;

use tidefs_proto::{Packet, PacketHeader, PACKET_HEADER_SIZE};

use crate::conn::Conn;
use crate::error::NetError;

/// Write one framed packet, failing if the whole frame has not been
/// flushed within `deadline`.
pub async fn write_packet<C: Conn>(
    conn: &C,
    pkt: &Packet,
    deadline: Duration,
) -> Result<(), NetError> {
    let frame = pkt.to_bytes();
    match tokio::time::timeout(deadline, conn.write_all(frame)).await {
        Ok(result) => result,
        Err(_) => Err(NetError::WriteTimeout(deadline)),
    }
}

/// Read exactly one framed packet within `deadline`.
///
/// The header is validated (magic, opcode, size bound) before the
/// payload is read, and the payload checksum is verified afterwards.
pub async fn read_packet<C: Conn>(conn: &C, deadline: Duration) -> Result<Packet, NetError> {
    match tokio::time::timeout(deadline, read_packet_inner(conn)).await {
        Ok(result) => result,
        Err(_) => Err(NetError::ReadTimeout(deadline)),
    }
}

async fn read_packet_inner<C: Conn>(conn: &C) -> Result<Packet, NetError> {
    let raw = conn.read_exact(PACKET_HEADER_SIZE).await?;
    let raw: [u8; PACKET_HEADER_SIZE] = raw
        .as_ref()
        .try_into()
        .expect("read_exact returned the requested length");
    let header = PacketHeader::decode(&raw)?;
    let payload = if header.size == 0 {
        bytes::Bytes::new()
    } else {
        conn.read_exact(header.size as usize).await?
    };
    Ok(header.into_packet(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use tidefs_proto::Opcode;

    /// In-memory connection: records writes, serves reads from a byte
    /// buffer, and can be told to stall forever.
    struct MemConn {
        written: Mutex<Vec<Bytes>>,
        readable: Mutex<Vec<u8>>,
        stall_reads: bool,
    }

    impl MemConn {
        fn new() -> Self {
            Self {
                written: Mutex::new(Vec::new()),
                readable: Mutex::new(Vec::new()),
                stall_reads: false,
            }
        }

        fn with_readable(data: Vec<u8>) -> Self {
            Self {
                written: Mutex::new(Vec::new()),
                readable: Mutex::new(data),
                stall_reads: false,
            }
        }

        fn stalled() -> Self {
            Self {
                written: Mutex::new(Vec::new()),
                readable: Mutex::new(Vec::new()),
                stall_reads: true,
            }
        }
    }

    #[async_trait]
    impl Conn for MemConn {
        async fn write_all(&self, data: Bytes) -> Result<(), NetError> {
            self.written.lock().push(data);
            Ok(())
        }

        async fn read_exact(&self, len: usize) -> Result<Bytes, NetError> {
            if self.stall_reads {
                std::future::pending::<()>().await;
            }
            let mut buf = self.readable.lock();
            if buf.len() < len {
                return Err(NetError::ConnectionClosed);
            }
            let head: Vec<u8> = buf.drain(..len).collect();
            Ok(Bytes::from(head))
        }

        async fn close(&self) {}

        fn peer(&self) -> &str {
            "mem"
        }
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let pkt = Packet::request(Opcode::DeleteDataPartition, Bytes::from_static(b"body"));

        let out = MemConn::new();
        write_packet(&out, &pkt, Duration::from_secs(1)).await.unwrap();
        let frame = out.written.lock().concat();

        let input = MemConn::with_readable(frame);
        let back = read_packet(&input, Duration::from_secs(1)).await.unwrap();
        assert_eq!(back, pkt);
    }

    #[tokio::test]
    async fn test_read_empty_payload() {
        let pkt = Packet::request(Opcode::DataNodeHeartbeat, Bytes::new());
        let input = MemConn::with_readable(pkt.to_bytes().to_vec());
        let back = read_packet(&input, Duration::from_secs(1)).await.unwrap();
        assert!(back.data.is_empty());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let conn = MemConn::stalled();
        let result = read_packet(&conn, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), NetError::ReadTimeout(_)));
    }

    #[tokio::test]
    async fn test_read_bad_magic() {
        let pkt = Packet::request(Opcode::Write, Bytes::new());
        let mut frame = pkt.to_bytes().to_vec();
        frame[0] = 0x99;
        let input = MemConn::with_readable(frame);
        let result = read_packet(&input, Duration::from_secs(1)).await;
        assert!(matches!(result.unwrap_err(), NetError::Packet(_)));
    }

    #[tokio::test]
    async fn test_read_peer_hangup_mid_frame() {
        let pkt = Packet::request(Opcode::Write, Bytes::from_static(b"payload"));
        let mut frame = pkt.to_bytes().to_vec();
        frame.truncate(PACKET_HEADER_SIZE + 2);
        let input = MemConn::with_readable(frame);
        let result = read_packet(&input, Duration::from_secs(1)).await;
        assert!(matches!(result.unwrap_err(), NetError::ConnectionClosed));
    }
}
