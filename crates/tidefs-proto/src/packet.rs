use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use thiserror::Error;
use tidefs_types::{ExtentId, PartitionId, ReqId};

use crate::opcode::{ExtentMode, Opcode};

/// First byte of every packet header.
pub const PACKET_MAGIC: u8 = 0xD7;

/// Fixed header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 32;

/// Payloads larger than this are rejected before any allocation.
pub const PACKET_MAX_SIZE: usize = 256 * 1024 * 1024;

/// Reply result codes.
#[allow(non_snake_case)]
pub mod ResultCode {
    pub const OK: u8 = 0xF0;
    pub const ERR: u8 = 0xF1;
    pub const DISK_ERR: u8 = 0xF2;
}

/// Errors raised while decoding a packet header or payload.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("bad packet magic {0:#04x}")]
    BadMagic(u8),

    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("unknown extent mode {0:#04x}")]
    UnknownExtentMode(u8),

    #[error("payload of {size} bytes exceeds limit {max}")]
    TooLarge { size: usize, max: usize },

    #[error("payload crc mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("truncated packet: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// Decoded header fields, before the payload has been read.
///
/// On-wire layout is little-endian:
///
/// ```text
/// [magic:1][opcode:1][extent_mode:1][result_code:1]
/// [crc:4][size:4][partition_id:4][extent_id:8][req_id:8]
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub opcode: Opcode,
    pub extent_mode: ExtentMode,
    pub result_code: u8,
    pub crc: u32,
    pub size: u32,
    pub partition_id: PartitionId,
    pub extent_id: ExtentId,
    pub req_id: ReqId,
}

impl PacketHeader {
    /// Decode and validate the fixed 32-byte header.
    pub fn decode(header: &[u8; PACKET_HEADER_SIZE]) -> Result<Self, PacketError> {
        if header[0] != PACKET_MAGIC {
            return Err(PacketError::BadMagic(header[0]));
        }
        let opcode =
            Opcode::try_from(header[1]).map_err(|_| PacketError::UnknownOpcode(header[1]))?;
        let extent_mode = ExtentMode::try_from(header[2])
            .map_err(|_| PacketError::UnknownExtentMode(header[2]))?;
        let size = u32::from_le_bytes(header[8..12].try_into().unwrap());
        if size as usize > PACKET_MAX_SIZE {
            return Err(PacketError::TooLarge {
                size: size as usize,
                max: PACKET_MAX_SIZE,
            });
        }
        Ok(Self {
            opcode,
            extent_mode,
            result_code: header[3],
            crc: u32::from_le_bytes(header[4..8].try_into().unwrap()),
            size,
            partition_id: PartitionId(u32::from_le_bytes(header[12..16].try_into().unwrap())),
            extent_id: ExtentId(u64::from_le_bytes(header[16..24].try_into().unwrap())),
            req_id: ReqId(u64::from_le_bytes(header[24..32].try_into().unwrap())),
        })
    }

    /// Join the header with its payload, verifying the checksum.
    pub fn into_packet(self, data: Bytes) -> Result<Packet, PacketError> {
        let actual = crc32c::crc32c(&data);
        if actual != self.crc {
            return Err(PacketError::CrcMismatch {
                expected: self.crc,
                actual,
            });
        }
        Ok(Packet {
            opcode: self.opcode,
            extent_mode: self.extent_mode,
            result_code: self.result_code,
            partition_id: self.partition_id,
            extent_id: self.extent_id,
            req_id: self.req_id,
            data,
        })
    }
}

/// One framed request or reply: the header fields plus the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub opcode: Opcode,
    pub extent_mode: ExtentMode,
    pub result_code: u8,
    pub partition_id: PartitionId,
    pub extent_id: ExtentId,
    pub req_id: ReqId,
    pub data: Bytes,
}

impl Packet {
    /// Build a request packet with a freshly generated request id.
    pub fn request(opcode: Opcode, data: Bytes) -> Self {
        Self {
            opcode,
            extent_mode: ExtentMode::Normal,
            result_code: 0,
            partition_id: PartitionId(0),
            extent_id: ExtentId(0),
            req_id: next_req_id(),
            data,
        }
    }

    /// Whether the reply carries a success result code.
    pub fn is_ok(&self) -> bool {
        self.result_code == ResultCode::OK
    }

    /// The reply's error message, carried in the payload on failure.
    pub fn error_message(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Serialize header + payload into one contiguous frame.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(PACKET_HEADER_SIZE + self.data.len());
        buf.push(PACKET_MAGIC);
        buf.push(self.opcode.into());
        buf.push(self.extent_mode.into());
        buf.push(self.result_code);
        buf.extend_from_slice(&crc32c::crc32c(&self.data).to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.partition_id.raw().to_le_bytes());
        buf.extend_from_slice(&self.extent_id.raw().to_le_bytes());
        buf.extend_from_slice(&self.req_id.raw().to_le_bytes());
        buf.extend_from_slice(&self.data);
        Bytes::from(buf)
    }

    /// Decode a complete frame (header + payload) from one buffer.
    pub fn decode(frame: &[u8]) -> Result<Self, PacketError> {
        if frame.len() < PACKET_HEADER_SIZE {
            return Err(PacketError::Truncated {
                need: PACKET_HEADER_SIZE,
                have: frame.len(),
            });
        }
        let raw: [u8; PACKET_HEADER_SIZE] = frame[..PACKET_HEADER_SIZE].try_into().unwrap();
        let header = PacketHeader::decode(&raw)?;
        let size = header.size as usize;
        let rest = &frame[PACKET_HEADER_SIZE..];
        if rest.len() < size {
            return Err(PacketError::Truncated {
                need: PACKET_HEADER_SIZE + size,
                have: frame.len(),
            });
        }
        header.into_packet(Bytes::copy_from_slice(&rest[..size]))
    }
}

static REQ_ID: AtomicU64 = AtomicU64::new(1);

/// Hand out the next process-wide request id.
pub fn next_req_id() -> ReqId {
    ReqId(REQ_ID.fetch_add(1, Ordering::Relaxed))
}
