use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Operation code carried in every packet header.
///
/// Data-plane opcodes live below `0x40`; admin opcodes issued by the
/// master occupy `0x41` and up. The dispatch classes (heartbeat,
/// urgent, normal) are derived from the opcode alone.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum Opcode {
    // Data-plane operations handled by the extent store.
    CreateExtent = 0x02,
    Write = 0x03,
    MarkDelete = 0x04,
    Read = 0x05,
    StreamRead = 0x06,

    // Admin commands pushed by the master.
    CreateDataPartition = 0x41,
    DeleteDataPartition = 0x42,
    LoadDataPartition = 0x43,
    UpdatePartitionMembers = 0x44,
    DecommissionPartition = 0x45,
    DataNodeHeartbeat = 0x46,
    MetaNodeHeartbeat = 0x47,
}

impl Opcode {
    /// Heartbeat probes; highest dispatch priority.
    pub fn is_heartbeat(self) -> bool {
        matches!(self, Opcode::DataNodeHeartbeat | Opcode::MetaNodeHeartbeat)
    }

    /// Membership and repair actions; dispatched ahead of normal tasks.
    pub fn is_urgent(self) -> bool {
        matches!(
            self,
            Opcode::UpdatePartitionMembers | Opcode::DecommissionPartition
        )
    }

    /// Whether this opcode is an admin command issued by the master.
    pub fn is_master_command(self) -> bool {
        u8::from(self) >= 0x41
    }

    /// Whether this opcode writes extent data.
    pub fn is_write(self) -> bool {
        matches!(self, Opcode::Write)
    }
}

/// Addressing mode of the extent a data packet touches.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum ExtentMode {
    Normal = 0,
    Tiny = 1,
}
