pub mod heartbeat;
pub mod opcode;
pub mod packet;
pub mod task;

pub use heartbeat::{CreateDataPartitionRequest, DataNodeHeartbeatResponse, PartitionReport, Peer};
pub use opcode::{ExtentMode, Opcode};
pub use packet::{
    next_req_id, Packet, PacketError, PacketHeader, ResultCode, PACKET_HEADER_SIZE, PACKET_MAGIC,
};
pub use task::{task_id, AdminTask, AdminTaskFrame, TaskStatus};
