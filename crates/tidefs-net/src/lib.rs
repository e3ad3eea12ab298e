pub mod conn;
pub mod error;
pub mod frame;
pub mod pool;
pub mod tcp;

pub use conn::{Conn, Connector};
pub use error::NetError;
pub use frame::{read_packet, write_packet};
pub use pool::{ConnPool, PoolConfig};
pub use tcp::{TcpConn, TcpConnector};
