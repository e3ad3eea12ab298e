pub mod config;
pub mod error;
pub mod sender;
pub mod task_registry;
pub mod user_store;

pub use config::SenderConfig;
pub use error::TaskError;
pub use sender::AdminTaskSender;
pub use task_registry::TaskRegistry;
pub use user_store::{
    AkPolicy, MetaStore, RaftCmd, RaftPartition, UserAk, UserStore, UserStoreError, VolAk,
};
