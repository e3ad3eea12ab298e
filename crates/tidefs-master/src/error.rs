use thiserror::Error;
use tidefs_net::NetError;

/// Errors surfaced by the admin task send paths.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Net(#[from] NetError),

    /// The remote answered the synchronous create-partition request
    /// with a non-OK result code; the payload carries its message.
    #[error("remote rejected task: {0}")]
    RemoteRejected(String),

    #[error("encode task {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
