use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("worker pool task queue is full")]
    QueueFull,

    #[error("worker pool is stopped")]
    Stopped,

    #[error("submission cancelled: shutdown already signalled")]
    Cancelled,

    #[error("operation timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("cluster upstream unavailable: {0}")]
    Upstream(String),

    #[error("failed to persist alert: {0}")]
    Persist(String),

    #[error("sink notification failed: {0}")]
    Sink(String),

    #[error("websocket protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
