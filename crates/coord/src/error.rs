use thiserror::Error;

/// Errors that can occur in the coordination layer.
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown signal code {0}")]
    UnknownSignal(i64),

    #[error("signal channel closed")]
    ChannelClosed,

    #[error("missing key '{0}' in coordination store")]
    MissingKey(String),
}
