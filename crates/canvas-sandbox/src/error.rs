//! Error types for the sandbox crate

use thiserror::Error;

/// Sandbox error type
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Circular structure cannot be serialized")]
    CircularStructure,

    #[error("Unknown tab: {0}")]
    UnknownTab(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SandboxError {
    fn from(e: serde_json::Error) -> Self {
        SandboxError::Serialization(e.to_string())
    }
}

/// Result type for sandbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;
