//! Error types for the canvas host

use canvas_sandbox::SandboxError;
use thiserror::Error;

/// Canvas error type
///
/// Failures inside the sandbox never show up here; they arrive as bridge
/// events and are rendered in the console.
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CanvasError {
    fn from(e: serde_json::Error) -> Self {
        CanvasError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for CanvasError {
    fn from(e: toml::de::Error) -> Self {
        CanvasError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for CanvasError {
    fn from(e: toml::ser::Error) -> Self {
        CanvasError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for CanvasError {
    fn from(e: reqwest::Error) -> Self {
        CanvasError::Http(e.to_string())
    }
}

/// Result type for canvas operations
pub type Result<T> = std::result::Result<T, CanvasError>;
