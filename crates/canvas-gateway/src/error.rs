//! Error types for the gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use canvas_core::CanvasError;
use canvas_sandbox::SandboxError;
use thiserror::Error;

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Canvas error: {0}")]
    Canvas(#[from] CanvasError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl From<axum::Error> for GatewayError {
    fn from(e: axum::Error) -> Self {
        GatewayError::WebSocket(e.to_string())
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidMessage(_) | GatewayError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Canvas(CanvasError::NotFound(_)) => StatusCode::NOT_FOUND,
            GatewayError::InvalidConfig(_) | GatewayError::Canvas(CanvasError::InvalidConfig(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, axum::Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
