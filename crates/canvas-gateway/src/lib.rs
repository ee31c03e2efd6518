//! Code Canvas Gateway - Host Runtime for the Sandbox
//!
//! Serves a minimal host page that embeds the sandbox iframe and drives a
//! [`canvas_core::CanvasController`] per connected page over WebSocket.
//!
//! # Architecture
//!
//! ```text
//!  browser page                         gateway
//!  ┌──────────────────────┐   ws     ┌──────────────────────────────┐
//!  │ editor ──edit/run──────────────►│ CanvasSession                │
//!  │                      │          │   CanvasController (tokio)   │
//!  │ iframe srcdoc ◄──preview────────│   HostBridge ◄─ LocalChannel │
//!  │   │ postMessage      │          │                     ▲        │
//!  │   ▼                  │          │                     │        │
//!  │ message listener ──relay──────────────────────────────┘        │
//!  │ console ◄──console/error────────│                              │
//!  └──────────────────────┘          └──────────────────────────────┘
//! ```
//!
//! The page tags every relayed `message` event with the frame id the
//! gateway assigned to its iframe, or `null` when the event came from any
//! other window. Only the assigned frame is trusted.

pub mod error;
pub mod gateway;
pub mod protocol;
pub mod session;

pub use error::{GatewayError, Result};
pub use gateway::{ExtractRequest, GatewayServer, GatewayState};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{CanvasSession, Flow, SessionId};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
