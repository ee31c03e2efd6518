//! Code Canvas Core - Host Side of the Sandbox
//!
//! The host owns the code buffers, decides when the sandbox document is
//! regenerated, and collects what the sandbox reports back.
//!
//! # Architecture
//!
//! ```text
//!  edit(tab, value) ──► CanvasController ──(debounce via Scheduler)──► preview
//!                            ▲    │                                      │
//!                            │    └── on_preview(document) ──► iframe srcdoc
//!                            │
//!           BridgeListener   │
//!                            │
//!  BridgeChannel ──► HostBridge (trusts one FrameId, drops the rest)
//! ```
//!
//! Side ports are explicit so the controller can be driven without a
//! browser: [`Scheduler`] for the debounce timer, [`LayoutStore`] for the
//! persisted panel width, and `BridgeChannel` for cross-frame messages.

pub mod bridge;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod layout;
pub mod scheduler;
pub mod share;

pub use bridge::{BridgeListener, HostBridge};
pub use config::CanvasConfig;
pub use console::{ConsoleLine, ConsoleView, EMPTY_CONSOLE_TEXT};
pub use controller::{CanvasCallbacks, CanvasController, ControllerState, PreviewUpdate};
pub use error::{CanvasError, Result};
pub use layout::{FileLayoutStore, LayoutStore, MemoryLayoutStore, PanelResizer};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use share::{
    full_share_url, CanvasClient, CanvasPage, CanvasStats, CanvasUpdate, ShareRequest,
    ShareResponse, SharedCanvas, Visibility,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Quiet period after the last edit before the preview is regenerated
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
