//! Code Canvas Sandbox - Preview Documents and the Sandbox Bridge
//!
//! Everything that runs on, or describes, the sandboxed side of the code
//! canvas: the three editable code buffers, the generator that turns them
//! into a self-contained HTML document for an iframe `srcdoc`, and the
//! message protocol the injected script uses to report console output and
//! runtime errors back to the host page.
//!
//! # Flow
//!
//! ```text
//!  CodeBuffer ──► generate_preview_document ──► iframe srcdoc
//!                                                   │
//!                         console / onerror shims   │ postMessage
//!                                                   ▼
//!                      Envelope { source: FrameId, data: BridgeMessage }
//!                                                   │
//!                                                   ▼
//!                                       BridgeChannel ──► host
//! ```
//!
//! The host side (acceptance by source identity, the debounced controller)
//! lives in `canvas-core`.

pub mod buffer;
pub mod channel;
pub mod document;
pub mod error;
pub mod extract;
pub mod protocol;
pub mod reporter;
pub mod value;

pub use buffer::{CodeBuffer, Tab};
pub use channel::{BridgeChannel, Envelope, FrameId, LocalChannel, MessageHandler, Subscription};
pub use document::{
    escape_closing_tags, generate_preview_document, generate_preview_document_with,
    DocumentOptions,
};
pub use error::{Result, SandboxError};
pub use extract::{is_runnable_language, parse_html_code, SourceLanguage};
pub use protocol::{BridgeEvent, BridgeMessage, ConsoleEntry, ConsoleMethod, ErrorEntry};
pub use reporter::{ReadyState, SandboxReporter, Thrown};
pub use value::{format_console_arg, js_number_string, SandboxValue};

/// The iframe `sandbox` attribute. This is the entire security boundary of
/// the preview: scripts run, the frame keeps its origin, and top navigation,
/// popups, forms and pointer lock stay disabled.
///
/// `allow-scripts` together with `allow-same-origin` lets a same-origin frame
/// remove its own sandbox. That is an accepted risk of the preview and must
/// not be changed silently.
pub const SANDBOX_ATTRIBUTE: &str = "allow-scripts allow-same-origin";

/// Target origin used by `postMessage` in the injected bridge script.
pub const DEFAULT_TARGET_ORIGIN: &str = "*";
