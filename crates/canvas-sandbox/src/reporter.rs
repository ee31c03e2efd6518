//! Sandbox-side half of the bridge
//!
//! [`SandboxReporter`] performs what the injected script does inside the
//! iframe: format console arguments, report uncaught errors and rejected
//! promises, guard the user code, and hold it back until the DOM is ready.
//! It posts to a [`BridgeChannel`], which lets a host be driven without a
//! browser, e.g. from an embedded script engine or a test.

use parking_lot::Mutex;

use crate::channel::{BridgeChannel, Envelope, FrameId};
use crate::protocol::{BridgeMessage, ConsoleMethod};
use crate::value::{format_console_arg, SandboxValue};
use crate::DEFAULT_TARGET_ORIGIN;

/// `document.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// An exception thrown by user code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thrown {
    pub message: String,
    pub line: u32,
    pub col: u32,
    pub stack: Option<String>,
}

impl Thrown {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: 0,
            col: 0,
            stack: None,
        }
    }

    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.line = line;
        self.col = col;
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

type UserCode = Box<dyn FnOnce() -> std::result::Result<(), Thrown> + Send>;

/// Reports runtime events of one sandbox to the host
pub struct SandboxReporter<C: BridgeChannel> {
    frame: FrameId,
    channel: C,
    target_origin: String,
    /// `DOMContentLoaded` listeners, in registration order
    deferred: Mutex<Vec<UserCode>>,
}

impl<C: BridgeChannel> SandboxReporter<C> {
    pub fn new(frame: FrameId, channel: C) -> Self {
        Self {
            frame,
            channel,
            target_origin: DEFAULT_TARGET_ORIGIN.to_string(),
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub fn with_target_origin(mut self, origin: impl Into<String>) -> Self {
        self.target_origin = origin.into();
        self
    }

    pub fn frame(&self) -> &FrameId {
        &self.frame
    }

    /// Intercepted `console[method](...args)`
    pub fn console(&self, method: ConsoleMethod, args: &[SandboxValue]) {
        let formatted = args.iter().map(format_console_arg).collect();
        let timestamp = chrono::Utc::now().timestamp_millis();
        self.post(BridgeMessage::console(method, formatted, timestamp));
    }

    /// `window.onerror`. Returns `false` so the browser still reports the
    /// error in its own console.
    pub fn on_error(&self, message: &str, line: u32, col: u32, stack: Option<String>) -> bool {
        self.post(BridgeMessage::runtime_error(message, line, col, stack));
        false
    }

    /// `window.onunhandledrejection`
    pub fn on_unhandled_rejection(&self, reason: &SandboxValue) {
        self.post(BridgeMessage::unhandled_rejection(&reason.to_js_string()));
    }

    /// Run user code inside the guard of `runUserCode`.
    pub fn run_user_code<F>(&self, code: F)
    where
        F: FnOnce() -> std::result::Result<(), Thrown>,
    {
        if let Err(thrown) = code() {
            self.console(
                ConsoleMethod::Error,
                &[SandboxValue::String(thrown.message.clone())],
            );
            self.post(BridgeMessage::thrown(
                thrown.message,
                thrown.line,
                thrown.col,
                thrown.stack,
            ));
        }
    }

    /// Run user code now, or once `DOMContentLoaded` fires when the document
    /// is still loading. Returns true if the code ran immediately.
    pub fn schedule_user_code<F>(&self, state: ReadyState, code: F) -> bool
    where
        F: FnOnce() -> std::result::Result<(), Thrown> + Send + 'static,
    {
        if state == ReadyState::Loading {
            self.deferred.lock().push(Box::new(code));
            false
        } else {
            self.run_user_code(code);
            true
        }
    }

    /// `DOMContentLoaded`: run all deferred user code once.
    pub fn dom_content_loaded(&self) {
        let deferred = std::mem::take(&mut *self.deferred.lock());
        for code in deferred {
            self.run_user_code(code);
        }
    }

    fn post(&self, message: BridgeMessage) {
        let envelope = Envelope::new(
            self.frame.clone(),
            self.target_origin.clone(),
            message.to_value(),
        );
        if let Err(e) = self.channel.send(envelope) {
            tracing::warn!("Bridge message from {} dropped: {}", self.frame, e);
        }
    }
}
