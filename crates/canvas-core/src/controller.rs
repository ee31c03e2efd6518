//! Editor/preview controller
//!
//! Owns the three code buffers of one sandbox session (current, preview,
//! initial) and the console/error lists the sandbox reports into. Edits are
//! committed to the preview after a trailing-edge debounce; `run` and
//! `reset` commit immediately.

use canvas_sandbox::{
    generate_preview_document_with, CodeBuffer, ConsoleEntry, DocumentOptions, ErrorEntry, Tab,
};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::bridge::BridgeListener;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::share::{ShareRequest, Visibility};
use crate::CanvasConfig;

/// Debounce state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No regeneration pending
    Idle,
    /// Edit received, timer running
    Debouncing,
    /// Preview committed from the current buffer
    Committed,
}

/// A regenerated preview document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewUpdate {
    /// Increments on every regeneration, starting at 1
    pub revision: u64,
    pub document: String,
}

type ConsoleCallback = Arc<dyn Fn(&ConsoleEntry) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&ErrorEntry) + Send + Sync>;
type CloseCallback = Arc<dyn Fn() + Send + Sync>;
type PreviewCallback = Arc<dyn Fn(&PreviewUpdate) + Send + Sync>;

/// Callbacks towards the embedding application
///
/// All of them run after the controller has released its state lock, so
/// they may call back into the controller.
#[derive(Clone, Default)]
pub struct CanvasCallbacks {
    on_console: Option<ConsoleCallback>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
    on_preview: Option<PreviewCallback>,
}

impl CanvasCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_console(mut self, f: impl Fn(&ConsoleEntry) + Send + Sync + 'static) -> Self {
        self.on_console = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ErrorEntry) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_preview(mut self, f: impl Fn(&PreviewUpdate) + Send + Sync + 'static) -> Self {
        self.on_preview = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for CanvasCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasCallbacks")
            .field("on_console", &self.on_console.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_preview", &self.on_preview.is_some())
            .finish()
    }
}

struct State {
    initial: CodeBuffer,
    current: CodeBuffer,
    preview: CodeBuffer,
    modified: bool,
    logs: Vec<ConsoleEntry>,
    errors: Vec<ErrorEntry>,
    active_tab: Tab,
    phase: ControllerState,
    pending: Option<TimerHandle>,
    /// Bumped whenever a pending timer is superseded
    generation: u64,
    revision: u64,
    document: String,
}

struct Inner {
    state: Mutex<State>,
    scheduler: Arc<dyn Scheduler>,
    callbacks: RwLock<CanvasCallbacks>,
    debounce: Duration,
    options: DocumentOptions,
}

/// Controller for one sandbox session
#[derive(Clone)]
pub struct CanvasController {
    inner: Arc<Inner>,
}

impl CanvasController {
    /// Create a controller whose buffers all start at `initial`. The first
    /// preview document is generated eagerly as revision 0; no debounce is
    /// scheduled.
    pub fn new(initial: CodeBuffer, scheduler: Arc<dyn Scheduler>, config: &CanvasConfig) -> Self {
        let options = config.document_options();
        let document = generate_preview_document_with(&initial, &options);
        let state = State {
            active_tab: initial.initial_tab(),
            current: initial.clone(),
            preview: initial.clone(),
            initial,
            modified: false,
            logs: Vec::new(),
            errors: Vec::new(),
            phase: ControllerState::Idle,
            pending: None,
            generation: 0,
            revision: 0,
            document,
        };

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                scheduler,
                callbacks: RwLock::new(CanvasCallbacks::default()),
                debounce: config.debounce(),
                options,
            }),
        }
    }

    pub fn with_callbacks(self, callbacks: CanvasCallbacks) -> Self {
        self.set_callbacks(callbacks);
        self
    }

    pub fn set_callbacks(&self, callbacks: CanvasCallbacks) {
        *self.inner.callbacks.write() = callbacks;
    }

    /// Update one tab of the current buffer and restart the debounce timer.
    pub fn edit(&self, tab: Tab, value: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.current.set(tab, value);
        state.modified = true;
        self.cancel_pending(&mut state);

        let generation = state.generation;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = self.inner.scheduler.schedule(
            self.inner.debounce,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    CanvasController { inner }.commit_debounced(generation);
                }
            }),
        );
        state.pending = Some(handle);
        state.phase = ControllerState::Debouncing;
        tracing::debug!("Edit on {} tab, debounce generation {}", tab, generation);
    }

    /// Commit the current buffer now and clear the console.
    pub fn run(&self) {
        let update = {
            let mut state = self.inner.state.lock();
            self.cancel_pending(&mut state);
            state.preview = state.current.clone();
            state.logs.clear();
            state.errors.clear();
            state.phase = ControllerState::Committed;
            self.regenerate(&mut state)
        };
        tracing::debug!("Manual run, preview revision {}", update.revision);
        self.emit_preview(&update);
    }

    /// Restore all buffers to the initial code and clear the console.
    pub fn reset(&self) {
        let update = {
            let mut state = self.inner.state.lock();
            self.cancel_pending(&mut state);
            state.current = state.initial.clone();
            state.preview = state.initial.clone();
            state.modified = false;
            state.logs.clear();
            state.errors.clear();
            state.phase = ControllerState::Committed;
            self.regenerate(&mut state)
        };
        tracing::debug!("Reset, preview revision {}", update.revision);
        self.emit_preview(&update);
    }

    /// Clear logs and errors; buffers are untouched.
    pub fn clear_console(&self) {
        let mut state = self.inner.state.lock();
        state.logs.clear();
        state.errors.clear();
    }

    /// Dismiss the panel. Any pending regeneration is dropped.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            self.cancel_pending(&mut state);
            state.phase = ControllerState::Idle;
        }
        let callback = self.inner.callbacks.read().on_close.clone();
        if let Some(f) = callback {
            f();
        }
    }

    /// Unmount without notifying: cancel any pending regeneration and drop
    /// the callbacks.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            self.cancel_pending(&mut state);
            state.phase = ControllerState::Idle;
        }
        *self.inner.callbacks.write() = CanvasCallbacks::default();
    }

    pub fn set_active_tab(&self, tab: Tab) {
        self.inner.state.lock().active_tab = tab;
    }

    /// Append a console entry reported by the sandbox.
    pub fn handle_console(&self, entry: ConsoleEntry) {
        self.inner.state.lock().logs.push(entry.clone());
        let callback = self.inner.callbacks.read().on_console.clone();
        if let Some(f) = callback {
            f(&entry);
        }
    }

    /// Append an error reported by the sandbox.
    pub fn handle_error(&self, entry: ErrorEntry) {
        self.inner.state.lock().errors.push(entry.clone());
        let callback = self.inner.callbacks.read().on_error.clone();
        if let Some(f) = callback {
            f(&entry);
        }
    }

    pub fn state(&self) -> ControllerState {
        self.inner.state.lock().phase
    }

    pub fn current(&self) -> CodeBuffer {
        self.inner.state.lock().current.clone()
    }

    pub fn preview(&self) -> CodeBuffer {
        self.inner.state.lock().preview.clone()
    }

    pub fn initial(&self) -> CodeBuffer {
        self.inner.state.lock().initial.clone()
    }

    pub fn is_modified(&self) -> bool {
        self.inner.state.lock().modified
    }

    pub fn logs(&self) -> Vec<ConsoleEntry> {
        self.inner.state.lock().logs.clone()
    }

    pub fn errors(&self) -> Vec<ErrorEntry> {
        self.inner.state.lock().errors.clone()
    }

    pub fn active_tab(&self) -> Tab {
        self.inner.state.lock().active_tab
    }

    pub fn preview_revision(&self) -> u64 {
        self.inner.state.lock().revision
    }

    /// Document for the iframe's `srcdoc`
    pub fn preview_document(&self) -> String {
        self.inner.state.lock().document.clone()
    }

    /// Share request for the current buffer
    pub fn share_request(&self, title: impl Into<String>, visibility: Visibility) -> ShareRequest {
        let state = self.inner.state.lock();
        ShareRequest::new(title, &state.current, visibility)
    }

    fn commit_debounced(&self, generation: u64) {
        let update = {
            let mut state = self.inner.state.lock();
            if state.generation != generation || state.pending.is_none() {
                tracing::debug!("Ignoring superseded debounce generation {}", generation);
                return;
            }
            state.pending = None;
            state.phase = ControllerState::Committed;
            state.errors.clear();
            if state.current == state.preview {
                None
            } else {
                state.preview = state.current.clone();
                Some(self.regenerate(&mut state))
            }
        };

        if let Some(update) = update {
            tracing::debug!("Debounce committed, preview revision {}", update.revision);
            self.emit_preview(&update);
        }
    }

    fn cancel_pending(&self, state: &mut State) {
        state.generation += 1;
        if let Some(handle) = state.pending.take() {
            self.inner.scheduler.cancel(handle);
        }
    }

    fn regenerate(&self, state: &mut State) -> PreviewUpdate {
        state.revision += 1;
        state.document = generate_preview_document_with(&state.preview, &self.inner.options);
        PreviewUpdate {
            revision: state.revision,
            document: state.document.clone(),
        }
    }

    fn emit_preview(&self, update: &PreviewUpdate) {
        let callback = self.inner.callbacks.read().on_preview.clone();
        if let Some(f) = callback {
            f(update);
        }
    }
}

impl BridgeListener for CanvasController {
    fn on_console(&self, entry: ConsoleEntry) {
        self.handle_console(entry);
    }

    fn on_error(&self, entry: ErrorEntry) {
        self.handle_error(entry);
    }
}

impl std::fmt::Debug for CanvasController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CanvasController")
            .field("phase", &state.phase)
            .field("modified", &state.modified)
            .field("revision", &state.revision)
            .field("logs", &state.logs.len())
            .field("errors", &state.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use canvas_sandbox::ConsoleMethod;

    fn setup() -> (CanvasController, Arc<ManualScheduler>, Arc<Mutex<Vec<PreviewUpdate>>>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let previews = Arc::new(Mutex::new(Vec::new()));
        let sink = previews.clone();
        let controller = CanvasController::new(
            CodeBuffer::new("<p>hi</p>", "body{color:red}", "console.log(1)"),
            scheduler.clone(),
            &CanvasConfig::default(),
        )
        .with_callbacks(CanvasCallbacks::new().on_preview(move |u| sink.lock().push(u.clone())));
        (controller, scheduler, previews)
    }

    fn log(text: &str) -> ConsoleEntry {
        ConsoleEntry {
            method: ConsoleMethod::Log,
            args: vec![text.to_string()],
            timestamp: 1,
        }
    }

    fn error(text: &str) -> ErrorEntry {
        ErrorEntry {
            message: text.to_string(),
            line: 1,
            col: 1,
            stack: None,
        }
    }

    #[test]
    fn test_initial_state() {
        let (controller, scheduler, previews) = setup();
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.current(), controller.initial());
        assert_eq!(controller.preview(), controller.initial());
        assert_eq!(controller.preview_revision(), 0);
        assert!(controller.preview_document().contains("<p>hi</p>"));
        assert_eq!(controller.active_tab(), Tab::Html);
        assert!(!controller.is_modified());
        assert_eq!(scheduler.pending(), 0);
        assert!(previews.lock().is_empty());
    }

    #[test]
    fn test_rapid_edits_regenerate_once_with_last_value() {
        let (controller, scheduler, previews) = setup();

        controller.edit(Tab::Js, "a");
        scheduler.advance(Duration::from_millis(200));
        controller.edit(Tab::Js, "ab");
        assert_eq!(controller.state(), ControllerState::Debouncing);
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(499));
        assert!(previews.lock().is_empty());
        assert_eq!(controller.preview().js, "console.log(1)");

        scheduler.advance(Duration::from_millis(1));
        let previews = previews.lock();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].revision, 1);
        assert_eq!(controller.preview().js, "ab");
        assert_eq!(controller.state(), ControllerState::Committed);
        assert!(controller.is_modified());
    }

    #[test]
    fn test_debounce_clears_errors_but_keeps_logs() {
        let (controller, scheduler, _) = setup();
        controller.handle_console(log("kept"));
        controller.handle_error(error("stale"));

        controller.edit(Tab::Css, "p{}");
        scheduler.advance(Duration::from_millis(500));

        assert_eq!(controller.logs().len(), 1);
        assert!(controller.errors().is_empty());
    }

    #[test]
    fn test_unchanged_commit_does_not_regenerate() {
        let (controller, scheduler, previews) = setup();
        controller.edit(Tab::Js, "console.log(1)");
        scheduler.advance(Duration::from_millis(500));
        assert!(previews.lock().is_empty());
        assert_eq!(controller.preview_revision(), 0);
    }

    #[test]
    fn test_run_clears_and_commits_immediately() {
        let (controller, scheduler, previews) = setup();
        controller.handle_console(log("old"));
        controller.handle_error(error("old"));
        controller.edit(Tab::Js, "console.log(2)");

        controller.run();

        assert!(controller.logs().is_empty());
        assert!(controller.errors().is_empty());
        assert_eq!(controller.preview().js, "console.log(2)");
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(previews.lock().len(), 1);

        // The cancelled timer must not regenerate again.
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(previews.lock().len(), 1);
    }

    #[test]
    fn test_run_without_changes_still_regenerates() {
        let (controller, _, previews) = setup();
        controller.run();
        controller.run();
        assert_eq!(previews.lock().len(), 2);
        assert_eq!(controller.preview_revision(), 2);
    }

    #[test]
    fn test_reset_restores_initial() {
        let (controller, scheduler, _) = setup();
        controller.edit(Tab::Html, "<h1>changed</h1>");
        scheduler.advance(Duration::from_millis(500));
        controller.edit(Tab::Css, "h1{}");
        controller.handle_console(log("x"));
        controller.handle_error(error("y"));
        assert!(controller.is_modified());

        controller.reset();

        let initial = controller.initial();
        assert_eq!(controller.current(), initial);
        assert_eq!(controller.preview(), initial);
        assert!(!controller.is_modified());
        assert!(controller.logs().is_empty());
        assert!(controller.errors().is_empty());

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(controller.current(), initial);
    }

    #[test]
    fn test_clear_console_keeps_buffers() {
        let (controller, _, _) = setup();
        controller.edit(Tab::Js, "x");
        controller.handle_console(log("x"));
        controller.handle_error(error("x"));

        controller.clear_console();

        assert!(controller.logs().is_empty());
        assert!(controller.errors().is_empty());
        assert_eq!(controller.current().js, "x");
    }

    #[test]
    fn test_close_cancels_pending_and_notifies() {
        let scheduler = Arc::new(ManualScheduler::new());
        let closed = Arc::new(Mutex::new(0));
        let counter = closed.clone();
        let controller = CanvasController::new(
            CodeBuffer::default(),
            scheduler.clone(),
            &CanvasConfig::default(),
        )
        .with_callbacks(CanvasCallbacks::new().on_close(move || *counter.lock() += 1));

        controller.edit(Tab::Js, "x");
        controller.close();

        assert_eq!(*closed.lock(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_shutdown_is_silent() {
        let (controller, scheduler, previews) = setup();
        let closed = Arc::new(Mutex::new(false));
        let flag = closed.clone();
        controller.set_callbacks(CanvasCallbacks::new().on_close(move || *flag.lock() = true));

        controller.edit(Tab::Js, "x");
        controller.shutdown();
        scheduler.advance(Duration::from_secs(1));

        assert!(!*closed.lock());
        assert!(previews.lock().is_empty());
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_callbacks_receive_entries() {
        let (controller, _, _) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let logs = seen.clone();
        let errors = seen.clone();
        controller.set_callbacks(
            CanvasCallbacks::new()
                .on_console(move |e| logs.lock().push(e.args.join(" ")))
                .on_error(move |e| errors.lock().push(e.message.clone())),
        );

        controller.on_console(log("hello"));
        controller.on_error(error("boom"));

        assert_eq!(*seen.lock(), vec!["hello".to_string(), "boom".to_string()]);
    }

    #[test]
    fn test_active_tab_follows_initial_content() {
        let controller = CanvasController::new(
            CodeBuffer::new("", "", "let x = 1"),
            Arc::new(ManualScheduler::new()),
            &CanvasConfig::default(),
        );
        assert_eq!(controller.active_tab(), Tab::Js);
        controller.set_active_tab(Tab::Css);
        assert_eq!(controller.active_tab(), Tab::Css);
    }

    #[test]
    fn test_share_request_uses_current_buffer() {
        let (controller, _, _) = setup();
        controller.edit(Tab::Js, "alert(1)");
        let request = controller.share_request("Demo", Visibility::Unlisted);
        assert_eq!(request.title, "Demo");
        assert_eq!(request.js, "alert(1)");
        assert_eq!(request.visibility, Visibility::Unlisted);
    }
}
