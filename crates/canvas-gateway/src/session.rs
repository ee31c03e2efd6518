//! One sandbox session per WebSocket connection
//!
//! A session owns the controller for the page's canvas, the in-process
//! bridge channel the page's relayed `message` events are pushed into, and
//! the identity of the page's iframe.

use canvas_core::{CanvasCallbacks, CanvasConfig, CanvasController, HostBridge, Scheduler};
use canvas_sandbox::{BridgeChannel, CodeBuffer, Envelope, FrameId, LocalChannel};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServerMessage, UNKNOWN_SOURCE};
use crate::Result;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// What the connection loop should do after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Sandbox session bound to one page
pub struct CanvasSession {
    id: SessionId,
    frame: FrameId,
    config: CanvasConfig,
    scheduler: Arc<dyn Scheduler>,
    channel: Arc<LocalChannel>,
    outgoing: mpsc::UnboundedSender<ServerMessage>,
    controller: CanvasController,
    bridge: HostBridge<Arc<LocalChannel>>,
}

impl CanvasSession {
    /// Create a session with empty code. Server messages are pushed into
    /// `outgoing`; the `session` greeting and the first preview are queued
    /// immediately.
    pub fn new(
        config: CanvasConfig,
        scheduler: Arc<dyn Scheduler>,
        outgoing: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        let id = SessionId::new();
        let frame = FrameId::new();
        let channel = Arc::new(LocalChannel::new());
        let (controller, bridge) = Self::mount(
            CodeBuffer::default(),
            &config,
            &scheduler,
            &channel,
            &frame,
            &outgoing,
        );

        let session = Self {
            id,
            frame,
            config,
            scheduler,
            channel,
            outgoing,
            controller,
            bridge,
        };
        session.send(ServerMessage::Session {
            frame_id: session.frame.clone(),
        });
        session.send_current_preview();
        tracing::info!("Session {} started, sandbox frame {}", session.id, session.frame);
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn frame(&self) -> &FrameId {
        &self.frame
    }

    pub fn controller(&self) -> &CanvasController {
        &self.controller
    }

    pub fn bridge(&self) -> &HostBridge<Arc<LocalChannel>> {
        &self.bridge
    }

    /// Parse and apply one client text frame. Unparseable frames are logged
    /// and ignored.
    pub fn handle_text(&mut self, text: &str) -> Flow {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle(message),
            Err(e) => {
                tracing::warn!("Session {}: ignoring client frame: {}", self.id, e);
                Flow::Continue
            }
        }
    }

    pub fn handle(&mut self, message: ClientMessage) -> Flow {
        match message {
            ClientMessage::Init { code } => {
                self.init(code);
            }
            ClientMessage::Edit { tab, value } => {
                self.controller.set_active_tab(tab);
                self.controller.edit(tab, value);
            }
            ClientMessage::Run => self.controller.run(),
            ClientMessage::Reset => {
                self.controller.reset();
                self.send_code();
            }
            ClientMessage::Clear => self.controller.clear_console(),
            ClientMessage::Close => {
                self.controller.close();
                return Flow::Close;
            }
            ClientMessage::Relay { source, data } => {
                if let Err(e) = self.relay(source, data) {
                    tracing::warn!("Session {}: relay failed: {}", self.id, e);
                }
            }
        }
        Flow::Continue
    }

    /// Replace the canvas with new initial code. The iframe stays the same
    /// browsing context, so the trusted frame does not change.
    fn init(&mut self, code: CodeBuffer) {
        self.controller.shutdown();
        let (controller, bridge) = Self::mount(
            code,
            &self.config,
            &self.scheduler,
            &self.channel,
            &self.frame,
            &self.outgoing,
        );
        self.bridge = bridge;
        self.controller = controller;
        self.send_current_preview();
        self.send_code();
        tracing::debug!("Session {} re-initialized", self.id);
    }

    fn relay(&self, source: Option<FrameId>, data: serde_json::Value) -> Result<()> {
        let source = source.unwrap_or_else(|| FrameId::from_str(UNKNOWN_SOURCE));
        let envelope = Envelope::new(source, self.config.document.target_origin.clone(), data);
        self.channel.send(envelope)?;
        self.channel.deliver_pending();
        Ok(())
    }

    fn mount(
        code: CodeBuffer,
        config: &CanvasConfig,
        scheduler: &Arc<dyn Scheduler>,
        channel: &Arc<LocalChannel>,
        frame: &FrameId,
        outgoing: &mpsc::UnboundedSender<ServerMessage>,
    ) -> (CanvasController, HostBridge<Arc<LocalChannel>>) {
        let console_tx = outgoing.clone();
        let error_tx = outgoing.clone();
        let close_tx = outgoing.clone();
        let preview_tx = outgoing.clone();

        let callbacks = CanvasCallbacks::new()
            .on_console(move |entry| {
                let _ = console_tx.send(ServerMessage::Console {
                    entry: entry.clone(),
                });
            })
            .on_error(move |entry| {
                let _ = error_tx.send(ServerMessage::Error {
                    entry: entry.clone(),
                });
            })
            .on_close(move || {
                let _ = close_tx.send(ServerMessage::Closed);
            })
            .on_preview(move |update| {
                let _ = preview_tx.send(ServerMessage::Preview {
                    revision: update.revision,
                    document: update.document.clone(),
                });
            });

        let controller =
            CanvasController::new(code, scheduler.clone(), config).with_callbacks(callbacks);
        let bridge = HostBridge::attach(channel.clone(), controller.clone());
        bridge.trust(frame.clone());
        (controller, bridge)
    }

    fn send_current_preview(&self) {
        self.send(ServerMessage::Preview {
            revision: self.controller.preview_revision(),
            document: self.controller.preview_document(),
        });
    }

    fn send_code(&self) {
        self.send(ServerMessage::Code {
            code: self.controller.current(),
        });
    }

    fn send(&self, message: ServerMessage) {
        if self.outgoing.send(message).is_err() {
            tracing::debug!("Session {}: outgoing channel closed", self.id);
        }
    }
}

impl Drop for CanvasSession {
    fn drop(&mut self) {
        self.bridge.detach();
        self.controller.shutdown();
        tracing::info!(
            "Session {} ended ({} accepted, {} rejected bridge messages)",
            self.id,
            self.bridge.accepted(),
            self.bridge.rejected()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::ManualScheduler;
    use canvas_sandbox::{BridgeMessage, ConsoleMethod, Tab};
    use std::time::Duration;

    fn session() -> (
        CanvasSession,
        Arc<ManualScheduler>,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let scheduler = Arc::new(ManualScheduler::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let session = CanvasSession::new(CanvasConfig::default(), scheduler.clone(), tx);
        (session, scheduler, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_greeting_and_first_preview() {
        let (session, _, mut rx) = session();
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            ServerMessage::Session {
                frame_id: session.frame().clone()
            }
        );
        assert!(matches!(messages[1], ServerMessage::Preview { revision: 0, .. }));
    }

    #[test]
    fn test_init_edit_and_debounce() {
        let (mut session, scheduler, mut rx) = session();
        drain(&mut rx);

        session.handle(ClientMessage::Init {
            code: CodeBuffer::new("<p>hi</p>", "", ""),
        });
        match drain(&mut rx).as_slice() {
            [ServerMessage::Preview { revision: 0, document }, ServerMessage::Code { code }] => {
                assert!(document.contains("<p>hi</p>"));
                assert_eq!(code.html, "<p>hi</p>");
            }
            other => panic!("unexpected messages: {:?}", other),
        }

        session.handle_text(r#"{"type":"edit","tab":"js","value":"a"}"#);
        session.handle_text(r#"{"type":"edit","tab":"js","value":"ab"}"#);
        scheduler.advance(Duration::from_millis(500));

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ServerMessage::Preview { revision: 1, .. }));
        assert_eq!(session.controller().active_tab(), Tab::Js);
    }

    #[test]
    fn test_relay_accepts_only_the_session_frame() {
        let (mut session, _, mut rx) = session();
        drain(&mut rx);
        let data = BridgeMessage::console(ConsoleMethod::Info, vec!["hi".to_string()], 1).to_value();

        session.handle(ClientMessage::Relay {
            source: None,
            data: data.clone(),
        });
        session.handle(ClientMessage::Relay {
            source: Some(FrameId::new()),
            data: data.clone(),
        });
        assert!(drain(&mut rx).is_empty());

        session.handle(ClientMessage::Relay {
            source: Some(session.frame().clone()),
            data,
        });
        let messages = drain(&mut rx);
        assert!(matches!(messages.as_slice(), [ServerMessage::Console { .. }]));
        assert_eq!(session.controller().logs().len(), 1);
        assert_eq!(session.bridge().rejected(), 2);
    }

    #[test]
    fn test_reinit_keeps_single_listener() {
        let (mut session, _, mut rx) = session();
        session.handle(ClientMessage::Init {
            code: CodeBuffer::default(),
        });
        session.handle(ClientMessage::Init {
            code: CodeBuffer::default(),
        });
        drain(&mut rx);

        let data = BridgeMessage::runtime_error("boom", 1, 2, None).to_value();
        session.handle(ClientMessage::Relay {
            source: Some(session.frame().clone()),
            data,
        });
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_reset_sends_restored_code() {
        let (mut session, scheduler, mut rx) = session();
        session.handle(ClientMessage::Init {
            code: CodeBuffer::new("<p>start</p>", "p{}", ""),
        });
        session.handle_text(r#"{"type":"edit","tab":"html","value":"<p>changed</p>"}"#);
        scheduler.advance(Duration::from_millis(500));
        drain(&mut rx);

        session.handle(ClientMessage::Reset);
        match drain(&mut rx).as_slice() {
            [ServerMessage::Preview { document, .. }, ServerMessage::Code { code }] => {
                assert!(document.contains("<p>start</p>"));
                assert_eq!(*code, CodeBuffer::new("<p>start</p>", "p{}", ""));
            }
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[test]
    fn test_close_and_garbage() {
        let (mut session, _, mut rx) = session();
        drain(&mut rx);
        assert_eq!(session.handle_text("{{{"), Flow::Continue);
        assert_eq!(session.handle_text(r#"{"type":"close"}"#), Flow::Close);
        assert_eq!(drain(&mut rx), vec![ServerMessage::Closed]);
    }
}
