//! Host side of the sandbox bridge
//!
//! Only envelopes whose source is the currently trusted frame are decoded
//! and forwarded. Everything else is dropped without touching the listener.

use canvas_sandbox::{
    BridgeChannel, BridgeEvent, BridgeMessage, ConsoleEntry, Envelope, ErrorEntry, FrameId,
    Subscription,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receiver of accepted bridge events
pub trait BridgeListener: Send + Sync {
    fn on_console(&self, entry: ConsoleEntry);
    fn on_error(&self, entry: ErrorEntry);
}

struct Shared {
    trusted: RwLock<Option<FrameId>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl Shared {
    fn handle(&self, envelope: &Envelope, listener: &dyn BridgeListener) {
        let trusted = self.trusted.read().clone();
        if trusted.as_ref() != Some(&envelope.source) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dropping message from untrusted source {}", envelope.source);
            return;
        }

        let Some(message) = BridgeMessage::decode(&envelope.data) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Malformed bridge message from {}", envelope.source);
            return;
        };

        self.accepted.fetch_add(1, Ordering::Relaxed);
        match message.into_event() {
            BridgeEvent::Console(entry) => listener.on_console(entry),
            BridgeEvent::Error(entry) => listener.on_error(entry),
        }
    }
}

/// Subscription of a listener to a bridge channel
pub struct HostBridge<C: BridgeChannel> {
    channel: C,
    subscription: Subscription,
    shared: Arc<Shared>,
}

impl<C: BridgeChannel> HostBridge<C> {
    /// Subscribe `listener` to `channel`. No frame is trusted until
    /// [`HostBridge::trust`] is called.
    pub fn attach<L>(channel: C, listener: L) -> Self
    where
        L: BridgeListener + 'static,
    {
        let shared = Arc::new(Shared {
            trusted: RwLock::new(None),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        });

        let handler_state = shared.clone();
        let subscription = channel.on_message(Arc::new(move |envelope: &Envelope| {
            handler_state.handle(envelope, &listener);
        }));

        Self {
            channel,
            subscription,
            shared,
        }
    }

    /// Trust `frame` as the only sandbox, replacing any previous one.
    pub fn trust(&self, frame: FrameId) {
        tracing::debug!("Trusting sandbox frame {}", frame);
        *self.shared.trusted.write() = Some(frame);
    }

    /// Stop trusting any frame.
    pub fn detach(&self) {
        *self.shared.trusted.write() = None;
    }

    pub fn trusted(&self) -> Option<FrameId> {
        self.shared.trusted.read().clone()
    }

    pub fn accepted(&self) -> u64 {
        self.shared.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.shared.rejected.load(Ordering::Relaxed)
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: BridgeChannel> Drop for HostBridge<C> {
    fn drop(&mut self) {
        self.channel.unsubscribe(self.subscription);
    }
}
