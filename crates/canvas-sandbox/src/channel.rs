//! Cross-frame message channel
//!
//! The sandbox and the host never share memory; they only exchange
//! messages, asynchronously. [`BridgeChannel`] is that contract with the
//! browser globals taken out: `send` stands in for `postMessage` and
//! `on_message` for `addEventListener('message', ...)`. Every envelope
//! carries the [`FrameId`] of the browsing context that sent it, the
//! equivalent of `event.source`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::Result;

/// Identity of one sandbox browsing context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub String);

impl FrameId {
    pub fn new() -> Self {
        Self(format!("frame:{}", Uuid::new_v4()))
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A posted message together with its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Browsing context that posted the message
    pub source: FrameId,

    /// Origin the sender restricted delivery to (`*` for any)
    pub target_origin: String,

    /// Structured-clone payload
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(source: FrameId, target_origin: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            source,
            target_origin: target_origin.into(),
            data,
        }
    }
}

/// Handler invoked for every delivered envelope
pub type MessageHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Registration returned by [`BridgeChannel::on_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(pub u64);

/// Asynchronous message channel between sandbox and host
pub trait BridgeChannel: Send + Sync {
    /// Post an envelope. Never invokes handlers synchronously.
    fn send(&self, envelope: Envelope) -> Result<()>;

    /// Register a handler for delivered envelopes.
    fn on_message(&self, handler: MessageHandler) -> Subscription;

    /// Remove a handler. Returns false if it was not registered.
    fn unsubscribe(&self, subscription: Subscription) -> bool;
}

/// In-process channel with an explicit delivery step
///
/// `send` only queues; [`LocalChannel::deliver_pending`] plays the role of
/// the event loop turn that dispatches queued `message` events.
#[derive(Default)]
pub struct LocalChannel {
    queue: Mutex<VecDeque<Envelope>>,
    handlers: Mutex<Vec<(Subscription, MessageHandler)>>,
    next_id: AtomicU64,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued, undelivered envelopes
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Deliver every queued envelope, in order, to every handler. Envelopes
    /// sent by handlers during delivery are delivered in the same call.
    pub fn deliver_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.queue.lock().pop_front();
            let Some(envelope) = next else {
                break;
            };
            // Snapshot so handlers may subscribe or unsubscribe re-entrantly.
            let handlers: Vec<MessageHandler> = self
                .handlers
                .lock()
                .iter()
                .map(|(_, h)| h.clone())
                .collect();
            for handler in handlers {
                handler(&envelope);
            }
            delivered += 1;
        }
        delivered
    }
}

impl BridgeChannel for LocalChannel {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.queue.lock().push_back(envelope);
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        let subscription = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push((subscription, handler));
        subscription
    }

    fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(s, _)| *s != subscription);
        handlers.len() != before
    }
}

impl<C: BridgeChannel + ?Sized> BridgeChannel for Arc<C> {
    fn send(&self, envelope: Envelope) -> Result<()> {
        (**self).send(envelope)
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        (**self).on_message(handler)
    }

    fn unsubscribe(&self, subscription: Subscription) -> bool {
        (**self).unsubscribe(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_ids_are_unique() {
        let a = FrameId::new();
        let b = FrameId::new();
        assert_ne!(a, b);
        assert!(a.0.starts_with("frame:"));
    }

    #[test]
    fn test_send_is_deferred_until_delivery() {
        let channel = LocalChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.on_message(Arc::new(move |env: &Envelope| {
            sink.lock().push(env.data.clone());
        }));

        let source = FrameId::new();
        channel.send(Envelope::new(source.clone(), "*", json!(1))).unwrap();
        channel.send(Envelope::new(source, "*", json!(2))).unwrap();
        assert!(seen.lock().is_empty());
        assert_eq!(channel.pending(), 2);

        assert_eq!(channel.deliver_pending(), 2);
        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let channel = LocalChannel::new();
        let sub = channel.on_message(Arc::new(|_: &Envelope| {}));
        assert_eq!(channel.handler_count(), 1);
        assert!(channel.unsubscribe(sub));
        assert!(!channel.unsubscribe(sub));
        assert_eq!(channel.handler_count(), 0);
    }
}
