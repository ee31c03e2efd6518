//! Bridge message protocol (sandbox → host)
//!
//! The injected script posts plain objects with a `type` discriminator.
//! These types mirror those objects exactly so they can be decoded from the
//! `data` of a relayed `message` event, or produced by a Rust-side
//! [`SandboxReporter`](crate::SandboxReporter).

use serde::{Deserialize, Serialize};

/// Prefix of the message posted for an unhandled promise rejection
pub const UNHANDLED_REJECTION_PREFIX: &str = "Unhandled Promise Rejection: ";

/// Intercepted console method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMethod {
    Log,
    Warn,
    Error,
    Info,
}

impl ConsoleMethod {
    pub const ALL: [ConsoleMethod; 4] = [
        ConsoleMethod::Log,
        ConsoleMethod::Warn,
        ConsoleMethod::Error,
        ConsoleMethod::Info,
    ];
}

impl std::fmt::Display for ConsoleMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleMethod::Log => write!(f, "log"),
            ConsoleMethod::Warn => write!(f, "warn"),
            ConsoleMethod::Error => write!(f, "error"),
            ConsoleMethod::Info => write!(f, "info"),
        }
    }
}

/// Message posted by the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeMessage {
    /// A console call with pre-stringified arguments
    Console {
        method: ConsoleMethod,
        #[serde(default)]
        args: Vec<String>,
        /// Epoch milliseconds in the sandbox
        #[serde(default)]
        timestamp: i64,
    },

    /// Uncaught error, rejected promise or exception thrown by user code
    Error {
        #[serde(default)]
        message: String,
        #[serde(default)]
        line: u32,
        #[serde(default)]
        col: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl BridgeMessage {
    pub fn console(method: ConsoleMethod, args: Vec<String>, timestamp: i64) -> Self {
        BridgeMessage::Console {
            method,
            args,
            timestamp,
        }
    }

    /// Message from `window.onerror`
    pub fn runtime_error(
        message: impl Into<String>,
        line: u32,
        col: u32,
        stack: Option<String>,
    ) -> Self {
        BridgeMessage::Error {
            message: message.into(),
            line,
            col,
            stack,
        }
    }

    /// Message from `window.onunhandledrejection`
    pub fn unhandled_rejection(reason: &str) -> Self {
        BridgeMessage::Error {
            message: format!("{}{}", UNHANDLED_REJECTION_PREFIX, reason),
            line: 0,
            col: 0,
            stack: None,
        }
    }

    /// Message for an exception caught around the user code
    pub fn thrown(message: impl Into<String>, line: u32, col: u32, stack: Option<String>) -> Self {
        Self::runtime_error(message, line, col, stack)
    }

    /// Decode the `data` of a message event. Anything that is not a bridge
    /// message yields `None`.
    pub fn decode(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Both variants serialize to plain JSON objects.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn into_event(self) -> BridgeEvent {
        match self {
            BridgeMessage::Console {
                method,
                args,
                timestamp,
            } => BridgeEvent::Console(ConsoleEntry {
                method,
                args,
                timestamp,
            }),
            BridgeMessage::Error {
                message,
                line,
                col,
                stack,
            } => BridgeEvent::Error(ErrorEntry {
                message,
                line,
                col,
                stack,
            }),
        }
    }
}

/// One console line as kept by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub method: ConsoleMethod,
    pub args: Vec<String>,
    pub timestamp: i64,
}

/// One runtime error as kept by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub line: u32,
    pub col: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Decoded bridge message, ready for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Console(ConsoleEntry),
    Error(ErrorEntry),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_console_wire_shape() {
        let msg = BridgeMessage::console(ConsoleMethod::Warn, vec!["a".into()], 42);
        assert_eq!(
            msg.to_value(),
            json!({"type": "console", "method": "warn", "args": ["a"], "timestamp": 42})
        );
    }

    #[test]
    fn test_error_wire_shape_omits_missing_stack() {
        let msg = BridgeMessage::runtime_error("boom", 3, 7, None);
        assert_eq!(
            msg.to_value(),
            json!({"type": "error", "message": "boom", "line": 3, "col": 7})
        );
    }

    #[test]
    fn test_unhandled_rejection_message() {
        let msg = BridgeMessage::unhandled_rejection("nope");
        assert_eq!(
            msg,
            BridgeMessage::Error {
                message: "Unhandled Promise Rejection: nope".into(),
                line: 0,
                col: 0,
                stack: None,
            }
        );
    }

    #[test]
    fn test_decode_from_browser_payload() {
        let data = json!({
            "type": "error",
            "message": "x is not defined",
            "line": 12,
            "col": 5,
            "stack": "ReferenceError: x is not defined\n    at runUserCode"
        });
        let event = BridgeMessage::decode(&data).unwrap().into_event();
        match event {
            BridgeEvent::Error(entry) => {
                assert_eq!(entry.line, 12);
                assert!(entry.stack.unwrap().starts_with("ReferenceError"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_defaults_missing_position() {
        let data = json!({"type": "error", "message": "Script error."});
        let msg = BridgeMessage::decode(&data).unwrap();
        assert_eq!(msg, BridgeMessage::runtime_error("Script error.", 0, 0, None));
    }

    #[test]
    fn test_decode_rejects_foreign_payloads() {
        assert!(BridgeMessage::decode(&json!({"type": "resize", "height": 10})).is_none());
        assert!(BridgeMessage::decode(&json!("hello")).is_none());
        assert!(BridgeMessage::decode(&json!({"type": "console", "method": "debug"})).is_none());
    }
}
