//! WebSocket session protocol
//!
//! JSON text frames tagged by `type`. The page drives the controller with
//! [`ClientMessage`] and relays the iframe's `message` events; the gateway
//! answers with [`ServerMessage`].

use canvas_sandbox::{CodeBuffer, ConsoleEntry, ErrorEntry, FrameId, Tab};
use serde::{Deserialize, Serialize};

/// Frame id the page reports for events it cannot attribute to the sandbox
pub const UNKNOWN_SOURCE: &str = "null";

/// Message from the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Start over with new initial code
    Init {
        #[serde(default)]
        code: CodeBuffer,
    },
    Edit {
        tab: Tab,
        #[serde(default)]
        value: String,
    },
    Run,
    Reset,
    Clear,
    Close,
    /// A browser `message` event, relayed verbatim
    Relay {
        #[serde(default)]
        source: Option<FrameId>,
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::GatewayError::InvalidMessage(e.to_string()))
    }
}

/// Message to the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once after connect
    Session { frame_id: FrameId },
    /// New iframe `srcdoc`
    Preview { revision: u64, document: String },
    /// Editor contents after `init` or `reset`, so the page shows what the
    /// canvas was restored to
    Code { code: CodeBuffer },
    Console { entry: ConsoleEntry },
    Error { entry: ErrorEntry },
    Closed,
}

impl ServerMessage {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_sandbox::ConsoleMethod;
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        assert_eq!(ClientMessage::parse(r#"{"type":"run"}"#).unwrap(), ClientMessage::Run);
        assert_eq!(
            ClientMessage::parse(r#"{"type":"edit","tab":"css","value":"p{}"}"#).unwrap(),
            ClientMessage::Edit {
                tab: Tab::Css,
                value: "p{}".to_string()
            }
        );

        let init = ClientMessage::parse(r#"{"type":"init","code":{"js":"x"}}"#).unwrap();
        assert_eq!(
            init,
            ClientMessage::Init {
                code: CodeBuffer::new("", "", "x")
            }
        );
    }

    #[test]
    fn test_parse_relay_with_null_source() {
        let relay =
            ClientMessage::parse(r#"{"type":"relay","source":null,"data":{"type":"console"}}"#)
                .unwrap();
        match relay {
            ClientMessage::Relay { source, data } => {
                assert!(source.is_none());
                assert_eq!(data, json!({"type": "console"}));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"explode"}"#),
            Err(crate::GatewayError::InvalidMessage(_))
        ));
        assert!(ClientMessage::parse("not json").is_err());
    }

    #[test]
    fn test_server_message_shapes() {
        let msg = ServerMessage::Console {
            entry: ConsoleEntry {
                method: ConsoleMethod::Warn,
                args: vec!["a".to_string()],
                timestamp: 7,
            },
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "console", "entry": {"method": "warn", "args": ["a"], "timestamp": 7}})
        );

        let code = ServerMessage::Code {
            code: CodeBuffer::new("<p>x</p>", "", ""),
        };
        let value: serde_json::Value = serde_json::from_str(&code.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "code");
        assert_eq!(value["code"]["html"], "<p>x</p>");

        let closed = ServerMessage::Closed.to_json().unwrap();
        assert_eq!(closed, r#"{"type":"closed"}"#);
    }
}
