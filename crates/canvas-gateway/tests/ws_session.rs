//! WebSocket session against a running gateway

use canvas_core::CanvasConfig;
use canvas_gateway::GatewayServer;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(config: CanvasConfig) -> (Arc<GatewayServer>, String) {
    let server = Arc::new(GatewayServer::new(config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = server.clone();
    tokio::spawn(async move {
        serving.serve(listener).await.unwrap();
    });
    (server, format!("ws://{}/ws", addr))
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a server message")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn ws_edit_relay_and_close() {
    let (server, url) = start(CanvasConfig::default().with_debounce_ms(50)).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let greeting = next_json(&mut socket).await;
    assert_eq!(greeting["type"], "session");
    let frame_id = greeting["frame_id"].as_str().unwrap().to_string();

    let first = next_json(&mut socket).await;
    assert_eq!(first["type"], "preview");
    assert_eq!(first["revision"], 0);

    send(&mut socket, json!({"type": "edit", "tab": "js", "value": "console.log(1)"})).await;
    send(&mut socket, json!({"type": "edit", "tab": "js", "value": "console.log(12)"})).await;
    let preview = next_json(&mut socket).await;
    assert_eq!(preview["type"], "preview");
    assert_eq!(preview["revision"], 1);
    assert!(preview["document"].as_str().unwrap().contains("console.log(12)"));

    let bridge_message = json!({"type": "console", "method": "log", "args": ["12"], "timestamp": 1});
    send(&mut socket, json!({"type": "relay", "source": null, "data": bridge_message})).await;
    send(&mut socket, json!({"type": "not-a-message"})).await;
    send(&mut socket, json!({"type": "relay", "source": frame_id, "data": bridge_message})).await;

    let console = next_json(&mut socket).await;
    assert_eq!(console["type"], "console");
    assert_eq!(console["entry"]["args"], json!(["12"]));

    send(&mut socket, json!({"type": "close"})).await;
    let closed = next_json(&mut socket).await;
    assert_eq!(closed["type"], "closed");

    server.shutdown();
}

#[tokio::test]
async fn ws_run_clears_and_regenerates() {
    let (server, url) = start(CanvasConfig::default()).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    next_json(&mut socket).await;
    next_json(&mut socket).await;

    send(
        &mut socket,
        json!({"type": "init", "code": {"html": "<p>hi</p>", "css": "", "js": ""}}),
    )
    .await;
    let init = next_json(&mut socket).await;
    assert_eq!(init["revision"], 0);
    assert!(init["document"].as_str().unwrap().contains("<p>hi</p>"));
    let code = next_json(&mut socket).await;
    assert_eq!(code["type"], "code");
    assert_eq!(code["code"]["html"], "<p>hi</p>");

    send(&mut socket, json!({"type": "run"})).await;
    let run = next_json(&mut socket).await;
    assert_eq!(run["type"], "preview");
    assert_eq!(run["revision"], 1);

    server.shutdown();
}
