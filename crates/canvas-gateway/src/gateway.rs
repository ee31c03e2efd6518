//! Main gateway implementation
//!
//! Serves the host page, stateless render/extract endpoints, and one
//! WebSocket sandbox session per connected page.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderValue,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use canvas_core::{CanvasConfig, TokioScheduler};
use canvas_sandbox::{
    generate_preview_document_with, is_runnable_language, parse_html_code, CodeBuffer, FrameId,
};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::protocol::ServerMessage;
use crate::session::{CanvasSession, Flow, SessionId};
use crate::{GatewayError, Result};

/// Gateway state shared across handlers
pub struct GatewayState {
    pub config: CanvasConfig,
    sessions: RwLock<HashMap<SessionId, FrameId>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GatewayState {
    pub fn new(config: CanvasConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            shutdown_tx,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

/// Body of `POST /extract`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "html".to_string()
}

/// Gateway server
pub struct GatewayServer {
    state: Arc<GatewayState>,
}

impl GatewayServer {
    pub fn new(config: CanvasConfig) -> Self {
        Self {
            state: Arc::new(GatewayState::new(config)),
        }
    }

    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", get(Self::handle_index))
            .route("/health", get(Self::handle_health))
            .route("/render", post(Self::handle_render))
            .route("/extract", post(Self::handle_extract))
            .route("/ws", get(Self::handle_ws_upgrade))
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until [`GatewayServer::shutdown`].
    pub async fn start(&self) -> Result<()> {
        let gateway = &self.state.config.gateway;
        let listener = TcpListener::bind((gateway.host.as_str(), gateway.port)).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let router = self.build_router();
        let mut shutdown_rx = self.state.shutdown_tx.subscribe();

        tracing::info!("Canvas gateway listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        tracing::info!("Canvas gateway stopped");
        Ok(())
    }

    /// Stop the server and close every open session.
    pub fn shutdown(&self) {
        let _ = self.state.shutdown_tx.send(());
        tracing::info!("Gateway shutdown initiated");
    }

    fn cors_layer(&self) -> CorsLayer {
        let allowed = &self.state.config.gateway.allowed_origins;
        if allowed.is_empty() {
            return CorsLayer::permissive();
        }

        let origins: Vec<HeaderValue> = allowed
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }

    // HTTP handlers

    async fn handle_index() -> Html<&'static str> {
        Html(include_str!("../static/index.html"))
    }

    async fn handle_health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "healthy",
            "version": crate::VERSION,
            "sessions": state.session_count(),
        }))
    }

    async fn handle_render(
        State(state): State<Arc<GatewayState>>,
        Json(code): Json<CodeBuffer>,
    ) -> Html<String> {
        let options = state.config.document_options();
        Html(generate_preview_document_with(&code, &options))
    }

    async fn handle_extract(Json(request): Json<ExtractRequest>) -> Result<Json<CodeBuffer>> {
        if !is_runnable_language(&request.language) {
            return Err(GatewayError::InvalidMessage(format!(
                "language '{}' cannot be opened in the canvas",
                request.language
            )));
        }
        Ok(Json(parse_html_code(&request.code, &request.language)))
    }

    async fn handle_ws_upgrade(
        ws: WebSocketUpgrade,
        State(state): State<Arc<GatewayState>>,
    ) -> Response {
        ws.on_upgrade(move |socket| Self::handle_ws_connection(socket, state))
    }

    async fn handle_ws_connection(socket: WebSocket, state: Arc<GatewayState>) {
        let (mut tx, mut rx) = socket.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<ServerMessage>();
        let mut shutdown_rx = state.shutdown_tx.subscribe();

        let mut session = CanvasSession::new(
            state.config.clone(),
            Arc::new(TokioScheduler::new()),
            outgoing_tx,
        );
        let session_id = session.id();
        state
            .sessions
            .write()
            .insert(session_id, session.frame().clone());

        tracing::info!("WebSocket connected: {}", session_id);

        // Forward server messages to the socket until every sender is gone.
        let outgoing = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to encode server message: {}", e);
                        continue;
                    }
                };
                if tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = tx.send(Message::Close(None)).await;
            tracing::debug!("Outgoing handler stopped for {}", session_id);
        });

        loop {
            tokio::select! {
                msg = rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if session.handle_text(&text) == Flow::Close {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            tracing::debug!("Binary message ignored: {} bytes", data.len());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("WebSocket closing: {}", session_id);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!("WebSocket error on {}: {}", session_id, e);
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Closing {} for shutdown", session_id);
                    break;
                }
            }
        }

        // Cleanup
        state.sessions.write().remove(&session_id);
        drop(session);
        let _ = outgoing.await;
        tracing::info!("WebSocket disconnected: {}", session_id);
    }
}
