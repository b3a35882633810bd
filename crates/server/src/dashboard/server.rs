//! axum web server for the live dashboard.
//!
//! `/` returns the current status document as JSON; `/ws` pushes the same
//! document to connected browsers every second.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;

use super::{status, StatusDocument};
use crate::server::Server;

const PUSH_INTERVAL: Duration = Duration::from_secs(1);

pub fn router(server: Arc<Server>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_upgrade))
        .with_state(server)
}

/// Start the dashboard web server. Runs until the listener fails.
pub async fn start(server: Arc<Server>, port: u16) {
    let addr = format!("0.0.0.0:{}", port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Dashboard failed to bind to {}: {}", addr, e);
            return;
        }
    };
    tracing::info!("Dashboard listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, router(server)).await {
        tracing::error!("Dashboard server error: {}", e);
    }
}

async fn index(State(server): State<Arc<Server>>) -> Json<StatusDocument> {
    Json(status(&server))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(server): State<Arc<Server>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

async fn handle_socket(mut socket: WebSocket, server: Arc<Server>) {
    let mut ticker = tokio::time::interval(PUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let msg = serde_json::json!({
                    "type": "status",
                    "data": status(&server),
                });
                if send_json(&mut socket, &msg).await.is_err() {
                    break;
                }
            }

            // Drain any incoming messages (ping/pong, close).
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> Result<(), ()> {
    let text = value.to_string();
    socket.send(Message::Text(text.into())).await.map_err(|_| ())
}
