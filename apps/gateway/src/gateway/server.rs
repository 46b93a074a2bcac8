//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clover_common::id::{prefix, prefixed_ulid};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time;

use crate::auth::credential::Credentials;
use crate::config::HANDSHAKE_TIMEOUT;
use crate::AppState;

use super::connection::Connection;
use super::events::{ClientEvent, Frame, HandshakeFrame, ServerEvent, OUTBOUND_CAPACITY};
use super::session::Gateway;

/// Close codes (4000-range for application-level).
const CLOSE_PROTOCOL_ERROR: u16 = 4000;
const CLOSE_HANDSHAKE_TIMEOUT: u16 = 4009;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    #[serde(default)]
    pub token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let credentials = Credentials::from_request(query.token, &headers);
    ws.on_upgrade(move |socket| handle_connection(socket, state.gateway, credentials))
}

async fn handle_connection(socket: WebSocket, gateway: Arc<Gateway>, credentials: Credentials) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let conn = gateway.open(prefixed_ulid(prefix::CONNECTION));
    let guard = DisconnectGuard::new(gateway.clone(), conn.clone());

    // Step 1: wait for the handshake frame.
    let auth_field = match time::timeout(HANDSHAKE_TIMEOUT, read_handshake(&mut ws_rx)).await {
        Ok(Ok(frame)) => frame.data.auth.token,
        Ok(Err(reason)) => {
            tracing::debug!(connection_id = %conn.id, %reason, "handshake failed");
            let _ = send_close(&mut ws_tx, CLOSE_PROTOCOL_ERROR, reason).await;
            guard.finish().await;
            return;
        }
        Err(_timeout) => {
            let _ = send_close(&mut ws_tx, CLOSE_HANDSHAKE_TIMEOUT, "Handshake timeout").await;
            guard.finish().await;
            return;
        }
    };

    // Step 2: verify the credential before anything is registered.
    let credentials = credentials.with_auth_field(auth_field);
    if let Err(e) = gateway.authenticate(&conn, &credentials) {
        let message = e.to_string();
        let _ = send_frame(&mut ws_tx, &ServerEvent::Error { message: message.clone() }.to_frame()).await;
        let _ = send_close(&mut ws_tx, e.close_code(), &message).await;
        guard.finish().await;
        return;
    }

    // Step 3: go active and pump events until the socket closes.
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    if let Err(e) = gateway.activate(&conn, outbound_tx) {
        tracing::error!(connection_id = %conn.id, %e, "activation failed");
        let _ = send_close(&mut ws_tx, CLOSE_PROTOCOL_ERROR, "Activation failed").await;
        guard.finish().await;
        return;
    }

    run_connection(&gateway, &conn, ws_tx, ws_rx, outbound_rx).await;
    guard.finish().await;
}

/// Read frames until the first text frame, which must be the handshake.
async fn read_handshake(ws_rx: &mut WsStream) -> Result<HandshakeFrame, &'static str> {
    while let Some(msg) = ws_rx.next().await {
        let msg = msg.map_err(|e| {
            tracing::debug!(?e, "ws read error during handshake");
            "read error"
        })?;

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => return Err("client closed"),
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        let frame: HandshakeFrame = serde_json::from_str(&text).map_err(|_| "Invalid JSON")?;
        if frame.event != "handshake" {
            return Err("Expected handshake");
        }
        return Ok(frame);
    }
    Err("connection closed before handshake")
}

/// Main loop: dispatch client events in arrival order, forward queued frames.
async fn run_connection(
    gateway: &Gateway,
    conn: &Connection,
    mut ws_tx: WsSink,
    mut ws_rx: WsStream,
    mut outbound_rx: mpsc::Receiver<Frame>,
) {
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => gateway.dispatch(conn, event).await,
                            Err(e) => {
                                tracing::debug!(connection_id = %conn.id, %e, "unrecognized client event");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %conn.id, "ws read error");
                        break;
                    }
                }
            }

            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if send_frame(&mut ws_tx, &frame).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Runs `Gateway::disconnect` exactly once for a connection: explicitly via
/// `finish`, or from `Drop` if the connection task is cancelled first.
struct DisconnectGuard {
    gateway: Arc<Gateway>,
    conn: Arc<Connection>,
    armed: bool,
}

impl DisconnectGuard {
    fn new(gateway: Arc<Gateway>, conn: Arc<Connection>) -> Self {
        Self {
            gateway,
            conn,
            armed: true,
        }
    }

    async fn finish(mut self) {
        self.armed = false;
        self.gateway.disconnect(&self.conn).await;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let gateway = self.gateway.clone();
        let conn = self.conn.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    gateway.disconnect(&conn).await;
                });
            }
            Err(_) => {
                tracing::error!(connection_id = %conn.id, "no runtime to run teardown on");
            }
        }
    }
}

async fn send_frame(ws_tx: &mut WsSink, frame: &Frame) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(frame.to_string().into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
