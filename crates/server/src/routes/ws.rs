//! WebSocket stream for bidders and observers.
//!
//! # Endpoint
//!
//! - `GET /ws?bidder=CSK&token=...` - bidder connection
//! - `GET /ws?admin_token=...` - observer connection (no bids)
//!
//! # Protocol
//!
//! A connection is admitted only with valid credentials. It first receives
//! the current snapshot, then every broadcast event. Bidders may send
//! `{"type":"bid","amount":2.2}`; the `bid_result` reply goes to that
//! connection only.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use types::{Amount, BidderId};

use crate::bridge::{BidResult, ClientMessage, ServerEvent};
use crate::error::{AppError, AppResult};
use crate::state::ServerState;

/// Credentials carried in the upgrade query string.
#[derive(Debug, Default, Deserialize)]
pub struct WsAuth {
    pub bidder: Option<String>,
    pub token: Option<String>,
    pub admin_token: Option<String>,
}

/// Who is on the other end of a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Bidder { id: BidderId, token: String },
    Observer,
}

/// Decide whether a connection may be admitted.
pub async fn authorize(state: &ServerState, auth: &WsAuth) -> AppResult<Role> {
    if let (Some(bidder), Some(token)) = (&auth.bidder, &auth.token) {
        let id = BidderId::new(bidder.as_str());
        if state.check_session(&id, token).await {
            return Ok(Role::Bidder {
                id,
                token: token.clone(),
            });
        }
        return Err(AppError::Unauthorized("invalid session".into()));
    }

    match (&state.admin_token, &auth.admin_token) {
        (Some(_), Some(given)) if state.is_admin(Some(given)) => Ok(Role::Observer),
        _ => Err(AppError::Unauthorized("credentials required".into())),
    }
}

/// WebSocket upgrade handler: `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(auth): Query<WsAuth>,
    State(state): State<ServerState>,
) -> AppResult<Response> {
    let role = authorize(&state, &auth).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, role)))
}

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

/// Handle an admitted WebSocket connection.
async fn handle_socket(socket: WebSocket, state: ServerState, role: Role) {
    state.metrics.ws_connect();
    match &role {
        Role::Bidder { id, .. } => info!(bidder = %id, "WebSocket bidder connected"),
        Role::Observer => info!("WebSocket observer connected"),
    }

    let (mut sender, mut receiver) = socket.split();

    // Every broadcast snapshot after this one is at least as new
    let (mut events_rx, initial) = state
        .engine
        .subscribe_with_snapshot(|| state.subscribe_events())
        .await;
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerEvent>(16);

    match initial {
        Ok(snapshot) => {
            if let Some(msg) = encode(&ServerEvent::Snapshot(snapshot)) {
                if sender.send(msg).await.is_err() {
                    state.metrics.ws_disconnect();
                    return;
                }
            }
        }
        Err(e) => warn!(error = %e, "initial snapshot unavailable"),
    }

    // Forward broadcasts and this connection's replies to the client
    let send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                received = events_rx.recv() => match received {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("WebSocket client lagged by {} messages", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Some(msg) = encode(&event) {
                if sender.send(msg).await.is_err() {
                    break; // Client disconnected
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Bid { amount }) => {
                            handle_bid(&recv_state, &role, amount).await
                        }
                        Err(e) => {
                            debug!("Invalid message from client: {}", text);
                            ServerEvent::Error {
                                message: format!("invalid message: {e}"),
                            }
                        }
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {} // Ignore ping/pong/binary
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.metrics.ws_disconnect();
    debug!("WebSocket client disconnected");
}

/// Place a bid on behalf of a socket and build the reply.
///
/// The session is re-checked per bid, so a connection whose session was
/// replaced stops being able to bid.
pub(crate) async fn handle_bid(state: &ServerState, role: &Role, amount: f64) -> ServerEvent {
    let Role::Bidder { id, token } = role else {
        return ServerEvent::Error {
            message: "observers cannot bid".into(),
        };
    };
    if !state.check_session(id, token).await {
        return ServerEvent::BidResult(BidResult::rejected("session is no longer valid", false));
    }

    let result = state.engine.place_bid(id, Amount::from_float(amount)).await;
    state.metrics.record_bid(result.is_ok());
    ServerEvent::BidResult(BidResult::from(&result))
}
