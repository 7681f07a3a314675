//! The WebSocket control-channel endpoint.
//!
//! One task per connection: the reader loop feeds the dispatcher in arrival
//! order while a writer task drains the channel's outbound queue, so every
//! channel has exactly one in-flight socket write and no registry lock is
//! ever held across one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{dispatch, AppState};
use crate::registry::{ControlChannel, Outbound};

pub async fn channel_ws(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_channel(state, socket))
}

async fn handle_channel(state: Arc<AppState>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(64);

    let channel = ControlChannel::new(state.channels.next_id(), tx);
    state.channels.insert(channel.clone()).await;

    info!(channel_id = channel.id, "Control channel connected");

    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Frame(text) => {
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => dispatch::handle_frame(&state, &channel, &text).await,
            Message::Close(_) => break,
            // Pings are answered by the transport layer.
            _ => {}
        }
    }

    teardown_channel(&state, &channel).await;

    channel.close().await;
    let _ = writer.await;
}

/// Cleanup when a channel closes, whether by the peer or the stale sweep.
///
/// A machine channel transitions its machine offline and notifies the
/// owner's other channels. The routing entry is removed only if it still
/// points at this channel, so a re-registered machine is unaffected by its
/// predecessor closing. Pending connections this channel originated are
/// deliberately left to expire via the decision timeout.
pub(crate) async fn teardown_channel(state: &Arc<AppState>, channel: &Arc<ControlChannel>) {
    state.channels.remove(channel.id).await;

    if let Some(machine_id) = channel.machine_id() {
        if let Err(e) = state.machines.set_online(&machine_id, false).await {
            warn!(machine_id = %machine_id, error = %e, "Failed to mark machine offline");
        }
        state
            .channels
            .remove_machine_if(&machine_id, channel.id)
            .await;
        state
            .presence
            .broadcast(&machine_id, false, Some(channel.id))
            .await;
    }

    if let Some(web_id) = channel.web_client_id() {
        state.channels.remove_web(&web_id).await;
    }

    info!(channel_id = channel.id, "Control channel disconnected");
}
