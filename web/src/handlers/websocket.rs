//! Real-time bell stream over WebSocket.
//!
//! # Protocol
//!
//! ```text
//! Client                    Handler                    RealtimeHub / Feed
//!   │                          │                             │
//!   ├─ GET /ws/notifications ─>│                             │
//!   │                          ├─ connect(user) ────────────>│
//!   │                          ├─ list_bells(user) ─────────>│
//!   │<─ snapshot ──────────────┤                             │
//!   │                          │<──────────────── push ──────┤
//!   │<─ notification_added ────┤                             │
//! ```
//!
//! The first frame is a snapshot of the user's bells:
//!
//! ```json
//! {"type":"snapshot","seq":41,"items":[...],"unread_count":3}
//! ```
//!
//! Every later frame is one hub push, carrying the next hub sequence number:
//!
//! ```json
//! {"seq":42,"type":"notification_added","bell":{...}}
//! {"seq":43,"type":"notification_read","bell_id":"..."}
//! {"seq":44,"type":"notification_removed","bell_id":"..."}
//! {"seq":45,"type":"all_read"}
//! ```
//!
//! The connection is registered before the snapshot is read, so no change is
//! lost in between; pushes numbered above the snapshot's `seq` may already be
//! reflected in it and apply idempotently by bell id. When the hub drops a
//! lagging connection the server closes the socket, and the client
//! reconnects to get a fresh snapshot.

use crate::extractors::CurrentActor;
use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Serialize;
use signup_core::types::UserId;
use signup_notifications::{BellList, FeedService};
use tracing::{debug, error, info, warn};

/// Frames the server sends besides hub pushes.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Current bells, sent once on connect
    Snapshot {
        /// Last sequence number assigned before the snapshot was read
        seq: u64,
        /// Bells and unread count
        #[serde(flatten)]
        bells: BellList,
    },
    /// The stream cannot continue
    Error {
        /// Error description
        message: String,
    },
}

/// `GET /ws/notifications`: stream the caller's bell changes.
///
/// Requires an authenticated actor (401 otherwise).
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn notifications(
    actor: CurrentActor,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = actor.id;
    info!(user_id = %user_id, "Notification stream requested");
    ws.on_upgrade(move |socket| stream_notifications(socket, state.feed, user_id))
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &T,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            error!(error = %e, "Failed to serialize frame");
            Ok(())
        }
    }
}

async fn stream_notifications(socket: WebSocket, feed: FeedService, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = feed.hub().connect(user_id);
    let seq = feed.hub().current_seq();
    let snapshot = match feed.list_bells(user_id).await {
        Ok(bells) => ServerFrame::Snapshot { seq, bells },
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to load bell snapshot");
            let frame = ServerFrame::Error {
                message: "Notifications are temporarily unavailable".to_string(),
            };
            let _ = send_json(&mut sender, &frame).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    if send_json(&mut sender, &snapshot).await.is_err() {
        return;
    }
    info!(user_id = %user_id, seq, "Notification stream established");

    let mut send_task = tokio::spawn(async move {
        while let Some(push) = subscription.recv().await {
            if send_json(&mut sender, &push).await.is_err() {
                debug!("Client went away");
                return;
            }
        }
        // The hub dropped this connection; the client resynchronizes on reconnect.
        warn!("Notification stream dropped by the hub");
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Text(_) | Message::Binary(_) => {
                    debug!("Ignoring client message on notification stream");
                }
                // Axum answers pings
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!(user_id = %user_id, "Notification stream closed");
}
