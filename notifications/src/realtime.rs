//! Real-time hub: per-user push of bell changes to connected clients.
//!
//! # Delivery model
//!
//! - Every user has any number of connections, each with a bounded queue.
//!   The hub keeps an entry only for users that are connected right now; a
//!   push to an offline user is discarded.
//! - Every delivered push carries the next value of one hub-wide sequence
//!   number, so a user's pushes are strictly increasing across connections.
//!   Pushes are enqueued on all of the user's connections while the hub lock
//!   is held, so each connection sees them in production order.
//! - A connection whose queue is full is dropped. Its client reconnects and
//!   resynchronizes from the feed store: pushes are a latency optimization,
//!   never the source of truth, and are not replayed.

use crate::feed::BellView;
use crate::metrics;
use serde::Serialize;
use signup_core::types::{BellId, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Default per-connection queue size.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// A change to a user's bells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A bell was created
    NotificationAdded {
        /// The new bell
        bell: BellView,
    },
    /// One bell was marked read
    NotificationRead {
        /// The bell that was read
        bell_id: BellId,
    },
    /// One bell was deleted
    NotificationRemoved {
        /// The deleted bell
        bell_id: BellId,
    },
    /// Every bell of the user was marked read
    AllRead,
}

/// One event as delivered to a connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Push {
    /// Hub-wide sequence number; strictly increasing for each user
    pub seq: u64,
    /// The change
    #[serde(flatten)]
    pub event: RealtimeEvent,
}

struct Connection {
    id: u64,
    sender: mpsc::Sender<Push>,
}

#[derive(Default)]
struct HubState {
    last_seq: u64,
    users: HashMap<UserId, Vec<Connection>>,
}

/// Registry of live connections.
pub struct RealtimeHub {
    state: Mutex<HubState>,
    buffer: usize,
    next_connection: AtomicU64,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTION_BUFFER)
    }
}

impl RealtimeHub {
    /// Create a hub whose connections queue at most `buffer` pushes.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            buffer: buffer.max(1),
            next_connection: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a connection for `user_id`.
    ///
    /// The connection is closed when the returned [`Subscription`] is dropped.
    #[must_use]
    pub fn connect(self: &Arc<Self>, user_id: UserId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let connection_id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        self.state()
            .users
            .entry(user_id)
            .or_default()
            .push(Connection {
                id: connection_id,
                sender,
            });
        tracing::debug!(user_id = %user_id, connection_id, "Real-time connection opened");

        Subscription {
            hub: Arc::clone(self),
            user_id,
            connection_id,
            receiver,
        }
    }

    fn disconnect(&self, user_id: UserId, connection_id: u64) {
        let mut state = self.state();
        if let Some(connections) = state.users.get_mut(&user_id) {
            connections.retain(|c| c.id != connection_id);
            if connections.is_empty() {
                state.users.remove(&user_id);
            }
        }
        tracing::debug!(user_id = %user_id, connection_id, "Real-time connection closed");
    }

    /// Push an event to every connection of `user_id`.
    ///
    /// Returns how many connections accepted it. Connections that are full or
    /// closed are dropped. A user without connections consumes no sequence
    /// number.
    pub fn push(&self, user_id: UserId, event: RealtimeEvent) -> usize {
        let mut state = self.state();
        let state = &mut *state;
        let Some(connections) = state.users.get_mut(&user_id) else {
            return 0;
        };
        state.last_seq += 1;
        let push = Push {
            seq: state.last_seq,
            event,
        };

        let mut delivered = 0;
        connections.retain(|connection| {
            match connection.sender.try_send(push.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        user_id = %user_id,
                        connection_id = connection.id,
                        "Real-time connection lagging, dropped"
                    );
                    metrics::record_realtime_drop();
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        if connections.is_empty() {
            state.users.remove(&user_id);
        }
        delivered
    }

    /// Last sequence number assigned (0 before the first push).
    ///
    /// Every push produced after this call carries a larger number.
    #[must_use]
    pub fn current_seq(&self) -> u64 {
        self.state().last_seq
    }

    /// Number of open connections of `user_id`.
    #[must_use]
    pub fn connection_count(&self, user_id: UserId) -> usize {
        self.state().users.get(&user_id).map_or(0, Vec::len)
    }

    /// Number of users with at least one open connection.
    #[must_use]
    pub fn connected_users(&self) -> usize {
        self.state().users.len()
    }
}

/// A live connection of one user.
pub struct Subscription {
    hub: Arc<RealtimeHub>,
    user_id: UserId,
    connection_id: u64,
    receiver: mpsc::Receiver<Push>,
}

impl Subscription {
    /// Owner of the connection
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Wait for the next push. `None` once the hub dropped the connection.
    pub async fn recv(&mut self) -> Option<Push> {
        self.receiver.recv().await
    }

    /// Next queued push, if any.
    pub fn try_recv(&mut self) -> Option<Push> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.disconnect(self.user_id, self.connection_id);
    }
}
