use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::registry::{JoinOutcome, RoomRegistry};
use super::types::{ConnectionId, OutboundMessage, RelayError, RoomId};

/// Commands sent to the room manager actor
pub(crate) enum RoomCommand {
    Register {
        peer_tx: mpsc::UnboundedSender<OutboundMessage>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Join {
        id: ConnectionId,
        room: RoomId,
    },
    Relay {
        id: ConnectionId,
        room: RoomId,
        message: OutboundMessage,
        reply: oneshot::Sender<usize>,
    },
    Disconnect {
        id: ConnectionId,
    },
    Members {
        room: RoomId,
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
}

pub(crate) async fn room_manager_actor(mut rx: mpsc::Receiver<RoomCommand>) {
    let mut registry = RoomRegistry::new();
    let mut outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<OutboundMessage>> =
        HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Register { peer_tx, reply } => {
                let mut id = ConnectionId::generate();
                while outboxes.contains_key(&id) {
                    id = ConnectionId::generate();
                }
                outboxes.insert(id, peer_tx);

                debug!("Connection {} registered", id);
                let _ = reply.send(id);
            }

            RoomCommand::Join { id, room } => match registry.join(id, room.clone()) {
                JoinOutcome::Joined => info!("Connection {} joined room {}", id, room),
                JoinOutcome::AlreadyMember => {
                    debug!("Connection {} already in room {}", id, room)
                }
                JoinOutcome::Moved { from } => {
                    if !registry.contains_room(&from) {
                        info!(
                            "Room {} removed (empty), {} room(s) active",
                            from,
                            registry.room_count()
                        );
                    }
                    info!("Connection {} moved from room {} to {}", id, from, room);
                }
            },

            RoomCommand::Relay {
                id,
                room,
                message,
                reply,
            } => {
                let mut delivered = 0;
                for member in registry.members_except(&room, &id) {
                    let sent = outboxes
                        .get(&member)
                        .is_some_and(|tx| tx.send(message.clone()).is_ok());
                    if sent {
                        delivered += 1;
                    }
                }

                debug!(
                    "Relayed message from {} to {} member(s) of room {}",
                    id, delivered, room
                );
                let _ = reply.send(delivered);
            }

            RoomCommand::Disconnect { id } => {
                outboxes.remove(&id);
                if let Some(room) = registry.leave(&id) {
                    if !registry.contains_room(&room) {
                        info!(
                            "Room {} removed (empty), {} room(s) active",
                            room,
                            registry.room_count()
                        );
                    }
                    info!("Connection {} left room {}", id, room);
                }
            }

            RoomCommand::Members { room, reply } => {
                let members = registry
                    .members(&room)
                    .map(|m| m.iter().copied().collect())
                    .unwrap_or_default();
                let _ = reply.send(members);
            }
        }
    }
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    pub(crate) tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    /// Spawn a fresh actor with its own registry on the current runtime
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<RoomCommand>(1024);
        tokio::spawn(room_manager_actor(rx));
        Self { tx }
    }

    /// Register a connection's outbox and obtain its identity
    pub async fn register(
        &self,
        peer_tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<ConnectionId, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Register {
            peer_tx,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RelayError::ActorClosed)
    }

    pub async fn join(&self, id: ConnectionId, room: RoomId) -> Result<(), RelayError> {
        self.send(RoomCommand::Join { id, room }).await
    }

    /// Forward `message` to every member of `room` except `id`.
    /// Returns the number of connections it was handed to.
    pub async fn relay(
        &self,
        id: ConnectionId,
        room: RoomId,
        message: OutboundMessage,
    ) -> Result<usize, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Relay {
            id,
            room,
            message,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RelayError::ActorClosed)
    }

    /// Leave the current room (if any) and drop the connection's outbox
    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.send(RoomCommand::Disconnect { id }).await
    }

    /// Current members of `room`; empty if the room does not exist
    pub async fn members(&self, room: RoomId) -> Result<Vec<ConnectionId>, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Members {
            room,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RelayError::ActorClosed)
    }

    /// Guard that disconnects `id` when dropped
    pub fn membership_guard(&self, id: ConnectionId) -> MembershipGuard {
        MembershipGuard {
            handle: self.clone(),
            id,
        }
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RelayError> {
        self.tx.send(cmd).await.map_err(|_| RelayError::ActorClosed)
    }
}

/// Disconnects a connection from the room manager on drop.
///
/// Held by the connection task so cleanup also runs on early returns and panics.
pub struct MembershipGuard {
    handle: RoomManagerHandle,
    id: ConnectionId,
}

impl Drop for MembershipGuard {
    fn drop(&mut self) {
        let cmd = RoomCommand::Disconnect { id: self.id };
        if let Err(TrySendError::Full(cmd)) = self.handle.tx.try_send(cmd) {
            // queue is full: hand the command to a task instead of blocking drop
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let tx = self.handle.tx.clone();
                runtime.spawn(async move {
                    let _ = tx.send(cmd).await;
                });
            }
        }
    }
}
