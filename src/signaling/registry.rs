use std::collections::{HashMap, HashSet};

use super::types::{ConnectionId, RoomId};

/// Result of [`RoomRegistry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection was not in any room and is now a member.
    Joined,
    /// The connection was already a member of this room; nothing changed.
    AlreadyMember,
    /// The connection left `from` (removed if it became empty) and joined the new room.
    Moved { from: RoomId },
}

/// In-memory room membership.
///
/// A connection belongs to at most one room. Rooms are created on first join
/// and removed as soon as their last member leaves.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, id: ConnectionId, room: RoomId) -> JoinOutcome {
        let outcome = match self.memberships.get(&id).cloned() {
            Some(current) if current == room => return JoinOutcome::AlreadyMember,
            Some(_) => match self.leave(&id) {
                Some(from) => JoinOutcome::Moved { from },
                None => JoinOutcome::Joined,
            },
            None => JoinOutcome::Joined,
        };

        self.rooms.entry(room.clone()).or_default().insert(id);
        self.memberships.insert(id, room);
        outcome
    }

    /// Removes the connection from its room. Returns the room it left, if any.
    pub fn leave(&mut self, id: &ConnectionId) -> Option<RoomId> {
        let room = self.memberships.remove(id)?;

        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
        Some(room)
    }

    /// Fan-out targets: every member of `room` other than `id`.
    pub fn members_except(&self, room: &RoomId, id: &ConnectionId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().filter(|m| *m != id).copied().collect())
            .unwrap_or_default()
    }

    pub fn members(&self, room: &RoomId) -> Option<&HashSet<ConnectionId>> {
        self.rooms.get(room)
    }

    pub fn contains_room(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
