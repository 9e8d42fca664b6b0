use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::codes::{self, CODE_LENGTH};
use crate::messages::{JoinError, RoomSnapshot};
use crate::room::{normalize_name, Outbox, Recipient, Room};

type Rooms = RwLock<HashMap<String, Arc<Mutex<Room>>>>;

/// Outcome of a successful registration, captured under the room lock.
/// Recipients include the new member: joins are announced to everyone.
#[derive(Debug)]
pub struct Registration {
    pub member_id: Uuid,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub recipients: Vec<Recipient>,
}

/// An accepted message plus its fan-out targets (everyone but the sender).
pub struct Relay {
    pub sender_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub recipients: Vec<Recipient>,
}

/// Outcome of removing a member: the remaining members to notify, and
/// whether the room was torn down because the leaver was the last one.
pub struct Departure {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub recipients: Vec<Recipient>,
    pub room_deleted: bool,
}

/// The authoritative table of live rooms. All room access goes through here;
/// the map itself is never handed out.
///
/// Lock order is always registry map before room. `register` and
/// `append_message` hold the map read lock across the room mutation, so
/// `deregister` (write lock) can never tear a room down mid-join.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Rooms,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh unique code and inserts an empty room under it.
    /// The collision check and the insert happen under one write lock, so two
    /// concurrent creates cannot race into the same code.
    pub async fn create_room(&self) -> String {
        let mut rooms = self.rooms.write().await;
        let code = loop {
            let candidate = codes::random_code(CODE_LENGTH);
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        rooms.insert(code.clone(), Arc::new(Mutex::new(Room::new(code.clone()))));
        code
    }

    pub async fn room_exists(&self, code: &str) -> bool {
        self.rooms.read().await.contains_key(code)
    }

    /// Validation probe: `None` if the room does not exist, otherwise whether
    /// the normalized name is still free. Advisory only; `register` re-checks.
    pub async fn name_available(&self, code: &str, normalized: &str) -> Option<bool> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(code)?;
        let available = !room.lock().await.has_member_named(normalized);
        Some(available)
    }

    /// Adds a member to a room at connection time. The name-uniqueness check
    /// runs again here, under the room lock, because the membership may have
    /// changed since validation; a raced duplicate is rejected late.
    pub async fn register(
        &self,
        code: &str,
        name: &str,
        outbox: Outbox,
    ) -> Result<Registration, JoinError> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(code).ok_or(JoinError::RoomNotFound)?;
        let mut room = room.lock().await;

        let name = normalize_name(name);
        if name.is_empty() {
            return Err(JoinError::MissingName);
        }
        if room.has_member_named(&name) {
            return Err(JoinError::NameTaken);
        }

        let member = room.add_member(name, outbox);
        let (member_id, name) = (member.id, member.name.clone());
        Ok(Registration {
            member_id,
            name,
            timestamp: Utc::now(),
            recipients: room.recipients(),
        })
    }

    /// Appends a message to the room's log and returns the relay targets.
    /// A vanished room or sender means a stale event: dropped silently,
    /// nothing is broadcast.
    pub async fn append_message(
        &self,
        code: &str,
        sender_id: Uuid,
        raw_text: &str,
    ) -> Option<Relay> {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(code) else {
            debug!("message for unknown room {code} dropped");
            return None;
        };
        let mut room = room.lock().await;
        let Some(message) = room.append_message(sender_id, raw_text) else {
            debug!("message from departed sender in room {code} dropped");
            return None;
        };
        let (sender_name, message, timestamp) = (
            message.sender_name.clone(),
            message.message.clone(),
            message.timestamp,
        );
        Some(Relay {
            sender_name,
            message,
            timestamp,
            recipients: room.recipients_except(sender_id),
        })
    }

    /// Removes a member; when the member set drops to zero the room and its
    /// whole message log are torn down in the same critical section. `None`
    /// when the room or member is already gone (double disconnect).
    pub async fn deregister(&self, code: &str, member_id: Uuid) -> Option<Departure> {
        let mut rooms = self.rooms.write().await;
        let room_arc = Arc::clone(rooms.get(code)?);
        let mut room = room_arc.lock().await;

        let member = room.remove_member(member_id)?;
        let recipients = room.recipients();
        let remaining = room.member_count();
        drop(room);

        let room_deleted = remaining == 0;
        if room_deleted {
            // Only ever reached with an empty member set; a non-empty room
            // here would mean the lock discipline above is broken.
            let removed = rooms.remove(code);
            assert!(removed.is_some(), "tore down a room missing from the registry");
        }

        Some(Departure {
            name: member.name,
            timestamp: Utc::now(),
            recipients,
            room_deleted,
        })
    }

    pub async fn snapshot(&self, code: &str) -> Option<RoomSnapshot> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(code)?;
        let snapshot = room.lock().await.snapshot();
        Some(snapshot)
    }

    pub async fn live_room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
