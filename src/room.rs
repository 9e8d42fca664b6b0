use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws;

use crate::messages::{MessageView, RoomSnapshot};

/// Server-side cap on message content, applied after trimming.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Per-connection outbound channel. Unbounded so a slow reader never stalls
/// the room's mutation path; the writer task drains it into the socket.
pub type Outbox = mpsc::UnboundedSender<ws::Message>;

/// Display names are compared and stored uppercased and trimmed.
pub fn normalize_name(input: &str) -> String {
    input.trim().to_uppercase()
}

pub struct Member {
    pub id: Uuid,
    pub room_code: String,
    pub name: String,
    outbox: Outbox,
}

/// Immutable once created; a denormalized snapshot of the sender's identity
/// so the record stays valid after the sender leaves.
pub struct Message {
    pub id: Uuid,
    pub room_code: String,
    pub message: String,
    pub sender_name: String,
    pub sender_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Delivery target captured under the room lock. Cloning the outbox keeps the
/// target valid even if the member is removed before fan-out runs.
#[derive(Clone, Debug)]
pub struct Recipient {
    pub member_id: Uuid,
    outbox: Outbox,
}

impl Recipient {
    pub fn deliver(&self, msg: ws::Message) {
        // Fire-and-forget: a closed outbox means the connection is already
        // gone, which is not this room's problem.
        let _ = self.outbox.send(msg);
    }
}

pub struct Room {
    pub code: String,
    members: HashMap<Uuid, Member>,
    messages: Vec<Message>,
}

impl Room {
    pub fn new(code: String) -> Self {
        Room {
            code,
            members: HashMap::new(),
            messages: Vec::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member_named(&self, normalized: &str) -> bool {
        self.members.values().any(|m| m.name == normalized)
    }

    /// Callers must hold the room lock and have re-checked name uniqueness.
    pub fn add_member(&mut self, name: String, outbox: Outbox) -> &Member {
        debug_assert!(!self.has_member_named(&name));
        let id = Uuid::new_v4();
        let member = Member {
            id,
            room_code: self.code.clone(),
            name,
            outbox,
        };
        self.members.entry(id).or_insert(member)
    }

    pub fn remove_member(&mut self, member_id: Uuid) -> Option<Member> {
        self.members.remove(&member_id)
    }

    /// Trims and caps the content, stamps it with the server clock, and
    /// appends it to the room's log. `None` when the sender is no longer a
    /// member (stale event, dropped silently by the caller).
    pub fn append_message(&mut self, sender_id: Uuid, raw_text: &str) -> Option<&Message> {
        let sender = self.members.get(&sender_id)?;
        let content: String = raw_text.trim().chars().take(MAX_MESSAGE_LENGTH).collect();
        let message = Message {
            id: Uuid::new_v4(),
            room_code: self.code.clone(),
            message: content,
            sender_name: sender.name.clone(),
            sender_id: sender.id,
            timestamp: Utc::now(),
        };
        self.messages.push(message);
        self.messages.last()
    }

    /// All current members, for join/leave announcements.
    pub fn recipients(&self) -> Vec<Recipient> {
        self.members
            .values()
            .map(|m| Recipient {
                member_id: m.id,
                outbox: m.outbox.clone(),
            })
            .collect()
    }

    /// All current members except one, for relaying a message past its sender.
    pub fn recipients_except(&self, excluded: Uuid) -> Vec<Recipient> {
        self.members
            .values()
            .filter(|m| m.id != excluded)
            .map(|m| Recipient {
                member_id: m.id,
                outbox: m.outbox.clone(),
            })
            .collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            members: self.members.values().map(|m| m.name.clone()).collect(),
            messages: self
                .messages
                .iter()
                .map(|m| MessageView {
                    name: m.sender_name.clone(),
                    message: m.message.clone(),
                    timestamp: m.timestamp,
                })
                .collect(),
        }
    }
}
