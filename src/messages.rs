use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Events a client sends over the WebSocket.
#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "messageSent")]
    MessageSent { message: String },
}

/// Events the server fans out to a room.
///
/// Timestamps serialize as RFC 3339 UTC strings at the wire boundary.
#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "userConnected")]
    UserConnected {
        id: Uuid,
        name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "messageReceived")]
    MessageReceived {
        name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "userDisconnected")]
    UserDisconnected {
        name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Rejections for a join/create attempt. These surface to the requesting user
/// and mutate no state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("Name is required")]
    MissingName,
    #[error("Code is required")]
    MissingCode,
    #[error("Room does not exist")]
    RoomNotFound,
    #[error("Name already exists in room")]
    NameTaken,
    #[error("Choose exactly one of join or create")]
    MissingIntent,
}

/// Point-in-time view of a room for the `GET /rooms/:code` endpoint.
#[derive(Serialize, Deserialize, Clone)]
pub struct RoomSnapshot {
    pub code: String,
    pub members: Vec<String>,
    pub messages: Vec<MessageView>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct MessageView {
    pub name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
