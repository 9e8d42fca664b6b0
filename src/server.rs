use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::WebSocket;

use crate::broadcast;
use crate::messages::{ClientEvent, JoinError, RoomSnapshot};
use crate::registry::RoomRegistry;
use crate::room::normalize_name;
use crate::session::{SessionContext, SessionStore};

/// Fields of the pre-connection join/create request.
#[derive(Debug, Deserialize)]
pub struct JoinForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub join: bool,
    #[serde(default)]
    pub create: bool,
}

/// Successful validation: the room to enter plus the ticket the WebSocket
/// connection must present to claim the identity.
#[derive(Debug)]
pub struct JoinGrant {
    pub room_code: String,
    pub ticket: Uuid,
}

#[derive(Clone)]
pub struct Server {
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionStore>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Server {
            registry: Arc::new(RoomRegistry::new()),
            sessions: Arc::new(SessionStore::new()),
        }
    }

    /// Request/response half of joining: checks the form, resolves or creates
    /// the room, and binds `(room_code, name)` to a fresh ticket. Rejections
    /// mutate nothing. The name check here is a courtesy fast path; the
    /// authoritative check happens again at registration.
    pub async fn validate_join(&self, form: &JoinForm) -> Result<JoinGrant, JoinError> {
        let name = normalize_name(&form.name);
        if name.is_empty() {
            return Err(JoinError::MissingName);
        }
        // exactly one intent, no precedence guessing
        if form.join == form.create {
            return Err(JoinError::MissingIntent);
        }

        let room_code = if form.join {
            let code = form.code.trim().to_uppercase();
            if code.is_empty() {
                return Err(JoinError::MissingCode);
            }
            match self.registry.name_available(&code, &name).await {
                None => return Err(JoinError::RoomNotFound),
                Some(false) => return Err(JoinError::NameTaken),
                Some(true) => code,
            }
        } else {
            self.registry.create_room().await
        };

        let ticket = self
            .sessions
            .issue(SessionContext {
                room_code: room_code.clone(),
                name,
            })
            .await;
        Ok(JoinGrant { room_code, ticket })
    }

    pub async fn room_snapshot(&self, code: &str) -> Option<RoomSnapshot> {
        self.registry.snapshot(code.trim().to_uppercase().as_str()).await
    }

    /// Full lifecycle of one WebSocket connection: claim the ticket, register
    /// into the room, announce the join, relay messages until the stream
    /// ends, then deregister and announce the leave (tearing the room down if
    /// this was the last member).
    pub async fn handle_connection(&self, ws: WebSocket, ticket: Uuid) {
        // Claiming consumes the ticket: one validated join admits one
        // connection, and a stale or replayed ticket is silently closed.
        let Some(context) = self.sessions.claim(ticket).await else {
            debug!("connection presented an unknown ticket, closing");
            return;
        };

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (outbox, mut inbox) = mpsc::unbounded_channel();

        // Writer task: drains the outbox into the socket so broadcasts never
        // wait on this connection.
        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                if ws_tx.send(message).await.is_err() {
                    break;
                }
            }
        });

        let registration = match self
            .registry
            .register(&context.room_code, &context.name, outbox)
            .await
        {
            Ok(registration) => registration,
            Err(err) => {
                // Validated earlier but rejected now: the room vanished or the
                // name was raced away in the meantime.
                warn!(
                    "registration of {} in room {} rejected: {err}",
                    context.name, context.room_code
                );
                return;
            }
        };
        info!("{} joined room {}", registration.name, context.room_code);
        broadcast::announce_join(&registration);

        let member_id = registration.member_id;
        while let Some(result) = ws_rx.next().await {
            let message = match result {
                Ok(message) => message,
                Err(err) => {
                    debug!("websocket error in room {}: {err}", context.room_code);
                    break;
                }
            };
            let Ok(text) = message.to_str() else {
                continue;
            };
            let Ok(event) = serde_json::from_str::<ClientEvent>(text) else {
                continue;
            };

            let ClientEvent::MessageSent { message } = event;
            match self
                .registry
                .append_message(&context.room_code, member_id, &message)
                .await
            {
                Some(relay) => broadcast::relay_message(&relay),
                None => debug!(
                    "dropped message for stale room {} from {}",
                    context.room_code, context.name
                ),
            }
        }

        if let Some(departure) = self.registry.deregister(&context.room_code, member_id).await {
            broadcast::announce_leave(&departure);
            info!("{} left room {}", departure.name, context.room_code);
            if departure.room_deleted {
                info!("room {} torn down", context.room_code);
            }
        }
    }
}
