use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

/// The identity a validated join request binds to an upcoming connection.
/// Populated once at validation time and passed by value into the handlers
/// afterwards; nothing downstream does hidden session lookups.
#[derive(Clone)]
pub struct SessionContext {
    pub room_code: String,
    pub name: String,
}

/// Bridges the request/response validation boundary and the WebSocket
/// connection: `validate_join` issues a ticket here and the connection that
/// presents it claims the `(room_code, name)` pair. Claiming consumes the
/// ticket, so one validated join admits exactly one connection and a
/// replayed ticket gets nothing.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionContext>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, context: SessionContext) -> Uuid {
        let ticket = Uuid::new_v4();
        self.sessions.write().await.insert(ticket, context);
        ticket
    }

    pub async fn claim(&self, ticket: Uuid) -> Option<SessionContext> {
        self.sessions.write().await.remove(&ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tickets_claim_exactly_once() {
        let store = SessionStore::new();
        let ticket = store
            .issue(SessionContext {
                room_code: "ABCD".to_string(),
                name: "ALICE".to_string(),
            })
            .await;

        let context = store.claim(ticket).await.unwrap();
        assert_eq!(context.room_code, "ABCD");
        assert_eq!(context.name, "ALICE");

        // consumed: a replay of the same ticket gets nothing
        assert!(store.claim(ticket).await.is_none());
    }

    #[tokio::test]
    async fn unknown_tickets_do_not_claim() {
        let store = SessionStore::new();
        assert!(store.claim(Uuid::new_v4()).await.is_none());
    }
}
