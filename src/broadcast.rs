use warp::ws;

use crate::messages::ServerEvent;
use crate::registry::{Departure, Registration, Relay};
use crate::room::Recipient;

pub const JOIN_NOTICE: &str = "has entered the room";
pub const LEAVE_NOTICE: &str = "has left the room";

/// Tells everyone in the room, the new member included, who just arrived.
pub fn announce_join(registration: &Registration) {
    fan_out(
        &registration.recipients,
        &ServerEvent::UserConnected {
            id: registration.member_id,
            name: registration.name.clone(),
            message: JOIN_NOTICE.to_string(),
            timestamp: registration.timestamp,
        },
    );
}

/// Relays an accepted message. The recipient set already excludes the sender,
/// who has local confirmation and must not get an echo.
pub fn relay_message(relay: &Relay) {
    fan_out(
        &relay.recipients,
        &ServerEvent::MessageReceived {
            name: relay.sender_name.clone(),
            message: relay.message.clone(),
            timestamp: relay.timestamp,
        },
    );
}

/// Tells the remaining members who left. An empty recipient set (last leave)
/// is a no-op by construction.
pub fn announce_leave(departure: &Departure) {
    fan_out(
        &departure.recipients,
        &ServerEvent::UserDisconnected {
            name: departure.name.clone(),
            message: LEAVE_NOTICE.to_string(),
            timestamp: departure.timestamp,
        },
    );
}

/// Serialize once, deliver best-effort, at most once per recipient. A dead
/// connection never blocks or fails delivery to the others.
fn fan_out(recipients: &[Recipient], event: &ServerEvent) {
    if let Ok(text) = serde_json::to_string(event) {
        for recipient in recipients {
            recipient.deliver(ws::Message::text(text.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RoomRegistry;
    use crate::room::Outbox;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn outbox() -> (Outbox, UnboundedReceiver<ws::Message>) {
        mpsc::unbounded_channel()
    }

    fn event_type(msg: &ws::Message) -> String {
        let json: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        json["type"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn join_is_announced_to_everyone_including_the_joiner() {
        let registry = RoomRegistry::new();
        let code = registry.create_room().await;
        let (alice_tx, mut alice_rx) = outbox();
        registry.register(&code, "alice", alice_tx).await.unwrap();
        let (bob_tx, mut bob_rx) = outbox();
        let bob = registry.register(&code, "bob", bob_tx).await.unwrap();

        announce_join(&bob);

        for rx in [&mut alice_rx, &mut bob_rx] {
            let msg = rx.try_recv().unwrap();
            assert_eq!(event_type(&msg), "userConnected");
            let json: serde_json::Value =
                serde_json::from_str(msg.to_str().unwrap()).unwrap();
            assert_eq!(json["name"], "BOB");
            assert_eq!(json["message"], JOIN_NOTICE);
        }
    }

    #[tokio::test]
    async fn relayed_messages_skip_the_sender() {
        let registry = RoomRegistry::new();
        let code = registry.create_room().await;
        let (alice_tx, mut alice_rx) = outbox();
        let alice = registry.register(&code, "alice", alice_tx).await.unwrap();
        let (bob_tx, mut bob_rx) = outbox();
        registry.register(&code, "bob", bob_tx).await.unwrap();

        // drain the join announcements
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        let relay = registry
            .append_message(&code, alice.member_id, "hi")
            .await
            .unwrap();
        relay_message(&relay);

        let msg = bob_rx.try_recv().unwrap();
        assert_eq!(event_type(&msg), "messageReceived");
        let json: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert_eq!(json["name"], "ALICE");
        assert_eq!(json["message"], "hi");

        assert!(alice_rx.try_recv().is_err(), "sender received its own message");
    }

    #[tokio::test]
    async fn leave_reaches_remaining_members_only() {
        let registry = RoomRegistry::new();
        let code = registry.create_room().await;
        let (alice_tx, mut alice_rx) = outbox();
        let alice = registry.register(&code, "alice", alice_tx).await.unwrap();
        let (bob_tx, mut bob_rx) = outbox();
        registry.register(&code, "bob", bob_tx).await.unwrap();

        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        let departure = registry.deregister(&code, alice.member_id).await.unwrap();
        announce_leave(&departure);

        let msg = bob_rx.try_recv().unwrap();
        assert_eq!(event_type(&msg), "userDisconnected");
        let json: serde_json::Value = serde_json::from_str(msg.to_str().unwrap()).unwrap();
        assert_eq!(json["name"], "ALICE");
        assert_eq!(json["message"], LEAVE_NOTICE);

        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn a_dead_recipient_does_not_block_the_rest() {
        let registry = RoomRegistry::new();
        let code = registry.create_room().await;
        let (alice_tx, alice_rx) = outbox();
        let alice = registry.register(&code, "alice", alice_tx).await.unwrap();
        let (bob_tx, _bob_rx) = outbox();
        registry.register(&code, "bob", bob_tx).await.unwrap();
        let (carol_tx, mut carol_rx) = outbox();
        registry.register(&code, "carol", carol_tx).await.unwrap();

        drop(_bob_rx); // bob's connection is dead
        while carol_rx.try_recv().is_ok() {}
        drop(alice_rx);

        let relay = registry
            .append_message(&code, alice.member_id, "still here?")
            .await
            .unwrap();
        relay_message(&relay);

        let msg = carol_rx.try_recv().unwrap();
        assert_eq!(event_type(&msg), "messageReceived");
    }
}
