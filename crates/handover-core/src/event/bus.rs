//! Broadcast event bus for distributing `ChatEvent` to realtime sessions.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers. Events are published only after the state they
//! describe has been committed to storage, so subscribers observing an
//! event in order also observe the store in that order. Publishing with
//! no active subscribers is a no-op.

use handover_types::event::ChatEvent;
use tokio::sync::broadcast;

/// Multi-consumer event bus for chat events.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the bus clones the
/// sender, allowing multiple producers and consumers.
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }

    /// Access the underlying broadcast sender.
    pub fn sender(&self) -> &broadcast::Sender<ChatEvent> {
        &self.sender
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handover_types::conversation::Language;
    use uuid::Uuid;

    fn sample_event() -> ChatEvent {
        ChatEvent::ConversationOpened {
            conversation_id: Uuid::now_v7(),
            session_key: "sess-1".to_string(),
            language: Language::English,
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(sample_event());

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ChatEvent::ConversationOpened { .. }));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(sample_event());

        assert!(matches!(
            rx1.recv().await.unwrap(),
            ChatEvent::ConversationOpened { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            ChatEvent::ConversationOpened { .. }
        ));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.publish(sample_event());
        bus.publish(sample_event());
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::now_v7()).collect();
        for id in &ids {
            bus.publish(ChatEvent::ConversationOpened {
                conversation_id: *id,
                session_key: id.to_string(),
                language: Language::English,
            });
        }

        for id in &ids {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.conversation_id(), *id);
        }
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(sample_event());

        assert!(rx.try_recv().is_ok());
    }
}
