//! End-to-end arbitration and routing tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;

use common::{MemoryStore, admin, service};
use handover_core::chat::ChatService;
use handover_core::event::EventBus;
use handover_core::provider::TextProvider;
use handover_core::respond::Responder;
use handover_core::takeover::TakeoverArbitrator;
use handover_types::admin::AdminSession;
use handover_types::config::ResponderConfig;
use handover_types::conversation::ConversationStatus;
use handover_types::error::{ChatError, TakeoverError};
use handover_types::event::ChatEvent;
use handover_types::message::MessageKind;
use handover_types::provider::{GenerateRequest, GeneratedText, ProviderError, ReplySource};

#[tokio::test]
async fn concurrent_takeover_has_exactly_one_winner() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store, bus);
    let conversation = chat.open_conversation("sess-1", None).await.unwrap();

    let arbitrator = chat.arbitrator().clone();
    let admins: Vec<_> = (0..8).map(|i| admin(&format!("admin-{i}"))).collect();

    let mut handles = Vec::new();
    for a in admins {
        let arbitrator = arbitrator.clone();
        let id = conversation.id;
        handles.push(tokio::spawn(
            async move { arbitrator.request_takeover(id, &a).await },
        ));
    }

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(TakeoverError::AlreadyOwned { .. }) => losers += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(losers, 7);
}

#[tokio::test]
async fn takeover_suppresses_auto_replies_until_release() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store, bus);
    let asha = admin("Asha");

    // Unowned: the customer gets an automatic reply.
    let turn = chat
        .handle_customer_message("sess-2", "hello", None)
        .await
        .unwrap();
    let reply = turn.auto_reply.expect("unowned conversation must auto-reply");
    assert_eq!(reply.kind, MessageKind::Ai);

    chat.arbitrator()
        .request_takeover(turn.conversation.id, &asha)
        .await
        .unwrap();

    // Owned: the message is stored but nothing answers automatically.
    let owned_turn = chat
        .handle_customer_message("sess-2", "I need a human", None)
        .await
        .unwrap();
    assert!(owned_turn.auto_reply.is_none());

    // The admin answers manually.
    let admin_msg = chat
        .send_admin_message(turn.conversation.id, &asha, "Happy to help!", false)
        .await
        .unwrap();
    assert_eq!(admin_msg.kind, MessageKind::Admin);

    chat.arbitrator()
        .release(turn.conversation.id, asha.admin_id)
        .await
        .unwrap();

    // Released: automatic replies resume.
    let after = chat
        .handle_customer_message("sess-2", "no rush, thank you", None)
        .await
        .unwrap();
    assert!(after.auto_reply.is_some());
}

#[tokio::test]
async fn non_owner_cannot_send_admin_message() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store, bus);
    let asha = admin("Asha");
    let bina = admin("Bina");

    let conversation = chat.open_conversation("sess-3", None).await.unwrap();
    chat.arbitrator()
        .request_takeover(conversation.id, &asha)
        .await
        .unwrap();

    let result = chat
        .send_admin_message(conversation.id, &bina, "hello", false)
        .await;
    assert!(matches!(result, Err(ChatError::NotOwner)));
}

#[tokio::test]
async fn loser_error_names_the_current_owner() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store, bus);
    let asha = admin("Asha");
    let bina = admin("Bina");

    let conversation = chat.open_conversation("sess-4", None).await.unwrap();
    chat.arbitrator()
        .request_takeover(conversation.id, &asha)
        .await
        .unwrap();

    match chat
        .arbitrator()
        .request_takeover(conversation.id, &bina)
        .await
    {
        Err(TakeoverError::AlreadyOwned {
            owner_id,
            owner_name,
        }) => {
            assert_eq!(owner_id, asha.admin_id);
            assert_eq!(owner_name, "Asha");
        }
        other => panic!("expected AlreadyOwned, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_conversations_bounded_per_admin() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store, bus);
    let asha = admin("Asha");

    for i in 0..AdminSession::MAX_CONCURRENT {
        let conversation = chat
            .open_conversation(&format!("sess-bound-{i}"), None)
            .await
            .unwrap();
        chat.arbitrator()
            .request_takeover(conversation.id, &asha)
            .await
            .unwrap();
    }

    let one_more = chat
        .open_conversation("sess-bound-extra", None)
        .await
        .unwrap();
    let result = chat.arbitrator().request_takeover(one_more.id, &asha).await;
    assert!(matches!(result, Err(TakeoverError::TooManyConversations)));
}

#[tokio::test]
async fn sweep_releases_idle_owners_and_publishes() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store.clone(), bus.clone());
    let asha = admin("Asha");

    let conversation = chat.open_conversation("sess-5", None).await.unwrap();
    chat.arbitrator()
        .request_takeover(conversation.id, &asha)
        .await
        .unwrap();

    // Backdate the conversation's last activity past the timeout.
    {
        let mut conversations = store.conversations.lock().unwrap();
        let c = conversations.get_mut(&conversation.id).unwrap();
        c.last_activity = Utc::now() - chrono::Duration::seconds(600);
    }

    let mut rx = bus.subscribe();
    let released = chat
        .arbitrator()
        .sweep_inactive(Duration::from_secs(300))
        .await
        .unwrap();
    assert_eq!(released.len(), 1);

    match rx.recv().await.unwrap() {
        ChatEvent::TakeoverReleased {
            conversation_id,
            reason,
            ..
        } => {
            assert_eq!(conversation_id, conversation.id);
            assert_eq!(reason, "inactivity");
        }
        other => panic!("expected TakeoverReleased, got {other:?}"),
    }

    // Automatic replies resume after the sweep.
    let turn = chat
        .handle_customer_message("sess-5", "anyone there?", None)
        .await
        .unwrap();
    assert!(turn.auto_reply.is_some());
}

#[tokio::test]
async fn cached_reply_served_for_repeated_question() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store, bus);

    let first = chat
        .handle_customer_message("sess-6", "what is the price of chicken", None)
        .await
        .unwrap();
    assert_eq!(
        first.auto_reply.as_ref().unwrap().ai_source,
        Some(ReplySource::Ai)
    );

    let second = chat
        .handle_customer_message("sess-6", "what is the price of chicken", None)
        .await
        .unwrap();
    assert_eq!(
        second.auto_reply.as_ref().unwrap().ai_source,
        Some(ReplySource::Cache)
    );
}

#[tokio::test]
async fn repeated_takeover_by_the_owner_is_idempotent() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store, bus);
    let asha = admin("Asha");

    // Fill the admin to the concurrency cap so the repeat also proves the
    // cap does not reject an admin revisiting their own conversation.
    let mut first = None;
    for i in 0..AdminSession::MAX_CONCURRENT {
        let conversation = chat
            .open_conversation(&format!("sess-repeat-{i}"), None)
            .await
            .unwrap();
        chat.arbitrator()
            .request_takeover(conversation.id, &asha)
            .await
            .unwrap();
        first.get_or_insert(conversation.id);
    }

    let again = chat
        .arbitrator()
        .request_takeover(first.unwrap(), &asha)
        .await
        .unwrap();
    assert_eq!(again.owner_admin_id, Some(asha.admin_id));
    assert_eq!(again.owner_admin_name.as_deref(), Some("Asha"));
}

#[tokio::test]
async fn takeover_of_closed_conversation_is_rejected() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let chat = service(store.clone(), bus);
    let asha = admin("Asha");

    let conversation = chat.open_conversation("sess-closed", None).await.unwrap();
    store
        .conversations
        .lock()
        .unwrap()
        .get_mut(&conversation.id)
        .unwrap()
        .status = ConversationStatus::Closed;

    let result = chat
        .arbitrator()
        .request_takeover(conversation.id, &asha)
        .await;
    assert!(matches!(result, Err(TakeoverError::Closed)));
}

/// Provider that signals when generation starts and waits to be released,
/// so a test can abandon the caller mid-generation.
struct GatedProvider {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl TextProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedText, ProviderError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(GeneratedText {
            content: format!("late: {}", request.message),
            model: None,
        })
    }
}

#[tokio::test]
async fn reply_outlives_a_disconnected_caller() {
    let store = MemoryStore::default();
    let bus = EventBus::new(64);
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let arbitrator = Arc::new(TakeoverArbitrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        bus.clone(),
    ));
    let responder = Arc::new(Responder::new(
        store.clone(),
        GatedProvider {
            started: started.clone(),
            release: release.clone(),
        },
        ResponderConfig {
            retry_base_delay_secs: 0,
            ..ResponderConfig::default()
        },
    ));
    let chat = ChatService::new(store.clone(), store.clone(), arbitrator, responder, bus);

    let mut turn = Box::pin(chat.handle_customer_message("sess-gone", "hello there", None));
    tokio::select! {
        _ = &mut turn => panic!("reply finished before the provider was released"),
        _ = started.notified() => {}
    }

    // The customer goes away mid-generation.
    drop(turn);

    release.notify_one();

    // The detached task still persists the assistant reply.
    for _ in 0..200 {
        let stored = store
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.kind == MessageKind::Ai);
        if stored {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("assistant reply never stored after the caller disconnected");
}
