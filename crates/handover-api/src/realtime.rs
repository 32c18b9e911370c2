//! Registry of live WebSocket sessions.
//!
//! Tracks every connected socket with its viewer identity and the
//! conversation it is watching. Used by the WebSocket handler for typing
//! broadcasts and by the stats endpoint for connection counts. Entries are
//! removed when the socket task ends, so a dropped connection never
//! lingers.

use dashmap::DashMap;
use uuid::Uuid;

use handover_types::message::Role;

/// One connected WebSocket client.
#[derive(Debug, Clone)]
pub struct LiveSession {
    pub viewer: Role,
    pub display_name: String,
    /// Set for admin sockets; drives presence updates on disconnect.
    pub admin_id: Option<Uuid>,
    /// The conversation this socket is subscribed to, once it sends a
    /// subscribe command.
    pub conversation_id: Option<Uuid>,
}

/// In-process map of connected sockets, keyed by a per-connection id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, LiveSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly upgraded socket. Returns its connection id.
    pub fn connect(&self, viewer: Role, display_name: String, admin_id: Option<Uuid>) -> Uuid {
        let socket_id = Uuid::now_v7();
        self.sessions.insert(
            socket_id,
            LiveSession {
                viewer,
                display_name,
                admin_id,
                conversation_id: None,
            },
        );
        socket_id
    }

    /// Point a socket at a conversation.
    pub fn subscribe(&self, socket_id: Uuid, conversation_id: Uuid) {
        if let Some(mut session) = self.sessions.get_mut(&socket_id) {
            session.conversation_id = Some(conversation_id);
        }
    }

    pub fn disconnect(&self, socket_id: Uuid) {
        self.sessions.remove(&socket_id);
    }

    pub fn get(&self, socket_id: Uuid) -> Option<LiveSession> {
        self.sessions.get(&socket_id).map(|s| s.clone())
    }

    /// Number of connected sockets.
    pub fn connected(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sockets watching a given conversation.
    pub fn watchers(&self, conversation_id: Uuid) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.conversation_id == Some(conversation_id))
            .count()
    }
}
