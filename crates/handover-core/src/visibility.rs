//! Role-scoped message projection.
//!
//! One pure function, `project`, decides for every (message, viewer) pair
//! whether the viewer may see the message and, if so, what shape it takes
//! on the wire. Both paged history and live push go through this filter,
//! so a customer can never observe an internal note in either channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chrono::{DateTime, Utc};
use handover_types::conversation::Language;
use handover_types::message::{Message, MessageKind, Role, Visibility};
use handover_types::provider::ReplySource;

/// The display name customers see on automated and masked replies.
pub const AI_DISPLAY_NAME: &str = "AI Assistant";

/// The wire shape of a message after projection for one viewer.
///
/// Admin viewers additionally get the moderation fields (`is_internal`,
/// `appears_as_ai`, the true sender, correction state) and the AI
/// diagnostics (source, confidence, intent). For customers those fields
/// are always absent from the serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_source: Option<ReplySource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_intent: Option<String>,
    // Moderation fields, admin projections only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_internal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appears_as_ai: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

/// Decide whether `viewer` may see `message`.
///
/// Rules, in order:
/// - `is_internal` hides a message from customers regardless of its
///   visibility tag.
/// - `super_admin_only` is visible to super admins alone.
/// - `admin_only` and `internal` visibility require an admin viewer.
/// - everything else (`public`) is visible to all roles.
pub fn can_view(message: &Message, viewer: Role) -> bool {
    if message.is_internal && !viewer.is_admin() {
        return false;
    }
    match message.visibility {
        Visibility::SuperAdminOnly => viewer == Role::SuperAdmin,
        Visibility::AdminOnly | Visibility::Internal => viewer.is_admin(),
        Visibility::Public => true,
    }
}

/// Project a stored message into the wire shape for one viewer.
///
/// Returns `None` when the viewer may not see the message at all. For
/// customer viewers, an `appears_as_ai` admin message is re-presented as
/// an automated reply under [`AI_DISPLAY_NAME`]; admins always see the
/// true sender plus the masking flag.
pub fn project(message: &Message, viewer: Role) -> Option<MessageView> {
    if !can_view(message, viewer) {
        return None;
    }

    let admin_viewer = viewer.is_admin();
    let masked = message.appears_as_ai && !admin_viewer;

    let sender_name = if masked || (message.kind == MessageKind::Ai && !admin_viewer) {
        AI_DISPLAY_NAME.to_string()
    } else {
        message
            .sender_name
            .clone()
            .unwrap_or_else(|| match message.sender_role {
                Role::Customer => "Customer".to_string(),
                Role::System => AI_DISPLAY_NAME.to_string(),
                Role::Admin | Role::SuperAdmin => "Support".to_string(),
            })
    };

    let kind = if masked { MessageKind::Ai } else { message.kind };

    Some(MessageView {
        id: message.id,
        conversation_id: message.conversation_id,
        kind,
        content: message.content.clone(),
        created_at: message.created_at,
        sender_name,
        language: message.language,
        ai_source: if admin_viewer { message.ai_source } else { None },
        ai_confidence: if admin_viewer { message.ai_confidence } else { None },
        ai_intent: if admin_viewer {
            message.ai_intent.clone()
        } else {
            None
        },
        visibility: admin_viewer.then_some(message.visibility),
        is_internal: admin_viewer.then_some(message.is_internal),
        appears_as_ai: admin_viewer.then_some(message.appears_as_ai),
        sender_id: if admin_viewer { message.sender_id } else { None },
        corrected: admin_viewer.then_some(message.corrected),
        correction: if admin_viewer {
            message.correction.clone()
        } else {
            None
        },
    })
}

/// Project a whole history page for one viewer, dropping hidden entries.
pub fn project_page(messages: &[Message], viewer: Role) -> Vec<MessageView> {
    messages.iter().filter_map(|m| project(m, viewer)).collect()
}
