//! SQLite message repository implementation.
//!
//! Messages are append-only; the only UPDATE is the correction
//! annotation. Paging walks backwards by created_at, returning each page
//! oldest first.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use handover_core::repository::MessageRepository;
use handover_types::conversation::Language;
use handover_types::error::RepositoryError;
use handover_types::message::{Message, MessageKind, Role, Visibility};
use handover_types::provider::ReplySource;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageRepository`.
#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Message.
struct MessageRow {
    id: String,
    conversation_id: String,
    kind: String,
    content: String,
    created_at: String,
    visibility: String,
    is_internal: i64,
    sender_role: String,
    sender_id: Option<String>,
    sender_name: Option<String>,
    appears_as_ai: i64,
    ai_source: Option<String>,
    ai_confidence: Option<f64>,
    ai_latency_ms: Option<i64>,
    ai_intent: Option<String>,
    corrected: i64,
    correction: Option<String>,
    correction_reason: Option<String>,
    language: Option<String>,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            kind: row.try_get("kind")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            visibility: row.try_get("visibility")?,
            is_internal: row.try_get("is_internal")?,
            sender_role: row.try_get("sender_role")?,
            sender_id: row.try_get("sender_id")?,
            sender_name: row.try_get("sender_name")?,
            appears_as_ai: row.try_get("appears_as_ai")?,
            ai_source: row.try_get("ai_source")?,
            ai_confidence: row.try_get("ai_confidence")?,
            ai_latency_ms: row.try_get("ai_latency_ms")?,
            ai_intent: row.try_get("ai_intent")?,
            corrected: row.try_get("corrected")?,
            correction: row.try_get("correction")?,
            correction_reason: row.try_get("correction_reason")?,
            language: row.try_get("language")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let sender_id = self
            .sender_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid sender_id: {e}")))?;
        let kind: MessageKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let visibility: Visibility = self
            .visibility
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let sender_role: Role = self
            .sender_role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let ai_source: Option<ReplySource> = self
            .ai_source
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let language: Option<Language> = self
            .language
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Message {
            id,
            conversation_id,
            kind,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
            visibility,
            is_internal: self.is_internal != 0,
            sender_role,
            sender_id,
            sender_name: self.sender_name,
            appears_as_ai: self.appears_as_ai != 0,
            ai_source,
            ai_confidence: self.ai_confidence,
            ai_latency_ms: self.ai_latency_ms.map(|v| v as u64),
            ai_intent: self.ai_intent,
            corrected: self.corrected != 0,
            correction: self.correction,
            correction_reason: self.correction_reason,
            language,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO messages
               (id, conversation_id, kind, content, created_at, visibility, is_internal,
                sender_role, sender_id, sender_name, appears_as_ai, ai_source,
                ai_confidence, ai_latency_ms, ai_intent, corrected, correction,
                correction_reason, language)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.kind.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .bind(message.visibility.to_string())
        .bind(message.is_internal as i64)
        .bind(message.sender_role.to_string())
        .bind(message.sender_id.map(|id| id.to_string()))
        .bind(&message.sender_name)
        .bind(message.appears_as_ai as i64)
        .bind(message.ai_source.map(|s| s.to_string()))
        .bind(message.ai_confidence)
        .bind(message.ai_latency_ms.map(|v| v as i64))
        .bind(&message.ai_intent)
        .bind(message.corrected as i64)
        .bind(&message.correction)
        .bind(&message.correction_reason)
        .bind(message.language.map(|l| l.to_string()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let message_row = MessageRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(message_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn list_page(
        &self,
        conversation_id: &Uuid,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = match before {
            Some(cursor) => {
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE conversation_id = ? AND created_at < ?
                       ORDER BY created_at DESC LIMIT ?"#,
                )
                .bind(conversation_id.to_string())
                .bind(format_datetime(&cursor))
                .bind(limit)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE conversation_id = ?
                       ORDER BY created_at DESC LIMIT ?"#,
                )
                .bind(conversation_id.to_string())
                .bind(limit)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = rows
            .iter()
            .map(|row| {
                MessageRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_message()
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Fetched newest first for the LIMIT; pages read oldest first.
        messages.reverse();
        Ok(messages)
    }

    async fn mark_corrected(
        &self,
        message_id: &Uuid,
        correction: &str,
        reason: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE messages SET corrected = 1, correction = ?, correction_reason = ? WHERE id = ?",
        )
        .bind(correction)
        .bind(reason)
        .bind(message_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::conversation::SqliteConversationRepository;
    use handover_core::repository::ConversationRepository;
    use handover_types::conversation::Conversation;

    async fn test_repos() -> (
        tempfile::TempDir,
        SqliteConversationRepository,
        SqliteMessageRepository,
        Uuid,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        let conversations = SqliteConversationRepository::new(pool.clone());
        let messages = SqliteMessageRepository::new(pool);

        let conversation = Conversation::new("sess-1".to_string(), Language::English);
        conversations.create(&conversation).await.unwrap();
        (dir, conversations, messages, conversation.id)
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let (_dir, _convs, repo, conversation_id) = test_repos().await;

        let message = Message::ai(
            conversation_id,
            "Chicken is fresh today.".to_string(),
            ReplySource::Ai,
            0.95,
            420,
            None,
            Language::English,
        );
        repo.insert(&message).await.unwrap();

        let loaded = repo.get(&message.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, MessageKind::Ai);
        assert_eq!(loaded.ai_source, Some(ReplySource::Ai));
        assert_eq!(loaded.ai_latency_ms, Some(420));
        assert_eq!(loaded.language, Some(Language::English));
        assert!(!loaded.corrected);
    }

    #[tokio::test]
    async fn test_paging_walks_backwards() {
        let (_dir, _convs, repo, conversation_id) = test_repos().await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut message =
                Message::user(conversation_id, format!("msg {i}"), Language::English);
            // Distinct timestamps for a deterministic order.
            message.created_at = Utc::now() + chrono::Duration::milliseconds(i * 10);
            repo.insert(&message).await.unwrap();
            ids.push(message.id);
        }

        let latest = repo.list_page(&conversation_id, 2, None).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].id, ids[3]);
        assert_eq!(latest[1].id, ids[4]);

        let older = repo
            .list_page(&conversation_id, 2, Some(latest[0].created_at))
            .await
            .unwrap();
        assert_eq!(older.len(), 2);
        assert_eq!(older[0].id, ids[1]);
        assert_eq!(older[1].id, ids[2]);
    }

    #[tokio::test]
    async fn test_mark_corrected() {
        let (_dir, _convs, repo, conversation_id) = test_repos().await;

        let message = Message::ai(
            conversation_id,
            "wrong answer".to_string(),
            ReplySource::Ai,
            0.95,
            100,
            None,
            Language::English,
        );
        repo.insert(&message).await.unwrap();

        repo.mark_corrected(&message.id, "right answer", Some("accuracy"))
            .await
            .unwrap();

        let loaded = repo.get(&message.id).await.unwrap().unwrap();
        assert!(loaded.corrected);
        assert_eq!(loaded.correction.as_deref(), Some("right answer"));
        assert_eq!(loaded.correction_reason.as_deref(), Some("accuracy"));
    }

    #[tokio::test]
    async fn test_admin_message_persists_true_sender() {
        let (_dir, _convs, repo, conversation_id) = test_repos().await;

        let admin_id = Uuid::now_v7();
        let message = Message::admin(
            conversation_id,
            "masked reply".to_string(),
            admin_id,
            "Asha".to_string(),
            Role::Admin,
            true,
        );
        repo.insert(&message).await.unwrap();

        let loaded = repo.get(&message.id).await.unwrap().unwrap();
        assert!(loaded.appears_as_ai);
        assert_eq!(loaded.sender_id, Some(admin_id));
        assert_eq!(loaded.sender_name.as_deref(), Some("Asha"));
        assert_eq!(loaded.sender_role, Role::Admin);
    }
}
