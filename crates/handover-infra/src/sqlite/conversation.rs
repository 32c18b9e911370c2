//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `handover-core` using sqlx with
//! split read/write pools. Ownership mutations are conditional UPDATEs on
//! the single-connection writer pool; `rows_affected` tells the caller
//! whether their claim won.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use handover_core::repository::ConversationRepository;
use handover_types::conversation::{Conversation, ConversationStatus, Language, Priority};
use handover_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Conversation.
struct ConversationRow {
    id: String,
    session_key: String,
    customer_id: Option<String>,
    status: String,
    owner_admin_id: Option<String>,
    owner_admin_name: Option<String>,
    owned_at: Option<String>,
    language: String,
    priority: String,
    message_count: i64,
    internal_message_count: i64,
    correction_count: i64,
    created_at: String,
    last_activity: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_key: row.try_get("session_key")?,
            customer_id: row.try_get("customer_id")?,
            status: row.try_get("status")?,
            owner_admin_id: row.try_get("owner_admin_id")?,
            owner_admin_name: row.try_get("owner_admin_name")?,
            owned_at: row.try_get("owned_at")?,
            language: row.try_get("language")?,
            priority: row.try_get("priority")?,
            message_count: row.try_get("message_count")?,
            internal_message_count: row.try_get("internal_message_count")?,
            correction_count: row.try_get("correction_count")?,
            created_at: row.try_get("created_at")?,
            last_activity: row.try_get("last_activity")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = parse_uuid(&self.id, "conversation id")?;
        let customer_id = self
            .customer_id
            .as_deref()
            .map(|s| parse_uuid(s, "customer_id"))
            .transpose()?;
        let owner_admin_id = self
            .owner_admin_id
            .as_deref()
            .map(|s| parse_uuid(s, "owner_admin_id"))
            .transpose()?;
        let status: ConversationStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let language: Language = self
            .language
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let priority: Priority = self
            .priority
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let owned_at = self.owned_at.as_deref().map(parse_datetime).transpose()?;

        Ok(Conversation {
            id,
            session_key: self.session_key,
            customer_id,
            status,
            owner_admin_id,
            owner_admin_name: self.owner_admin_name,
            owned_at,
            language,
            priority,
            message_count: self.message_count as u32,
            internal_message_count: self.internal_message_count as u32,
            correction_count: self.correction_count as u32,
            created_at: parse_datetime(&self.created_at)?,
            last_activity: parse_datetime(&self.last_activity)?,
        })
    }
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl ConversationRepository for SqliteConversationRepository {
    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversations
               (id, session_key, customer_id, status, owner_admin_id, owner_admin_name,
                owned_at, language, priority, message_count, internal_message_count,
                correction_count, created_at, last_activity)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.session_key)
        .bind(conversation.customer_id.map(|id| id.to_string()))
        .bind(conversation.status.to_string())
        .bind(conversation.owner_admin_id.map(|id| id.to_string()))
        .bind(&conversation.owner_admin_name)
        .bind(conversation.owned_at.as_ref().map(format_datetime))
        .bind(conversation.language.to_string())
        .bind(conversation.priority.to_string())
        .bind(conversation.message_count as i64)
        .bind(conversation.internal_message_count as i64)
        .bind(conversation.correction_count as i64)
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.last_activity))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_session_key(
        &self,
        session_key: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE session_key = ?")
            .bind(session_key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_status(
        &self,
        status: ConversationStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE status = ? ORDER BY last_activity DESC LIMIT ? OFFSET ?",
        )
        .bind(status.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ConversationRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_conversation()
            })
            .collect()
    }

    async fn claim_ownership(
        &self,
        conversation_id: &Uuid,
        admin_id: &Uuid,
        admin_name: &str,
        owned_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // The WHERE clause is the arbitration: exactly one concurrent
        // caller sees owner_admin_id IS NULL through the single writer
        // connection.
        let result = sqlx::query(
            r#"UPDATE conversations
               SET owner_admin_id = ?, owner_admin_name = ?, owned_at = ?,
                   status = 'admin_taken', last_activity = ?
               WHERE id = ? AND owner_admin_id IS NULL AND status != 'closed'"#,
        )
        .bind(admin_id.to_string())
        .bind(admin_name)
        .bind(format_datetime(&owned_at))
        .bind(format_datetime(&owned_at))
        .bind(conversation_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_ownership(
        &self,
        conversation_id: &Uuid,
        admin_id: &Uuid,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE conversations
               SET owner_admin_id = NULL, owner_admin_name = NULL, owned_at = NULL,
                   status = 'active'
               WHERE id = ? AND owner_admin_id = ?"#,
        )
        .bind(conversation_id.to_string())
        .bind(admin_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_owned_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let cutoff_text = format_datetime(&cutoff);
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE owner_admin_id IS NOT NULL AND last_activity < ?",
        )
        .bind(&cutoff_text)
        .fetch_all(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut released = Vec::new();
        for row in &rows {
            let conversation = ConversationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_conversation()?;

            // Re-check the predicate per row so a manual release between
            // the select and this update is not clobbered.
            let result = sqlx::query(
                r#"UPDATE conversations
                   SET owner_admin_id = NULL, owner_admin_name = NULL, owned_at = NULL,
                       status = 'active'
                   WHERE id = ? AND owner_admin_id IS NOT NULL AND last_activity < ?"#,
            )
            .bind(conversation.id.to_string())
            .bind(&cutoff_text)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

            if result.rows_affected() == 1 {
                released.push(conversation);
            }
        }
        Ok(released)
    }

    async fn set_status(
        &self,
        conversation_id: &Uuid,
        status: ConversationStatus,
        priority: Option<Priority>,
    ) -> Result<(), RepositoryError> {
        let result = match priority {
            Some(priority) => sqlx::query(
                "UPDATE conversations SET status = ?, priority = ? WHERE id = ?",
            )
            .bind(status.to_string())
            .bind(priority.to_string())
            .bind(conversation_id.to_string())
            .execute(&self.pool.writer)
            .await,
            None => sqlx::query("UPDATE conversations SET status = ? WHERE id = ?")
                .bind(status.to_string())
                .bind(conversation_id.to_string())
                .execute(&self.pool.writer)
                .await,
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn record_activity(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE conversations SET last_activity = ? WHERE id = ?")
            .bind(format_datetime(&at))
            .bind(conversation_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn touch(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
        internal: bool,
    ) -> Result<(), RepositoryError> {
        let query = if internal {
            r#"UPDATE conversations
               SET last_activity = ?, internal_message_count = internal_message_count + 1
               WHERE id = ?"#
        } else {
            r#"UPDATE conversations
               SET last_activity = ?, message_count = message_count + 1
               WHERE id = ?"#
        };
        let result = sqlx::query(query)
            .bind(format_datetime(&at))
            .bind(conversation_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn record_correction(&self, conversation_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE conversations SET correction_count = correction_count + 1 WHERE id = ?",
        )
        .bind(conversation_id.to_string())
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

    async fn test_repo() -> (tempfile::TempDir, SqliteConversationRepository) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (dir, SqliteConversationRepository::new(pool))
    }

    fn sample() -> Conversation {
        Conversation::new("sess-1".to_string(), Language::English)
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let (_dir, repo) = test_repo().await;
        let conversation = sample();
        repo.create(&conversation).await.unwrap();

        let loaded = repo.get(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.session_key, "sess-1");
        assert_eq!(loaded.status, ConversationStatus::Active);
        assert!(loaded.owner_admin_id.is_none());

        let by_key = repo.get_by_session_key("sess-1").await.unwrap().unwrap();
        assert_eq!(by_key.id, conversation.id);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let (_dir, repo) = test_repo().await;
        let conversation = sample();
        repo.create(&conversation).await.unwrap();

        let asha = Uuid::now_v7();
        let bina = Uuid::now_v7();
        let now = Utc::now();

        assert!(
            repo.claim_ownership(&conversation.id, &asha, "Asha", now)
                .await
                .unwrap()
        );
        assert!(
            !repo
                .claim_ownership(&conversation.id, &bina, "Bina", now)
                .await
                .unwrap()
        );

        let loaded = repo.get(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.owner_admin_id, Some(asha));
        assert_eq!(loaded.owner_admin_name.as_deref(), Some("Asha"));
        assert_eq!(loaded.status, ConversationStatus::AdminTaken);
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let (_dir, repo) = test_repo().await;
        let conversation = sample();
        repo.create(&conversation).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            let id = conversation.id;
            handles.push(tokio::spawn(async move {
                repo.claim_ownership(&id, &Uuid::now_v7(), &format!("admin-{i}"), Utc::now())
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_release_requires_owner() {
        let (_dir, repo) = test_repo().await;
        let conversation = sample();
        repo.create(&conversation).await.unwrap();

        let asha = Uuid::now_v7();
        let bina = Uuid::now_v7();
        repo.claim_ownership(&conversation.id, &asha, "Asha", Utc::now())
            .await
            .unwrap();

        assert!(!repo.release_ownership(&conversation.id, &bina).await.unwrap());
        assert!(repo.release_ownership(&conversation.id, &asha).await.unwrap());

        let loaded = repo.get(&conversation.id).await.unwrap().unwrap();
        assert!(loaded.owner_admin_id.is_none());
        assert_eq!(loaded.status, ConversationStatus::Active);

        // Released conversation can be claimed again.
        assert!(
            repo.claim_ownership(&conversation.id, &bina, "Bina", Utc::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_closed_conversation_cannot_be_claimed() {
        let (_dir, repo) = test_repo().await;
        let conversation = sample();
        repo.create(&conversation).await.unwrap();
        repo.set_status(&conversation.id, ConversationStatus::Closed, None)
            .await
            .unwrap();

        assert!(
            !repo
                .claim_ownership(&conversation.id, &Uuid::now_v7(), "Asha", Utc::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_release_owned_before_cutoff() {
        let (_dir, repo) = test_repo().await;
        let stale = sample();
        repo.create(&stale).await.unwrap();
        let mut fresh = sample();
        fresh.session_key = "sess-2".to_string();
        repo.create(&fresh).await.unwrap();

        let asha = Uuid::now_v7();
        let old = Utc::now() - chrono::Duration::seconds(600);
        repo.claim_ownership(&stale.id, &asha, "Asha", old).await.unwrap();
        repo.claim_ownership(&fresh.id, &asha, "Asha", Utc::now())
            .await
            .unwrap();
        // Backdate the stale conversation's activity.
        repo.touch(&stale.id, old, false).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::seconds(300);
        let released = repo.release_owned_before(cutoff).await.unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].id, stale.id);

        let reloaded = repo.get(&stale.id).await.unwrap().unwrap();
        assert!(reloaded.owner_admin_id.is_none());
        let still_owned = repo.get(&fresh.id).await.unwrap().unwrap();
        assert_eq!(still_owned.owner_admin_id, Some(asha));
    }

    #[tokio::test]
    async fn test_touch_bumps_counters() {
        let (_dir, repo) = test_repo().await;
        let conversation = sample();
        repo.create(&conversation).await.unwrap();

        repo.touch(&conversation.id, Utc::now(), false).await.unwrap();
        repo.touch(&conversation.id, Utc::now(), true).await.unwrap();
        repo.record_correction(&conversation.id).await.unwrap();

        let loaded = repo.get(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.message_count, 1);
        assert_eq!(loaded.internal_message_count, 1);
        assert_eq!(loaded.correction_count, 1);
    }

    #[tokio::test]
    async fn test_record_activity_leaves_counters_alone() {
        let (_dir, repo) = test_repo().await;
        let conversation = sample();
        repo.create(&conversation).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(30);
        repo.record_activity(&conversation.id, later).await.unwrap();

        let loaded = repo.get(&conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.message_count, 0);
        assert_eq!(loaded.internal_message_count, 0);
        assert!(loaded.last_activity > conversation.last_activity);
    }
}
