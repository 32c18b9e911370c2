//! SQLite learning record repository implementation.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use handover_core::repository::LearningRepository;
use handover_types::conversation::Language;
use handover_types::error::RepositoryError;
use handover_types::learning::LearningRecord;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `LearningRepository`.
#[derive(Clone)]
pub struct SqliteLearningRepository {
    pool: DatabasePool,
}

impl SqliteLearningRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct LearningRow {
    id: String,
    conversation_id: String,
    customer_message: String,
    ai_reply: String,
    admin_correction: String,
    reason: Option<String>,
    category: Option<String>,
    language: String,
    admin_id: Option<String>,
    admin_name: Option<String>,
    confidence_before: f64,
    confidence_after: f64,
    applied_to_training: bool,
    created_at: String,
}

impl LearningRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            customer_message: row.try_get("customer_message")?,
            ai_reply: row.try_get("ai_reply")?,
            admin_correction: row.try_get("admin_correction")?,
            reason: row.try_get("reason")?,
            category: row.try_get("category")?,
            language: row.try_get("language")?,
            admin_id: row.try_get("admin_id")?,
            admin_name: row.try_get("admin_name")?,
            confidence_before: row.try_get("confidence_before")?,
            confidence_after: row.try_get("confidence_after")?,
            applied_to_training: row.try_get("applied_to_training")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<LearningRecord, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let conversation_id = parse_uuid(&self.conversation_id)?;
        let admin_id = self.admin_id.as_deref().map(parse_uuid).transpose()?;
        let language: Language = self
            .language
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(LearningRecord {
            id,
            conversation_id,
            customer_message: self.customer_message,
            ai_reply: self.ai_reply,
            admin_correction: self.admin_correction,
            reason: self.reason,
            category: self.category,
            language,
            admin_id,
            admin_name: self.admin_name,
            confidence_before: self.confidence_before,
            confidence_after: self.confidence_after,
            applied_to_training: self.applied_to_training,
            created_at,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid uuid: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

impl LearningRepository for SqliteLearningRepository {
    async fn insert(&self, record: &LearningRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO learning_records (
                   id, conversation_id, customer_message, ai_reply, admin_correction,
                   reason, category, language, admin_id, admin_name,
                   confidence_before, confidence_after, applied_to_training, created_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.conversation_id.to_string())
        .bind(&record.customer_message)
        .bind(&record.ai_reply)
        .bind(&record.admin_correction)
        .bind(&record.reason)
        .bind(&record.category)
        .bind(record.language.to_string())
        .bind(record.admin_id.map(|id| id.to_string()))
        .bind(&record.admin_name)
        .bind(record.confidence_before)
        .bind(record.confidence_after)
        .bind(record.applied_to_training)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<LearningRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM learning_records
               WHERE applied_to_training = 0
               ORDER BY created_at ASC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                LearningRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_record()
            })
            .collect()
    }

    async fn mark_applied(&self, record_id: &Uuid) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE learning_records SET applied_to_training = 1 WHERE id = ?")
                .bind(record_id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM learning_records")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.try_get("n")
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }
}
