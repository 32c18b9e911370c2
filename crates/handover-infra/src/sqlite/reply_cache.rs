//! SQLite reply cache repository implementation.

use chrono::{DateTime, Utc};
use sqlx::Row;

use handover_core::repository::ReplyCacheRepository;
use handover_types::conversation::Language;
use handover_types::error::RepositoryError;
use handover_types::provider::CachedReply;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ReplyCacheRepository`.
#[derive(Clone)]
pub struct SqliteReplyCacheRepository {
    pool: DatabasePool,
}

impl SqliteReplyCacheRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct CacheRow {
    cache_key: String,
    content: String,
    language: String,
    confidence: f64,
    intent: Option<String>,
    created_at: String,
    expires_at: String,
    hit_count: i64,
}

impl CacheRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            cache_key: row.try_get("cache_key")?,
            content: row.try_get("content")?,
            language: row.try_get("language")?,
            confidence: row.try_get("confidence")?,
            intent: row.try_get("intent")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            hit_count: row.try_get("hit_count")?,
        })
    }

    fn into_reply(self) -> Result<CachedReply, RepositoryError> {
        let language: Language = self
            .language
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(CachedReply {
            cache_key: self.cache_key,
            content: self.content,
            language,
            confidence: self.confidence,
            intent: self.intent,
            created_at: parse_datetime(&self.created_at)?,
            expires_at: parse_datetime(&self.expires_at)?,
            hit_count: self.hit_count.max(0) as u64,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

impl ReplyCacheRepository for SqliteReplyCacheRepository {
    async fn get(
        &self,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedReply>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM response_cache WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(cache_key)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let cache_row = CacheRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(cache_row.into_reply()?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, reply: &CachedReply) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO response_cache (
                   cache_key, content, language, confidence, intent, created_at, expires_at, hit_count
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(cache_key) DO UPDATE SET
                   content = excluded.content,
                   language = excluded.language,
                   confidence = excluded.confidence,
                   intent = excluded.intent,
                   created_at = excluded.created_at,
                   expires_at = excluded.expires_at,
                   hit_count = excluded.hit_count"#,
        )
        .bind(&reply.cache_key)
        .bind(&reply.content)
        .bind(reply.language.to_string())
        .bind(reply.confidence)
        .bind(&reply.intent)
        .bind(reply.created_at.to_rfc3339())
        .bind(reply.expires_at.to_rfc3339())
        .bind(reply.hit_count as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn record_hit(&self, cache_key: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE response_cache SET hit_count = hit_count + 1 WHERE cache_key = ?")
            .bind(cache_key)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM response_cache WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
