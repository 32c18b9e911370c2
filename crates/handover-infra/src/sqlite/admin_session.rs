//! SQLite admin session repository implementation.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use handover_core::repository::AdminSessionRepository;
use handover_types::admin::{AdminSession, AdminStatus};
use handover_types::error::RepositoryError;
use handover_types::message::Role;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AdminSessionRepository`.
#[derive(Clone)]
pub struct SqliteAdminSessionRepository {
    pool: DatabasePool,
}

impl SqliteAdminSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct AdminSessionRow {
    admin_id: String,
    admin_name: String,
    role: String,
    status: String,
    last_seen: String,
}

impl AdminSessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            admin_id: row.try_get("admin_id")?,
            admin_name: row.try_get("admin_name")?,
            role: row.try_get("role")?,
            status: row.try_get("status")?,
            last_seen: row.try_get("last_seen")?,
        })
    }

    fn into_session(self) -> Result<AdminSession, RepositoryError> {
        let admin_id = Uuid::parse_str(&self.admin_id)
            .map_err(|e| RepositoryError::Query(format!("invalid admin_id: {e}")))?;
        let role: Role = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let status: AdminStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let last_seen = DateTime::parse_from_rfc3339(&self.last_seen)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;

        Ok(AdminSession {
            admin_id,
            admin_name: self.admin_name,
            role,
            status,
            last_seen,
        })
    }
}

impl AdminSessionRepository for SqliteAdminSessionRepository {
    async fn upsert(&self, session: &AdminSession) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO admin_sessions (admin_id, admin_name, role, status, last_seen)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(admin_id) DO UPDATE SET
                   admin_name = excluded.admin_name,
                   role = excluded.role,
                   status = excluded.status,
                   last_seen = excluded.last_seen"#,
        )
        .bind(session.admin_id.to_string())
        .bind(&session.admin_name)
        .bind(session.role.to_string())
        .bind(session.status.to_string())
        .bind(session.last_seen.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, admin_id: &Uuid) -> Result<Option<AdminSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM admin_sessions WHERE admin_id = ?")
            .bind(admin_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row = AdminSessionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn list_online(&self) -> Result<Vec<AdminSession>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM admin_sessions WHERE status = 'online' ORDER BY admin_name",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                AdminSessionRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_session()
            })
            .collect()
    }

    async fn set_status(
        &self,
        admin_id: &Uuid,
        status: AdminStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE admin_sessions SET status = ?, last_seen = ? WHERE admin_id = ?",
        )
        .bind(status.to_string())
        .bind(at.to_rfc3339())
        .bind(admin_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn owned_count(&self, admin_id: &Uuid) -> Result<i64, RepositoryError> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM conversations WHERE owner_admin_id = ?")
                .bind(admin_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.try_get("n")
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }
}
