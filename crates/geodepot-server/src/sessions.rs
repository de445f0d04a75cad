//! Upload session tracking
//!
//! One row per upload/replace attempt. Sessions record outcome and
//! diagnostics only; they are never deleted by the pipeline. The most
//! recently created session for a user is treated as the current one. This
//! is a heuristic, not a strict per-request identifier, so concurrent
//! uploads by the same user can misattribute diagnostics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Record of one upload/replace attempt's outcome and diagnostics
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UploadSession {
    pub id: Uuid,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
    pub error: Option<String>,
    pub traceback: Option<String>,
    pub diagnostic_log: Option<String>,
}

/// Open a new session row for an attempt, returning its id
pub async fn open(pool: &PgPool, user: &str) -> Result<Uuid, sqlx::Error> {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO upload_sessions (user_name) VALUES ($1) RETURNING id",
    )
    .bind(user)
    .fetch_one(pool)
    .await?;

    tracing::debug!(session_id = %id, user = %user, "upload session opened");
    Ok(id)
}

/// Mark a session as successfully processed
pub async fn mark_processed(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE upload_sessions SET processed = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record failure diagnostics on a session
pub async fn record_failure(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    traceback: &str,
    diagnostic_log: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE upload_sessions
        SET error = $2, traceback = $3, diagnostic_log = $4
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(error)
    .bind(traceback)
    .bind(diagnostic_log)
    .execute(pool)
    .await?;
    Ok(())
}

/// The most recently created session for a user, if any
pub async fn latest_for_user(
    pool: &PgPool,
    user: &str,
) -> Result<Option<UploadSession>, sqlx::Error> {
    sqlx::query_as::<_, UploadSession>(
        r#"
        SELECT id, user_name, created_at, processed, error, traceback, diagnostic_log
        FROM upload_sessions
        WHERE user_name = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test]
    async fn test_open_and_mark_processed(pool: PgPool) -> sqlx::Result<()> {
        let id = open(&pool, "alice").await?;
        mark_processed(&pool, id).await?;

        let session = latest_for_user(&pool, "alice").await?.unwrap();
        assert_eq!(session.id, id);
        assert!(session.processed);
        assert!(session.error.is_none());
        Ok(())
    }

    #[sqlx::test]
    async fn test_record_failure_attaches_diagnostics(pool: PgPool) -> sqlx::Result<()> {
        let id = open(&pool, "bob").await?;
        record_failure(&pool, id, "catalog rejected store", "chain: one\ntwo", "log tail").await?;

        let session = latest_for_user(&pool, "bob").await?.unwrap();
        assert!(!session.processed);
        assert_eq!(session.error.as_deref(), Some("catalog rejected store"));
        assert_eq!(session.traceback.as_deref(), Some("chain: one\ntwo"));
        assert_eq!(session.diagnostic_log.as_deref(), Some("log tail"));
        Ok(())
    }

    #[sqlx::test]
    async fn test_latest_for_user_picks_newest(pool: PgPool) -> sqlx::Result<()> {
        let first = open(&pool, "carol").await?;
        // Force distinct created_at values.
        sqlx::query(
            "UPDATE upload_sessions SET created_at = created_at - INTERVAL '1 minute' WHERE id = $1",
        )
        .bind(first)
        .execute(&pool)
        .await?;
        let second = open(&pool, "carol").await?;

        let session = latest_for_user(&pool, "carol").await?.unwrap();
        assert_eq!(session.id, second);

        assert!(latest_for_user(&pool, "nobody").await?.is_none());
        Ok(())
    }
}
