//! Audit log model.
//!
//! Append-only trail of mutations. Writes are best-effort: the services layer
//! logs and swallows failures so workflow correctness never depends on the
//! audit insert succeeding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted audit event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Email of the acting user.
    pub actor_email: String,
    /// Functional module the mutation belongs to.
    pub module: String,
    /// Table the mutated record lives in.
    pub table_name: String,
    /// Identifier of the mutated record.
    pub record_id: String,
    /// Action label, e.g. "approve", "reject", "close_task".
    pub action: String,
    /// State before the change (JSON).
    pub old_value: Option<serde_json::Value>,
    /// State after the change (JSON).
    pub new_value: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an audit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub actor_email: String,
    pub module: String,
    pub table_name: String,
    pub record_id: String,
    pub action: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub comment: Option<String>,
}

impl AuditLogEntry {
    /// Append an audit event.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: CreateAuditLogEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO audit_log (
                actor_email, module, table_name, record_id, action,
                old_value, new_value, comment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&input.actor_email)
        .bind(&input.module)
        .bind(&input.table_name)
        .bind(&input.record_id)
        .bind(&input.action)
        .bind(&input.old_value)
        .bind(&input.new_value)
        .bind(&input.comment)
        .fetch_one(pool)
        .await
    }

    /// List events for a record, newest first.
    pub async fn find_by_record(
        pool: &sqlx::PgPool,
        table_name: &str,
        record_id: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM audit_log
            WHERE table_name = $1 AND record_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(table_name)
        .bind(record_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
