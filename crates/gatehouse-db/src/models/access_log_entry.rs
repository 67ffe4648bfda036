//! Access log projection model.
//!
//! Durable projection of the latest disposition of a (plant, department,
//! application, requester) tuple. Admission checks read this table to detect
//! duplicate or conflicting grants; the closure path upserts it on every
//! disposition change, keyed by (request_id, task_id) so repeated closures
//! update rather than duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use super::TaskStatus;

/// A projected access disposition row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Unique identifier for the row.
    pub id: Uuid,

    /// Originating request (natural key, part 1).
    pub request_id: Uuid,

    /// Originating task (natural key, part 2).
    pub task_id: Uuid,

    pub plant_id: i64,
    pub department_id: i64,
    pub application_id: i64,

    /// Normalized requester identity (vendor name when vendor-sourced).
    pub requester_name: String,

    /// Access type of the originating request.
    pub access_type: String,

    /// Latest disposition of the task.
    pub disposition: TaskStatus,

    pub updated_on: DateTime<Utc>,
}

/// Input for upserting an access log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessLogEntry {
    pub request_id: Uuid,
    pub task_id: Uuid,
    pub plant_id: i64,
    pub department_id: i64,
    pub application_id: i64,
    pub requester_name: String,
    pub access_type: String,
    pub disposition: TaskStatus,
}

impl AccessLogEntry {
    /// Insert or update by (request_id, task_id) inside a transaction.
    ///
    /// Last write wins on every mutable field. Runs synchronously within the
    /// closure transaction because admission decisions read this table.
    pub async fn upsert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: CreateAccessLogEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO access_log_entries (
                request_id, task_id, plant_id, department_id, application_id,
                requester_name, access_type, disposition, updated_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (request_id, task_id) DO UPDATE SET
                plant_id = EXCLUDED.plant_id,
                department_id = EXCLUDED.department_id,
                application_id = EXCLUDED.application_id,
                requester_name = EXCLUDED.requester_name,
                access_type = EXCLUDED.access_type,
                disposition = EXCLUDED.disposition,
                updated_on = NOW()
            RETURNING *
            "#,
        )
        .bind(input.request_id)
        .bind(input.task_id)
        .bind(input.plant_id)
        .bind(input.department_id)
        .bind(input.application_id)
        .bind(&input.requester_name)
        .bind(&input.access_type)
        .bind(input.disposition)
        .fetch_one(&mut **tx)
        .await
    }

    /// Refresh the disposition of every entry projected from a request's
    /// tasks.
    ///
    /// Header decisions move all child tasks at once; entries that were
    /// already projected (a task touched through the closure path before the
    /// decision landed) must follow, or a stale active disposition would keep
    /// blocking the tuple after its request died.
    pub async fn set_disposition_for_request_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Uuid,
        disposition: TaskStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE access_log_entries
            SET disposition = $2, updated_on = NOW()
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .bind(disposition)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Find entries matching an admission probe tuple.
    ///
    /// The requester probe is passed already lowercased and trimmed; the
    /// stored side is normalized in SQL so historic rows with stray casing
    /// still match.
    pub async fn find_for_tuple(
        pool: &sqlx::PgPool,
        plant_id: i64,
        department_id: i64,
        application_ids: &[i64],
        requester_normalized: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM access_log_entries
            WHERE plant_id = $1
              AND department_id = $2
              AND application_id = ANY($3)
              AND LOWER(TRIM(requester_name)) = $4
            "#,
        )
        .bind(plant_id)
        .bind(department_id)
        .bind(application_ids)
        .bind(requester_normalized)
        .fetch_all(pool)
        .await
    }

    /// Find an entry by its natural key.
    pub async fn find_by_key(
        pool: &sqlx::PgPool,
        request_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM access_log_entries
            WHERE request_id = $1 AND task_id = $2
            "#,
        )
        .bind(request_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }
}
