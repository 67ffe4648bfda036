//! Closure record model.
//!
//! Operational detail of how a task was fulfilled: assignment group, assignee,
//! the access label granted, the validity window, and a one-way-hashed
//! credential. Keyed by business identifiers (RITM number, TASK number) so the
//! table can also absorb closures with no originating request task row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

/// A closure record row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClosureRecord {
    /// Unique identifier for the row.
    pub id: Uuid,

    /// Business request identifier (natural key, part 1).
    pub ritm_number: String,

    /// Business task identifier (natural key, part 2).
    pub task_number: String,

    /// Fulfilment group the task was assigned to.
    pub assignment_group: Option<String>,

    /// Person who fulfilled the task.
    pub assigned_to: Option<String>,

    /// Label of the access actually granted.
    pub access_granted: Option<String>,

    /// Start of the validity window.
    pub valid_from: Option<DateTime<Utc>>,

    /// End of the validity window.
    pub valid_to: Option<DateTime<Utc>>,

    /// One-way hash of the issued credential; never the plaintext.
    pub credential_hash: Option<String>,

    /// When the task was closed.
    pub closed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// Input for upserting a closure record.
///
/// `credential_hash` carries the already-hashed credential; hashing happens in
/// the closure service before this input is built. `None` preserves any hash
/// already stored for the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClosureRecord {
    pub ritm_number: String,
    pub task_number: String,
    pub assignment_group: Option<String>,
    pub assigned_to: Option<String>,
    pub access_granted: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub credential_hash: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ClosureRecord {
    /// Insert or update by (ritm_number, task_number) inside a transaction.
    ///
    /// Last write wins on all mutable fields except the credential hash,
    /// which is only replaced when a new one is supplied.
    pub async fn upsert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: CreateClosureRecord,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO closure_records (
                ritm_number, task_number, assignment_group, assigned_to,
                access_granted, valid_from, valid_to, credential_hash,
                closed_at, updated_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (ritm_number, task_number) DO UPDATE SET
                assignment_group = EXCLUDED.assignment_group,
                assigned_to = EXCLUDED.assigned_to,
                access_granted = EXCLUDED.access_granted,
                valid_from = EXCLUDED.valid_from,
                valid_to = EXCLUDED.valid_to,
                credential_hash = COALESCE(EXCLUDED.credential_hash,
                                           closure_records.credential_hash),
                closed_at = EXCLUDED.closed_at,
                updated_on = NOW()
            RETURNING *
            "#,
        )
        .bind(&input.ritm_number)
        .bind(&input.task_number)
        .bind(&input.assignment_group)
        .bind(&input.assigned_to)
        .bind(&input.access_granted)
        .bind(input.valid_from)
        .bind(input.valid_to)
        .bind(&input.credential_hash)
        .bind(input.closed_at)
        .fetch_one(&mut **tx)
        .await
    }

    /// Find a record by its natural key.
    pub async fn find_by_key(
        pool: &sqlx::PgPool,
        ritm_number: &str,
        task_number: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM closure_records
            WHERE ritm_number = $1 AND task_number = $2
            "#,
        )
        .bind(ritm_number)
        .bind(task_number)
        .fetch_optional(pool)
        .await
    }

    /// List records for a request, by RITM number.
    pub async fn find_by_ritm(
        pool: &sqlx::PgPool,
        ritm_number: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM closure_records
            WHERE ritm_number = $1
            ORDER BY task_number ASC
            "#,
        )
        .bind(ritm_number)
        .fetch_all(pool)
        .await
    }
}
