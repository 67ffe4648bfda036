//! Read-only reference lookups.
//!
//! Master data (applications, approvers) is owned elsewhere; the approval core
//! only reads the handful of columns its rules need.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Application reference row: the columns the bulk-creation rule reads.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApplicationRef {
    pub id: i64,
    pub department_id: i64,
}

impl ApplicationRef {
    /// Look up the configured department for each application id.
    ///
    /// Unknown ids are simply absent from the result; the caller treats a
    /// missing row as a mismatch.
    pub async fn find_departments(
        pool: &sqlx::PgPool,
        application_ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, department_id FROM applications
            WHERE id = ANY($1)
            "#,
        )
        .bind(application_ids)
        .fetch_all(pool)
        .await
    }
}

/// Approver reference row: identity for a workflow slot id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApproverRef {
    pub id: i64,
    pub display_name: String,
    pub email: String,
}

impl ApproverRef {
    /// Look up approver identities for a set of slot ids.
    pub async fn find_by_ids(
        pool: &sqlx::PgPool,
        ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, display_name, email FROM approvers
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    /// Look up a single approver by id.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, display_name, email FROM approvers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
