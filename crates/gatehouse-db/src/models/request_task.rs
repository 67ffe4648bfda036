//! Request task model.
//!
//! One row per (application, department, role, plant) unit of work under an
//! access request. Approver decisions taken on the header are mirrored onto
//! every task so each line item carries its own sign-off trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

/// Status of a request task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Awaiting approvals.
    Pending,
    /// Both approvals granted; awaiting fulfilment.
    Approved,
    /// Rejected by either approver.
    Rejected,
    /// Fulfilment underway.
    InProgress,
    /// Fulfilled and closed.
    Closed,
    /// Fulfilled and closed (alternate terminal label kept for closure feeds).
    Completed,
}

impl TaskStatus {
    /// Terminal closed states that count toward request completion.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::Completed)
    }

    /// States that block a new request for the same tuple (in-flight).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::InProgress)
    }

    /// Wire label for the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::Completed => "completed",
        }
    }
}

/// A single unit of work under an access request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RequestTask {
    /// Unique identifier for the task.
    pub id: Uuid,

    /// Parent access request.
    pub request_id: Uuid,

    /// Business identifier (TASK number) used by closure records.
    pub task_number: String,

    /// Application the access is requested for.
    pub application_id: i64,

    /// Department the access is scoped to.
    pub department_id: i64,

    /// Role being granted.
    pub role_id: i64,

    /// Plant (location) the task belongs to; drives workflow resolution.
    pub plant_id: i64,

    /// Task status.
    pub task_status: TaskStatus,

    // Level-1 approver trail, mirrored from the header decision.
    pub approver1_name: Option<String>,
    pub approver1_email: Option<String>,
    pub approver1_action: Option<String>,
    pub approver1_action_at: Option<DateTime<Utc>>,
    pub approver1_comment: Option<String>,

    // Level-2 approver trail.
    pub approver2_name: Option<String>,
    pub approver2_email: Option<String>,
    pub approver2_action: Option<String>,
    pub approver2_action_at: Option<DateTime<Utc>>,
    pub approver2_comment: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task under a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequestTask {
    pub task_number: String,
    pub application_id: i64,
    pub department_id: i64,
    pub role_id: i64,
    pub plant_id: i64,
    /// Level-1 notification target stamped from the resolved workflow.
    pub approver1_email: Option<String>,
}

impl RequestTask {
    /// Find a task by ID.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM request_tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find a task by ID inside a transaction.
    pub async fn find_by_id_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM request_tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// List all tasks of a request inside a transaction, oldest first.
    pub async fn find_by_request_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM request_tasks
            WHERE request_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(&mut **tx)
        .await
    }

    /// Create a task under a request inside a transaction.
    pub async fn create_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Uuid,
        input: CreateRequestTask,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO request_tasks (
                request_id, task_number, application_id, department_id,
                role_id, plant_id, task_status, approver1_email
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(&input.task_number)
        .bind(input.application_id)
        .bind(input.department_id)
        .bind(input.role_id)
        .bind(input.plant_id)
        .bind(&input.approver1_email)
        .fetch_one(&mut **tx)
        .await
    }

    /// Mirror a level-1 decision onto every task of a request.
    pub async fn mirror_approver1_decision_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Uuid,
        name: &str,
        email: &str,
        action: &str,
        comment: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE request_tasks
            SET approver1_name = $2,
                approver1_email = $3,
                approver1_action = $4,
                approver1_action_at = NOW(),
                approver1_comment = $5,
                updated_at = NOW()
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .bind(name)
        .bind(email)
        .bind(action)
        .bind(comment)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Mirror a level-2 decision onto every task of a request.
    ///
    /// `new_status` is `Some` on approval (tasks move to approved) and on
    /// rejection (tasks move to rejected); the approver trail is stamped
    /// either way.
    pub async fn mirror_approver2_decision_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Uuid,
        name: &str,
        email: &str,
        action: &str,
        comment: Option<&str>,
        new_status: Option<TaskStatus>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE request_tasks
            SET approver2_name = $2,
                approver2_email = $3,
                approver2_action = $4,
                approver2_action_at = NOW(),
                approver2_comment = $5,
                task_status = COALESCE($6, task_status),
                updated_at = NOW()
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .bind(name)
        .bind(email)
        .bind(action)
        .bind(comment)
        .bind(new_status)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Set the status of all tasks of a request (header rejection path).
    pub async fn set_status_for_request_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Uuid,
        status: TaskStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE request_tasks
            SET task_status = $2, updated_at = NOW()
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .bind(status)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Set the status of a single task.
    pub async fn set_status_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE request_tasks
            SET task_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Count tasks of a request not yet in a closed terminal state.
    ///
    /// Used by the closure cascade: when this reaches zero the parent
    /// request transitions to completed.
    pub async fn count_open_for_request_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        request_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM request_tasks
            WHERE request_id = $1
              AND task_status NOT IN ('closed', 'completed')
            "#,
        )
        .bind(request_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Find in-flight tasks matching an admission probe (RULE_1).
    ///
    /// Joins to the parent request so requester identity can be matched:
    /// vendor name for vendor-sourced requests, requester name otherwise.
    /// Both sides of the comparison are lowercased and trimmed; the caller
    /// passes the probe already normalized.
    pub async fn find_in_flight_conflicts(
        pool: &sqlx::PgPool,
        plant_id: i64,
        department_id: i64,
        application_ids: &[i64],
        requester_normalized: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT t.* FROM request_tasks t
            JOIN access_requests r ON r.id = t.request_id
            WHERE t.plant_id = $1
              AND t.department_id = $2
              AND t.application_id = ANY($3)
              AND t.task_status IN ('pending', 'approved', 'in_progress')
              AND LOWER(TRIM(
                    CASE WHEN r.requester_source = 'vendor'
                         THEN COALESCE(r.vendor_name, '')
                         ELSE r.requester_name
                    END)) = $4
            "#,
        )
        .bind(plant_id)
        .bind(department_id)
        .bind(application_ids)
        .bind(requester_normalized)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_is_closed() {
        assert!(TaskStatus::Closed.is_closed());
        assert!(TaskStatus::Completed.is_closed());
        assert!(!TaskStatus::Approved.is_closed());
        assert!(!TaskStatus::Rejected.is_closed());
    }

    #[test]
    fn test_task_status_is_active() {
        assert!(TaskStatus::Pending.is_active());
        assert!(TaskStatus::Approved.is_active());
        assert!(TaskStatus::InProgress.is_active());
        assert!(!TaskStatus::Closed.is_active());
        assert!(!TaskStatus::Rejected.is_active());
    }

    #[test]
    fn test_task_status_wire_labels() {
        assert_eq!(TaskStatus::Closed.as_str(), "closed");
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn test_task_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
