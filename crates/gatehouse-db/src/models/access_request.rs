//! Access request model.
//!
//! The header row for a submission to grant, modify, or revoke a person's or
//! vendor's system access. Child work items live in `request_tasks`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

/// Overall status of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting one or both approvals.
    Pending,
    /// Both approvals granted and all tasks closed.
    Completed,
    /// Rejected by either approver.
    Rejected,
}

impl RequestStatus {
    /// Check if the request can still be actioned.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if the request is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

/// Per-slot approver decision status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approver_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApproverStatus {
    /// No decision recorded yet.
    Pending,
    Approved,
    Rejected,
}

/// Where the requester identity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "requester_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequesterSource {
    /// Internal employee; identity is the requester name.
    Employee,
    /// External vendor; identity is the vendor name.
    Vendor,
}

/// An access request header.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Unique identifier for the request.
    pub id: Uuid,

    /// Business identifier (RITM number) used by closure records.
    pub request_number: String,

    /// Display name of the person the access is for.
    pub requester_name: String,

    /// Contact email of the requester.
    pub requester_email: String,

    /// Vendor company name, when vendor-sourced.
    pub vendor_name: Option<String>,

    /// Employee or vendor origin.
    pub requester_source: RequesterSource,

    /// Access type label, e.g. "New User Creation" or "Modify Access".
    pub access_type: String,

    /// Overall request status.
    pub status: RequestStatus,

    /// Email of the level-1 approver stamped at creation.
    pub approver1_email: String,

    /// Level-1 decision status.
    pub approver1_status: ApproverStatus,

    /// Email of the pool member who decided at level 2, once decided.
    pub approver2_email: Option<String>,

    /// Level-2 decision status.
    pub approver2_status: ApproverStatus,

    /// Set when the request reaches completed.
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new access request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessRequest {
    pub request_number: String,
    pub requester_name: String,
    pub requester_email: String,
    pub vendor_name: Option<String>,
    pub requester_source: RequesterSource,
    pub access_type: String,
    pub approver1_email: String,
}

impl AccessRequest {
    /// Find a request by ID.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM access_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find a request by ID with a row lock.
    ///
    /// Every state-machine operation locks the header first so concurrent
    /// decisions on the same request serialize on this row.
    pub async fn find_by_id_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM access_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Create a new request inside a transaction.
    ///
    /// Starts pending with both approver slots pending.
    pub async fn create_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: CreateAccessRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO access_requests (
                request_number, requester_name, requester_email, vendor_name,
                requester_source, access_type, status,
                approver1_email, approver1_status, approver2_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, 'pending', 'pending')
            RETURNING *
            "#,
        )
        .bind(&input.request_number)
        .bind(&input.requester_name)
        .bind(&input.requester_email)
        .bind(&input.vendor_name)
        .bind(input.requester_source)
        .bind(&input.access_type)
        .bind(&input.approver1_email)
        .fetch_one(&mut **tx)
        .await
    }

    /// Record the level-1 approval. The request stays pending.
    pub async fn set_approver1_approved_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE access_requests
            SET approver1_status = 'approved', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Record the level-2 approval and complete the request.
    ///
    /// Conditional on the slot still being pending; returns `None` when
    /// another pool member already decided, so the caller can surface the
    /// race loss instead of overwriting the winner.
    pub async fn set_approver2_approved_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        approver2_email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE access_requests
            SET approver2_status = 'approved',
                approver2_email = $2,
                status = 'completed',
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND approver2_status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(approver2_email)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Record a rejection by the level-1 approver. Terminal.
    pub async fn set_approver1_rejected_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE access_requests
            SET approver1_status = 'rejected',
                status = 'rejected',
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Record a rejection by a level-2 pool member. Terminal.
    ///
    /// Conditional on the slot still being pending, same as approval.
    pub async fn set_approver2_rejected_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        approver2_email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE access_requests
            SET approver2_status = 'rejected',
                approver2_email = $2,
                status = 'rejected',
                updated_at = NOW()
            WHERE id = $1 AND approver2_status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(approver2_email)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Mark the request completed once every child task has closed.
    pub async fn set_completed_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE access_requests
            SET status = 'completed',
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }
}
