//! Approval workflow configuration model.
//!
//! Plant-scoped approver routing: five ordered slots, each holding a single
//! approver id or a comma-separated pool. Slot strings are parsed once at the
//! boundary into [`ApproverPool`] values rather than re-split at every use.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A parsed approver slot: one or more approver identifiers.
///
/// Storage keeps the slot as a string like `"1827,1426"`; this type is the
/// in-memory form. Membership checks and iteration go through the set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverPool(BTreeSet<i64>);

impl ApproverPool {
    /// Parse a slot string into a pool.
    ///
    /// Whitespace around tokens is tolerated; empty and non-numeric tokens
    /// are skipped.
    pub fn parse(slot: &str) -> Self {
        let ids = slot
            .split(',')
            .filter_map(|token| token.trim().parse::<i64>().ok())
            .collect();
        Self(ids)
    }

    /// Whether the pool contains the given approver id.
    pub fn contains(&self, approver_id: i64) -> bool {
        self.0.contains(&approver_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate pool members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }

    /// The sole member, when the slot holds exactly one id.
    pub fn single(&self) -> Option<i64> {
        if self.0.len() == 1 {
            self.0.iter().next().copied()
        } else {
            None
        }
    }
}

/// Plant-scoped approval routing configuration.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Unique identifier for the workflow row.
    pub id: Uuid,

    /// Plant this routing applies to.
    pub plant_id: i64,

    /// Slot 1: the mandatory first approver (single id expected).
    pub approver1: String,

    /// Slot 2: the second-level pool, first member to act wins.
    pub approver2: Option<String>,

    /// Slots 3-5: reserved escalation/fallback routing.
    pub approver3: Option<String>,
    pub approver4: Option<String>,
    pub approver5: Option<String>,

    /// Only active rows participate in resolution.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalWorkflow {
    /// Find the active workflow for a plant.
    ///
    /// When multiple active rows exist the newest one wins; the ordering is
    /// explicit so precedence does not depend on insertion order.
    pub async fn find_active_for_plant(
        pool: &sqlx::PgPool,
        plant_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM approval_workflows
            WHERE plant_id = $1 AND is_active = true
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(plant_id)
        .fetch_optional(pool)
        .await
    }

    /// Parsed slot-1 pool.
    pub fn approver1_pool(&self) -> ApproverPool {
        ApproverPool::parse(&self.approver1)
    }

    /// Parsed slot-2 pool.
    pub fn approver2_pool(&self) -> ApproverPool {
        self.approver2
            .as_deref()
            .map(ApproverPool::parse)
            .unwrap_or_default()
    }
}
