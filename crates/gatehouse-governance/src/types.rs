//! Shared value types for the approval core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use gatehouse_db::{ApproverPool, RequesterSource, TaskStatus};

use crate::error::ConflictRule;

/// The authenticated principal acting on a request.
///
/// Passed explicitly into every state-machine operation; the core holds no
/// ambient per-request user context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActingUser {
    /// Directory identifier, matched against workflow pool slots.
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
    /// Plants the principal is scoped to. Empty means unrestricted.
    pub plant_scope: Vec<i64>,
}

impl ActingUser {
    /// Case-insensitive email comparison.
    pub fn email_matches(&self, other: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(other.trim())
    }
}

/// Normalize a requester identity for tuple matching.
///
/// Admission comparisons are case- and whitespace-insensitive on both sides.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Pick the identity admission checks match on: the vendor name for
/// vendor-sourced requests, the requester name otherwise.
pub fn requester_identity<'a>(
    source: RequesterSource,
    requester_name: &'a str,
    vendor_name: Option<&'a str>,
) -> &'a str {
    match source {
        RequesterSource::Vendor => vendor_name.unwrap_or(requester_name),
        RequesterSource::Employee => requester_name,
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionCheck {
    /// Whether the probe conflicts with live state.
    pub conflict: bool,
    /// The rule that fired, when conflicting.
    pub rule: Option<ConflictRule>,
    pub message: Option<String>,
    /// Matching entries still active (pending / approved / in progress).
    pub active_count: usize,
    /// Matching entries already closed.
    pub closed_count: usize,
}

impl AdmissionCheck {
    /// A clean, non-conflicting result.
    pub fn clear(active_count: usize, closed_count: usize) -> Self {
        Self {
            conflict: false,
            rule: None,
            message: None,
            active_count,
            closed_count,
        }
    }

    /// A conflicting result for the given rule.
    pub fn violation(rule: ConflictRule, active_count: usize, closed_count: usize) -> Self {
        Self {
            conflict: true,
            rule: Some(rule),
            message: Some(rule.message().to_string()),
            active_count,
            closed_count,
        }
    }
}

/// Outcome of a bulk-creation validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkValidation {
    pub valid: bool,
    pub rule: Option<ConflictRule>,
    pub message: Option<String>,
}

/// Resolved approver routing for a plant.
#[derive(Debug, Clone)]
pub struct ResolvedWorkflow {
    pub plant_id: i64,
    /// Slot-1 approver id.
    pub approver1_id: i64,
    pub approver1_email: String,
    pub approver1_name: String,
    /// Slot-2 candidate pool; first member to act wins.
    pub approver2_pool: ApproverPool,
    /// Notification targets for the pool, in pool order.
    pub approver2_emails: Vec<String>,
}

/// Which approver slot an actor occupies for a given request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproverRole {
    Approver1,
    Approver2,
}

/// Result of a decision operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub request_id: Uuid,
    /// Slot the decision was recorded against.
    pub decided_as: String,
    /// Overall request status after the decision.
    pub request_status: gatehouse_db::RequestStatus,
    /// Tasks the decision was mirrored onto.
    pub tasks_updated: u64,
}

/// One line item of a new request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestLine {
    #[validate(length(min = 1, max = 64))]
    pub task_number: String,
    pub application_id: i64,
    pub department_id: i64,
    pub role_id: i64,
    pub plant_id: i64,
}

/// Input for creating a request with its tasks.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAccessRequestInput {
    #[validate(length(min = 1, max = 64))]
    pub request_number: String,
    #[validate(length(min = 1, max = 255))]
    pub requester_name: String,
    #[validate(email)]
    pub requester_email: String,
    pub vendor_name: Option<String>,
    pub requester_source: RequesterSource,
    #[validate(length(min = 1, max = 128))]
    pub access_type: String,
    #[validate(length(min = 1), nested)]
    pub lines: Vec<RequestLine>,
}

/// Fulfilment detail supplied when closing a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseTaskInput {
    pub assignment_group: Option<String>,
    pub assigned_to: Option<String>,
    pub access_granted: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    /// Plaintext credential issued during fulfilment; hashed before storage,
    /// never persisted as supplied. `None` preserves a previously stored hash.
    pub credential: Option<String>,
}

/// Result of a task closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureOutcome {
    pub task_id: Uuid,
    pub task_status: TaskStatus,
    /// Whether the parent request cascaded to completed.
    pub request_completed: bool,
}
