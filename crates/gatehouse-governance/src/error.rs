//! Error types for the approval core.

use thiserror::Error;
use uuid::Uuid;

/// Named business rules that gate request admission.
///
/// Rule ids are part of the client contract and travel with every conflict
/// error. RULE_5 is reserved by the historical numbering; no admission path
/// emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConflictRule {
    /// An in-flight request already covers the tuple.
    Rule1,
    /// Modify requested but no prior grant exists to modify.
    Rule2,
    /// New-user creation would duplicate an existing grant.
    Rule3,
    /// An active (undecided or in-fulfilment) entry covers the tuple.
    Rule4,
    /// Reserved.
    Rule5,
    /// Bulk set is empty, oversized, or crosses departments.
    Rule6,
}

impl ConflictRule {
    /// Wire identifier for the rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule1 => "RULE_1",
            Self::Rule2 => "RULE_2",
            Self::Rule3 => "RULE_3",
            Self::Rule4 => "RULE_4",
            Self::Rule5 => "RULE_5",
            Self::Rule6 => "RULE_6",
        }
    }

    /// Canonical user-facing message for the rule.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Rule1 => "An in-flight request already exists for this access",
            Self::Rule2 => "No existing access found to modify",
            Self::Rule3 => "Access has already been granted for this request",
            Self::Rule4 => "An active request or grant already covers this access",
            Self::Rule5 => "Reserved rule",
            Self::Rule6 => "Bulk creation set is invalid",
        }
    }
}

impl std::fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the approval core.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Bad input; no mutation occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rejections must carry a comment.
    #[error("Comments are required when rejecting a request")]
    RejectionCommentsRequired,

    /// An admission rule fired; carries the rule id and message.
    #[error("{rule}: {message}")]
    Conflict {
        rule: ConflictRule,
        message: String,
    },

    /// Actor is neither the level-1 approver nor an eligible pool member.
    #[error("User is not an authorized approver for this request")]
    NotAuthorizedApprover,

    /// A pool member acted before the level-1 approval.
    #[error("Second-level approval requires the first-level approval first")]
    ApprovalOrderViolation,

    /// Another pool member already decided the second-level slot.
    #[error("The second-level approval has already been decided")]
    AlreadyDecided,

    /// The actor is the requester of the request being decided.
    #[error("Approvers cannot decide their own request")]
    SelfApprovalNotAllowed,

    /// The request is already in a terminal state.
    #[error("Request is not pending")]
    RequestNotPending,

    /// Request id not found.
    #[error("Access request not found: {0}")]
    RequestNotFound(Uuid),

    /// Task id not found.
    #[error("Request task not found: {0}")]
    TaskNotFound(Uuid),

    /// No active workflow row for the plant.
    #[error("No active approval workflow configured for plant {0}")]
    WorkflowNotConfigured(i64),

    /// Active workflow row exists but its slots are unusable.
    #[error("Approval workflow misconfigured: {0}")]
    WorkflowMisconfigured(String),

    /// Unparseable task status label.
    #[error("Invalid task status: {0}")]
    InvalidTaskStatus(String),

    /// Closing a task before both approvals are granted.
    #[error("Task cannot be closed before both approvals are granted")]
    TaskClosureNotApproved,

    /// Unexpected storage failure; the enclosing transaction rolled back.
    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl GovernanceError {
    /// Whether this error maps to a not-found response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RequestNotFound(_) | Self::TaskNotFound(_))
    }

    /// Whether this error maps to a conflict response.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyDecided)
    }

    /// Whether this error maps to a forbidden response.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::NotAuthorizedApprover
                | Self::ApprovalOrderViolation
                | Self::SelfApprovalNotAllowed
                | Self::TaskClosureNotApproved
        )
    }

    /// Build a conflict error carrying the rule's canonical message.
    pub fn conflict(rule: ConflictRule) -> Self {
        Self::Conflict {
            rule,
            message: rule.message().to_string(),
        }
    }
}

/// Result type for approval-core operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;
