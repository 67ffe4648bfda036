//! Approval state machine and access-conflict resolution for Gatehouse.
//!
//! This crate is the core of the multi-plant access-approval platform: the
//! two-tier approver workflow (a stamped first approver, then a per-plant
//! pool of second approvers where the first to act wins), the pre-admission
//! conflict rules that gate new requests against in-flight and previously
//! granted access, and the cascading closure logic that keeps a request, its
//! child tasks, and the two downstream projections consistent.
//!
//! # Services
//!
//! - [`services::AdmissionService`] - read-only conflict checks (RULE_1-6)
//! - [`services::WorkflowResolver`] - per-plant approver routing
//! - [`services::RequestService`] - gated request + task creation
//! - [`services::ApprovalService`] - approve / reject / close-task transitions
//! - [`services::ClosureService`] - closure-record and access-log upserts
//!
//! # Transactionality
//!
//! Every state-machine operation runs its full cascade (request, tasks,
//! projections) in one transaction. Audit appends and notifications happen
//! after commit and are best-effort: failures there are logged and swallowed.

pub mod audit;
pub mod error;
pub mod notify;
pub mod services;
pub mod types;

pub use error::{ConflictRule, GovernanceError, Result};
pub use types::{
    ActingUser, AdmissionCheck, ApproverRole, BulkValidation, CloseTaskInput, ClosureOutcome,
    CreateAccessRequestInput, DecisionOutcome, RequestLine, ResolvedWorkflow,
};

pub use services::{
    classify_actor, evaluate_access_log, evaluate_bulk_departments, validate_bulk_shape,
    AdmissionService, ApprovalService, ClosureService, CreatedRequest, RequestService,
    WorkflowResolver, BULK_MAX_APPLICATIONS,
};

pub use audit::{AuditService, AuditStore, InMemoryAuditStore, PgAuditStore};
pub use notify::{DecisionNotice, LoggingNotifier, Notifier, RequestCreatedNotice};
