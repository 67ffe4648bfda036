//! Persistence layer for the Gatehouse access-approval platform.
//!
//! One module per entity, each exposing a `FromRow` struct, typed status
//! enums, fixed `Create*` input structs, and static async query methods
//! returning `sqlx::Error` for the services layer to wrap. State-machine
//! operations use the `*_in_tx` variants so the full cascade (request, tasks,
//! projections) commits or rolls back as one unit.

pub mod models;

pub use models::{
    AccessLogEntry, AccessRequest, ApplicationRef, ApprovalWorkflow, ApproverPool, ApproverRef,
    ApproverStatus, AuditLogEntry, ClosureRecord, CreateAccessLogEntry, CreateAccessRequest,
    CreateAuditLogEntry, CreateClosureRecord, CreateRequestTask, RequestStatus, RequestTask,
    RequesterSource, TaskStatus,
};
