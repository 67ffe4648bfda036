//! Database models for Gatehouse.

pub mod access_log_entry;
pub mod access_request;
pub mod approval_workflow;
pub mod audit_log;
pub mod closure_record;
pub mod reference;
pub mod request_task;

pub use access_log_entry::{AccessLogEntry, CreateAccessLogEntry};
pub use access_request::{
    AccessRequest, ApproverStatus, CreateAccessRequest, RequestStatus, RequesterSource,
};
pub use approval_workflow::{ApprovalWorkflow, ApproverPool};
pub use audit_log::{AuditLogEntry, CreateAuditLogEntry};
pub use closure_record::{ClosureRecord, CreateClosureRecord};
pub use reference::{ApplicationRef, ApproverRef};
pub use request_task::{CreateRequestTask, RequestTask, TaskStatus};
