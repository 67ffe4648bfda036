//! Business logic services for the approval core.

pub mod admission_service;
pub mod approval_service;
pub mod closure_service;
pub mod request_service;
pub mod workflow_resolver;

pub use admission_service::{
    evaluate_access_log, evaluate_bulk_departments, validate_bulk_shape, AdmissionService,
    BULK_MAX_APPLICATIONS,
};
pub use approval_service::{classify_actor, ApprovalService};
pub use closure_service::ClosureService;
pub use request_service::{CreatedRequest, RequestService};
pub use workflow_resolver::WorkflowResolver;
