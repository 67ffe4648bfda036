//! Shared fixtures for workflow tests.

#[cfg(feature = "integration")]
pub mod db;

use chrono::Utc;
use uuid::Uuid;

use gatehouse_db::{
    AccessLogEntry, AccessRequest, ApproverStatus, RequestStatus, RequesterSource, TaskStatus,
};
use gatehouse_governance::ActingUser;

/// A pending request with the given level-1 decision state.
pub fn pending_request(approver1_status: ApproverStatus) -> AccessRequest {
    AccessRequest {
        id: Uuid::new_v4(),
        request_number: "RITM0041776".to_string(),
        requester_name: "Alice Morgan".to_string(),
        requester_email: "alice.morgan@example.com".to_string(),
        vendor_name: None,
        requester_source: RequesterSource::Employee,
        access_type: "New User Creation".to_string(),
        status: RequestStatus::Pending,
        approver1_email: "plant.lead@example.com".to_string(),
        approver1_status,
        approver2_email: None,
        approver2_status: ApproverStatus::Pending,
        completed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// An acting user with the given directory id and email.
pub fn user(id: i64, email: &str) -> ActingUser {
    ActingUser {
        id,
        email: email.to_string(),
        display_name: format!("User {id}"),
        roles: vec!["approver".to_string()],
        plant_scope: vec![1],
    }
}

/// An access log row for the standard probe tuple
/// (plant 1, department 2, application 10, requester "alice").
pub fn log_entry(disposition: TaskStatus) -> AccessLogEntry {
    AccessLogEntry {
        id: Uuid::new_v4(),
        request_id: Uuid::new_v4(),
        task_id: Uuid::new_v4(),
        plant_id: 1,
        department_id: 2,
        application_id: 10,
        requester_name: "alice".to_string(),
        access_type: "New User Creation".to_string(),
        disposition,
        updated_on: Utc::now(),
    }
}
