//! Admission rule evaluation over the access log projection.

mod common;

use common::log_entry;
use gatehouse_db::TaskStatus;
use gatehouse_governance::{evaluate_access_log, validate_bulk_shape, ConflictRule};

#[test]
fn new_user_creation_conflicts_with_prior_closed_grant() {
    // One closed entry for the tuple: a fresh "New User Creation" would
    // duplicate the grant.
    let entries = vec![log_entry(TaskStatus::Closed)];

    let check = evaluate_access_log("New User Creation", &entries);
    assert!(check.conflict);
    assert_eq!(check.rule, Some(ConflictRule::Rule3));

    // The same tuple is exactly what "Modify Access" needs.
    let check = evaluate_access_log("Modify Access", &entries);
    assert!(!check.conflict);
    assert!(check.rule.is_none());
}

#[test]
fn modify_access_requires_something_to_modify() {
    let check = evaluate_access_log("Modify Access", &[]);
    assert!(check.conflict);
    assert_eq!(check.rule, Some(ConflictRule::Rule2));
}

#[test]
fn active_entries_block_every_access_type() {
    for access_type in ["New User Creation", "Modify Access", "Revoke Access"] {
        let entries = vec![log_entry(TaskStatus::Closed), log_entry(TaskStatus::Pending)];
        let check = evaluate_access_log(access_type, &entries);
        assert!(check.conflict, "{access_type} must conflict on active entry");
        // New-user reports the duplicate grant first; the others report the
        // active entry.
        let expected = if access_type == "New User Creation" {
            ConflictRule::Rule3
        } else {
            ConflictRule::Rule4
        };
        assert_eq!(check.rule, Some(expected), "{access_type}");
    }
}

#[test]
fn rejected_history_does_not_block_resubmission() {
    let entries = vec![log_entry(TaskStatus::Rejected)];
    for access_type in ["New User Creation", "Revoke Access"] {
        let check = evaluate_access_log(access_type, &entries);
        assert!(!check.conflict, "{access_type}");
    }
}

#[test]
fn bulk_set_of_eight_is_rejected_regardless_of_departments() {
    let ids: Vec<i64> = (1..=8).collect();
    let invalid = validate_bulk_shape(&ids).expect("8 applications must be invalid");
    assert!(!invalid.valid);
    assert_eq!(invalid.rule, Some(ConflictRule::Rule6));
}

#[test]
fn bulk_set_boundaries() {
    assert!(validate_bulk_shape(&[]).is_some());
    assert!(validate_bulk_shape(&[1]).is_none());
    let seven: Vec<i64> = (1..=7).collect();
    assert!(validate_bulk_shape(&seven).is_none());
}
