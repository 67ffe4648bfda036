//! Request admission checks.
//!
//! Gates a prospective request against live state before anything is
//! persisted: in-flight tasks (RULE_1), the access log projection (RULE_2,
//! RULE_3, RULE_4), and bulk-creation shape (RULE_6). All checks are read-only
//! and non-locking; two concurrent admissions for the same tuple can both pass
//! and both insert. That race is accepted (optimistic, detect-on-read) and the
//! downstream projections reconcile it through natural-key upserts.

use sqlx::PgPool;
use tracing::instrument;

use gatehouse_db::{AccessLogEntry, ApplicationRef, RequestTask, TaskStatus};

use crate::error::{ConflictRule, Result};
use crate::types::{normalize_identity, AdmissionCheck, BulkValidation};

/// Access types that create a brand-new grant.
const NEW_USER_ACCESS_TYPES: &[&str] = &["New User Creation", "Bulk New User Creation"];

/// Access type that modifies an existing grant.
const MODIFY_ACCESS_TYPE: &str = "Modify Access";

/// Largest application set a bulk creation may carry.
pub const BULK_MAX_APPLICATIONS: usize = 7;

/// Read-only admission checks consulted before request creation.
pub struct AdmissionService {
    pool: PgPool,
}

impl AdmissionService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// RULE_1: detect an in-flight request covering the same tuple.
    ///
    /// A conflict exists when any task joined to its request matches plant,
    /// department, and any probed application id for the same requester
    /// identity, with the task still active (pending / approved / in
    /// progress). Identity matching is case- and whitespace-insensitive.
    #[instrument(skip(self))]
    pub async fn check_in_flight(
        &self,
        plant_id: i64,
        department_id: i64,
        application_ids: &[i64],
        requester_identity: &str,
        _access_type: &str,
    ) -> Result<AdmissionCheck> {
        let probe = normalize_identity(requester_identity);
        let matches = RequestTask::find_in_flight_conflicts(
            &self.pool,
            plant_id,
            department_id,
            application_ids,
            &probe,
        )
        .await?;

        if matches.is_empty() {
            Ok(AdmissionCheck::clear(0, 0))
        } else {
            Ok(AdmissionCheck::violation(ConflictRule::Rule1, matches.len(), 0))
        }
    }

    /// RULE_2 / RULE_3 / RULE_4: evaluate the access log projection.
    #[instrument(skip(self))]
    pub async fn check_access_log(
        &self,
        plant_id: i64,
        department_id: i64,
        application_ids: &[i64],
        requester_identity: &str,
        access_type: &str,
    ) -> Result<AdmissionCheck> {
        let probe = normalize_identity(requester_identity);
        let entries = AccessLogEntry::find_for_tuple(
            &self.pool,
            plant_id,
            department_id,
            application_ids,
            &probe,
        )
        .await?;

        Ok(evaluate_access_log(access_type, &entries))
    }

    /// RULE_6: validate a bulk-creation application set.
    ///
    /// The set must be non-empty, at most [`BULK_MAX_APPLICATIONS`] long, and
    /// every application must belong to the requested department. The size
    /// checks run before the department lookup so an oversized set fails
    /// regardless of department correctness.
    #[instrument(skip(self))]
    pub async fn validate_bulk_creation(
        &self,
        _plant_id: i64,
        department_id: i64,
        application_ids: &[i64],
    ) -> Result<BulkValidation> {
        if let Some(invalid) = validate_bulk_shape(application_ids) {
            return Ok(invalid);
        }

        let refs = ApplicationRef::find_departments(&self.pool, application_ids).await?;
        Ok(evaluate_bulk_departments(department_id, application_ids, &refs))
    }
}

/// Shape checks for a bulk application set; `None` means the shape is fine.
pub fn validate_bulk_shape(application_ids: &[i64]) -> Option<BulkValidation> {
    if application_ids.is_empty() {
        return Some(BulkValidation {
            valid: false,
            rule: Some(ConflictRule::Rule6),
            message: Some("Bulk creation requires at least one application".to_string()),
        });
    }
    if application_ids.len() > BULK_MAX_APPLICATIONS {
        return Some(BulkValidation {
            valid: false,
            rule: Some(ConflictRule::Rule6),
            message: Some(format!(
                "Bulk creation allows at most {BULK_MAX_APPLICATIONS} applications, got {}",
                application_ids.len()
            )),
        });
    }
    None
}

/// Pure department-membership check over looked-up application rows.
///
/// Every probed application must appear in `refs` under the requested
/// department; an id missing from `refs` is unknown and counts as a mismatch.
pub fn evaluate_bulk_departments(
    department_id: i64,
    application_ids: &[i64],
    refs: &[ApplicationRef],
) -> BulkValidation {
    for &app_id in application_ids {
        let matches = refs
            .iter()
            .any(|r| r.id == app_id && r.department_id == department_id);
        if !matches {
            return BulkValidation {
                valid: false,
                rule: Some(ConflictRule::Rule6),
                message: Some(format!(
                    "Application {app_id} does not belong to department {department_id}"
                )),
            };
        }
    }

    BulkValidation {
        valid: true,
        rule: None,
        message: None,
    }
}

/// Whether the access type creates a brand-new grant.
pub(crate) fn is_new_user_access(access_type: &str) -> bool {
    NEW_USER_ACCESS_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(access_type.trim()))
}

/// Whether the access type modifies an existing grant.
pub(crate) fn is_modify_access(access_type: &str) -> bool {
    MODIFY_ACCESS_TYPE.eq_ignore_ascii_case(access_type.trim())
}

/// Pure evaluation of the access-log rules over fetched projection rows.
///
/// - Modify Access: fails RULE_2 when no closed entry exists to modify, and
///   RULE_4 when an active entry exists. The active check runs first so a
///   tuple with both an active and a closed entry reports RULE_4.
/// - New / Bulk New User Creation: fails RULE_3 on any closed entry
///   (duplicate grant), RULE_4 on any active entry. The closed check runs
///   first, matching the source evaluation order.
/// - Any other access type: RULE_4 only.
pub fn evaluate_access_log(access_type: &str, entries: &[AccessLogEntry]) -> AdmissionCheck {
    let active = entries.iter().filter(|e| e.disposition.is_active()).count();
    let closed = entries
        .iter()
        .filter(|e| matches!(e.disposition, TaskStatus::Closed | TaskStatus::Completed))
        .count();

    if is_modify_access(access_type) {
        if active > 0 {
            return AdmissionCheck::violation(ConflictRule::Rule4, active, closed);
        }
        if closed == 0 {
            return AdmissionCheck::violation(ConflictRule::Rule2, active, closed);
        }
        return AdmissionCheck::clear(active, closed);
    }

    if is_new_user_access(access_type) {
        if closed > 0 {
            return AdmissionCheck::violation(ConflictRule::Rule3, active, closed);
        }
        if active > 0 {
            return AdmissionCheck::violation(ConflictRule::Rule4, active, closed);
        }
        return AdmissionCheck::clear(active, closed);
    }

    if active > 0 {
        return AdmissionCheck::violation(ConflictRule::Rule4, active, closed);
    }
    AdmissionCheck::clear(active, closed)
}
