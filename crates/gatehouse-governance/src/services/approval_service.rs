//! Approval state machine.
//!
//! Owns the two-tier decision flow on a request (approver1, then one member
//! of the plant's approver2 pool), the mirroring of each decision onto every
//! child task, and the closure cascade that completes the parent once all
//! tasks reach a terminal state. Every operation locks the request header and
//! runs its full cascade in one transaction: it commits whole or not at all.
//!
//! The "first pool member wins" rule is enforced with the row lock plus a
//! conditional update on the approver2 slot, so of k concurrent pool members
//! exactly one succeeds and the rest see `AlreadyDecided`.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use gatehouse_db::{
    AccessLogEntry, AccessRequest, ApproverPool, ApproverStatus, CreateAuditLogEntry,
    RequestStatus, RequestTask, TaskStatus,
};

use crate::audit::{AuditService, PgAuditStore};
use crate::error::{GovernanceError, Result};
use crate::notify::{fire_decision, DecisionNotice, LoggingNotifier, Notifier};
use crate::services::closure_service::ClosureService;
use crate::services::workflow_resolver::WorkflowResolver;
use crate::types::{ActingUser, ApproverRole, CloseTaskInput, ClosureOutcome, DecisionOutcome};

/// Service owning request and task approval transitions.
pub struct ApprovalService {
    pool: PgPool,
    resolver: WorkflowResolver,
    closure: ClosureService,
    audit: AuditService,
    notifier: Arc<dyn Notifier>,
}

impl ApprovalService {
    /// Create a service with the default collaborators (Postgres audit store,
    /// logging notifier).
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_collaborators(
            pool.clone(),
            AuditService::new(Arc::new(PgAuditStore::new(pool))),
            Arc::new(LoggingNotifier),
        )
    }

    /// Create a service with injected audit and notification backends.
    #[must_use]
    pub fn with_collaborators(
        pool: PgPool,
        audit: AuditService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver: WorkflowResolver::new(pool.clone()),
            closure: ClosureService::new(pool.clone()),
            audit,
            notifier,
            pool,
        }
    }

    /// Approve a request as either approver level.
    ///
    /// Approver1 approval records the level-1 decision and leaves the request
    /// pending. Approver2 approval completes the request, stamps the winning
    /// pool member's identity, and moves every task to approved.
    #[instrument(skip(self, acting_user, comments))]
    pub async fn approve(
        &self,
        request_id: Uuid,
        acting_user: &ActingUser,
        comments: Option<String>,
    ) -> Result<DecisionOutcome> {
        let mut tx = self.pool.begin().await?;

        let request = AccessRequest::find_by_id_for_update(&mut tx, request_id)
            .await?
            .ok_or(GovernanceError::RequestNotFound(request_id))?;

        if !request.status.is_pending() {
            return Err(GovernanceError::RequestNotPending);
        }

        let tasks = RequestTask::find_by_request_in_tx(&mut tx, request_id).await?;
        let pool2 = self.approver2_pool_for(&tasks).await?;
        let role = classify_actor(&request, acting_user, &pool2)?;

        let outcome = match role {
            ApproverRole::Approver1 => {
                AccessRequest::set_approver1_approved_in_tx(&mut tx, request_id)
                    .await?
                    .ok_or(GovernanceError::RequestNotFound(request_id))?;

                let updated = RequestTask::mirror_approver1_decision_in_tx(
                    &mut tx,
                    request_id,
                    &acting_user.display_name,
                    &acting_user.email,
                    "approved",
                    comments.as_deref(),
                )
                .await?;

                DecisionOutcome {
                    request_id,
                    decided_as: "approver1".to_string(),
                    request_status: RequestStatus::Pending,
                    tasks_updated: updated,
                }
            }
            ApproverRole::Approver2 => {
                // Conditional write: None means another pool member won.
                AccessRequest::set_approver2_approved_in_tx(
                    &mut tx,
                    request_id,
                    &acting_user.email,
                )
                .await?
                .ok_or(GovernanceError::AlreadyDecided)?;

                let updated = RequestTask::mirror_approver2_decision_in_tx(
                    &mut tx,
                    request_id,
                    &acting_user.display_name,
                    &acting_user.email,
                    "approved",
                    comments.as_deref(),
                    Some(TaskStatus::Approved),
                )
                .await?;
                AccessLogEntry::set_disposition_for_request_in_tx(
                    &mut tx,
                    request_id,
                    TaskStatus::Approved,
                )
                .await?;

                DecisionOutcome {
                    request_id,
                    decided_as: "approver2".to_string(),
                    request_status: RequestStatus::Completed,
                    tasks_updated: updated,
                }
            }
        };

        tx.commit().await?;

        self.audit_decision(&request, &tasks, acting_user, "approve", comments.as_deref())
            .await;
        fire_decision(
            self.notifier.as_ref(),
            DecisionNotice {
                request_id,
                request_number: request.request_number.clone(),
                decision: "approved".to_string(),
                decided_as: outcome.decided_as.clone(),
                decided_by: acting_user.email.clone(),
                comments,
            },
        )
        .await;

        Ok(outcome)
    }

    /// Reject a request as either approver level. Terminal.
    ///
    /// Comments are mandatory regardless of role and are checked before any
    /// read so an empty comment never touches the store.
    #[instrument(skip(self, acting_user, comments))]
    pub async fn reject(
        &self,
        request_id: Uuid,
        acting_user: &ActingUser,
        comments: String,
    ) -> Result<DecisionOutcome> {
        if comments.trim().is_empty() {
            return Err(GovernanceError::RejectionCommentsRequired);
        }

        let mut tx = self.pool.begin().await?;

        let request = AccessRequest::find_by_id_for_update(&mut tx, request_id)
            .await?
            .ok_or(GovernanceError::RequestNotFound(request_id))?;

        if !request.status.is_pending() {
            return Err(GovernanceError::RequestNotPending);
        }

        let tasks = RequestTask::find_by_request_in_tx(&mut tx, request_id).await?;
        let pool2 = self.approver2_pool_for(&tasks).await?;
        let role = classify_actor(&request, acting_user, &pool2)?;

        let outcome = match role {
            ApproverRole::Approver1 => {
                AccessRequest::set_approver1_rejected_in_tx(&mut tx, request_id)
                    .await?
                    .ok_or(GovernanceError::RequestNotFound(request_id))?;

                RequestTask::mirror_approver1_decision_in_tx(
                    &mut tx,
                    request_id,
                    &acting_user.display_name,
                    &acting_user.email,
                    "rejected",
                    Some(comments.as_str()),
                )
                .await?;
                let updated = RequestTask::set_status_for_request_in_tx(
                    &mut tx,
                    request_id,
                    TaskStatus::Rejected,
                )
                .await?;
                AccessLogEntry::set_disposition_for_request_in_tx(
                    &mut tx,
                    request_id,
                    TaskStatus::Rejected,
                )
                .await?;

                DecisionOutcome {
                    request_id,
                    decided_as: "approver1".to_string(),
                    request_status: RequestStatus::Rejected,
                    tasks_updated: updated,
                }
            }
            ApproverRole::Approver2 => {
                AccessRequest::set_approver2_rejected_in_tx(
                    &mut tx,
                    request_id,
                    &acting_user.email,
                )
                .await?
                .ok_or(GovernanceError::AlreadyDecided)?;

                let updated = RequestTask::mirror_approver2_decision_in_tx(
                    &mut tx,
                    request_id,
                    &acting_user.display_name,
                    &acting_user.email,
                    "rejected",
                    Some(comments.as_str()),
                    Some(TaskStatus::Rejected),
                )
                .await?;
                AccessLogEntry::set_disposition_for_request_in_tx(
                    &mut tx,
                    request_id,
                    TaskStatus::Rejected,
                )
                .await?;

                DecisionOutcome {
                    request_id,
                    decided_as: "approver2".to_string(),
                    request_status: RequestStatus::Rejected,
                    tasks_updated: updated,
                }
            }
        };

        tx.commit().await?;

        self.audit_decision(&request, &tasks, acting_user, "reject", Some(comments.as_str()))
            .await;
        fire_decision(
            self.notifier.as_ref(),
            DecisionNotice {
                request_id,
                request_number: request.request_number.clone(),
                decision: "rejected".to_string(),
                decided_as: outcome.decided_as.clone(),
                decided_by: acting_user.email.clone(),
                comments: Some(comments),
            },
        )
        .await;

        Ok(outcome)
    }

    /// Move a task to a new status and synchronize the closure projections.
    ///
    /// Only fulfilment statuses are accepted here: in progress, closed, or
    /// completed. Approval and rejection go through the decision paths.
    /// Terminal statuses (closed / completed) are refused until both approver
    /// slots on the parent request are approved. On success the task status,
    /// the closure record, and the access log entry are written in one
    /// transaction; when the last open task closes, the parent request
    /// cascades to completed.
    #[instrument(skip(self, acting_user, input))]
    pub async fn close_task(
        &self,
        task_id: Uuid,
        new_status: TaskStatus,
        acting_user: &ActingUser,
        input: CloseTaskInput,
    ) -> Result<ClosureOutcome> {
        if !matches!(
            new_status,
            TaskStatus::InProgress | TaskStatus::Closed | TaskStatus::Completed
        ) {
            return Err(GovernanceError::InvalidTaskStatus(
                new_status.as_str().to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let task = RequestTask::find_by_id_in_tx(&mut tx, task_id)
            .await?
            .ok_or(GovernanceError::TaskNotFound(task_id))?;

        let request = AccessRequest::find_by_id_for_update(&mut tx, task.request_id)
            .await?
            .ok_or(GovernanceError::RequestNotFound(task.request_id))?;

        if new_status.is_closed()
            && !(request.approver1_status == ApproverStatus::Approved
                && request.approver2_status == ApproverStatus::Approved)
        {
            return Err(GovernanceError::TaskClosureNotApproved);
        }

        let task = RequestTask::set_status_in_tx(&mut tx, task_id, new_status)
            .await?
            .ok_or(GovernanceError::TaskNotFound(task_id))?;

        self.closure
            .upsert_closure_in_tx(
                &mut tx,
                &request.request_number,
                &task.task_number,
                new_status,
                &input,
            )
            .await?;
        self.closure
            .upsert_access_log_in_tx(&mut tx, &request, &task, new_status)
            .await?;

        let mut request_completed = false;
        if new_status.is_closed() && request.status.is_pending() {
            let open = RequestTask::count_open_for_request_in_tx(&mut tx, request.id).await?;
            if open == 0 {
                AccessRequest::set_completed_in_tx(&mut tx, request.id)
                    .await?
                    .ok_or(GovernanceError::RequestNotFound(request.id))?;
                request_completed = true;
            }
        }

        tx.commit().await?;

        self.audit
            .append(CreateAuditLogEntry {
                actor_email: acting_user.email.clone(),
                module: "approvals".to_string(),
                table_name: "request_tasks".to_string(),
                record_id: task.task_number.clone(),
                action: "close_task".to_string(),
                old_value: None,
                new_value: serde_json::to_value(new_status).ok(),
                comment: None,
            })
            .await;

        Ok(ClosureOutcome {
            task_id,
            task_status: new_status,
            request_completed,
        })
    }

    /// Resolve the approver2 pool for a request's tasks.
    ///
    /// All tasks of a request share a plant, so routing comes from the first
    /// task's plant.
    async fn approver2_pool_for(&self, tasks: &[RequestTask]) -> Result<ApproverPool> {
        match tasks.first() {
            Some(task) => {
                let resolved = self.resolver.resolve(task.plant_id).await?;
                Ok(resolved.approver2_pool)
            }
            // A request with no tasks cannot route to a pool; only the
            // stamped approver1 email can act on it.
            None => Ok(ApproverPool::default()),
        }
    }

    /// Best-effort audit entries for a decision: one for the request and one
    /// per affected task.
    async fn audit_decision(
        &self,
        request: &AccessRequest,
        tasks: &[RequestTask],
        acting_user: &ActingUser,
        action: &str,
        comments: Option<&str>,
    ) {
        self.audit
            .append(CreateAuditLogEntry {
                actor_email: acting_user.email.clone(),
                module: "approvals".to_string(),
                table_name: "access_requests".to_string(),
                record_id: request.request_number.clone(),
                action: action.to_string(),
                old_value: serde_json::to_value(request.status).ok(),
                new_value: None,
                comment: comments.map(str::to_string),
            })
            .await;

        for task in tasks {
            self.audit
                .append(CreateAuditLogEntry {
                    actor_email: acting_user.email.clone(),
                    module: "approvals".to_string(),
                    table_name: "request_tasks".to_string(),
                    record_id: task.task_number.clone(),
                    action: action.to_string(),
                    old_value: serde_json::to_value(task.task_status).ok(),
                    new_value: None,
                    comment: comments.map(str::to_string),
                })
                .await;
        }
    }
}

/// Classify the acting user against a pending request.
///
/// The requester can never decide their own request, whatever slot they
/// would otherwise occupy. Approver1 is matched by email against the stamped
/// `approver1_email`, case-insensitively. Anyone else must be a member of the
/// resolved approver2 pool; a pool member acting before the level-1 approval
/// is an ordering violation, and a pool member acting on an already-decided
/// slot lost the pool race.
pub fn classify_actor(
    request: &AccessRequest,
    acting_user: &ActingUser,
    approver2_pool: &ApproverPool,
) -> Result<ApproverRole> {
    if acting_user.email_matches(&request.requester_email) {
        return Err(GovernanceError::SelfApprovalNotAllowed);
    }

    if acting_user.email_matches(&request.approver1_email) {
        return Ok(ApproverRole::Approver1);
    }

    if !approver2_pool.contains(acting_user.id) {
        return Err(GovernanceError::NotAuthorizedApprover);
    }

    if request.approver1_status != ApproverStatus::Approved {
        return Err(GovernanceError::ApprovalOrderViolation);
    }

    if request.approver2_status != ApproverStatus::Pending {
        return Err(GovernanceError::AlreadyDecided);
    }

    Ok(ApproverRole::Approver2)
}
