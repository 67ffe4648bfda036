//! Request creation.
//!
//! Runs the admission gate, resolves the plant workflow, and persists the
//! request header with its tasks as one pending unit. Notification and audit
//! happen after commit and are best-effort.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use gatehouse_db::{
    AccessRequest, CreateAccessRequest, CreateAuditLogEntry, CreateRequestTask, RequestTask,
};

use crate::audit::{AuditService, PgAuditStore};
use crate::error::{GovernanceError, Result};
use crate::notify::{fire_request_created, LoggingNotifier, Notifier, RequestCreatedNotice};
use crate::services::admission_service::{is_new_user_access, AdmissionService};
use crate::services::workflow_resolver::WorkflowResolver;
use crate::types::{requester_identity, ActingUser, CreateAccessRequestInput};

/// The request and its tasks as persisted.
#[derive(Debug, Clone)]
pub struct CreatedRequest {
    pub request: AccessRequest,
    pub tasks: Vec<RequestTask>,
}

/// Service creating access requests behind the admission gate.
pub struct RequestService {
    pool: PgPool,
    admission: AdmissionService,
    resolver: WorkflowResolver,
    audit: AuditService,
    notifier: Arc<dyn Notifier>,
}

impl RequestService {
    /// Create a service with the default collaborators.
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
            admission: AdmissionService::new(pool.clone()),
            resolver: WorkflowResolver::new(pool.clone()),
            audit,
            notifier,
            pool,
        }
    }

    /// Create a request with its tasks after passing the admission gate.
    ///
    /// All lines must share one plant, since approval routing is plant
    /// scoped. Lines are checked per department group: in-flight conflicts,
    /// access-log rules, and (for bulk creation types) the bulk shape rule.
    /// Header and tasks insert in one transaction, all stamped pending with
    /// the resolved approver1 as the notification target.
    #[instrument(skip(self, acting_user, input), fields(request = %input.request_number))]
    pub async fn create_request(
        &self,
        acting_user: &ActingUser,
        input: CreateAccessRequestInput,
    ) -> Result<CreatedRequest> {
        input
            .validate()
            .map_err(|e| GovernanceError::Validation(e.to_string()))?;

        let plant_id = input.lines[0].plant_id;
        if input.lines.iter().any(|l| l.plant_id != plant_id) {
            return Err(GovernanceError::Validation(
                "All request lines must belong to the same plant".to_string(),
            ));
        }

        let identity = requester_identity(
            input.requester_source,
            &input.requester_name,
            input.vendor_name.as_deref(),
        )
        .to_string();

        // Group application ids by department for the tuple checks.
        let mut by_department: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for line in &input.lines {
            by_department
                .entry(line.department_id)
                .or_default()
                .push(line.application_id);
        }

        for (&department_id, application_ids) in &by_department {
            if is_new_user_access(&input.access_type) {
                let bulk = self
                    .admission
                    .validate_bulk_creation(plant_id, department_id, application_ids)
                    .await?;
                if !bulk.valid {
                    return Err(GovernanceError::Conflict {
                        rule: bulk.rule.unwrap_or(crate::error::ConflictRule::Rule6),
                        message: bulk.message.unwrap_or_default(),
                    });
                }
            }

            let in_flight = self
                .admission
                .check_in_flight(
                    plant_id,
                    department_id,
                    application_ids,
                    &identity,
                    &input.access_type,
                )
                .await?;
            if in_flight.conflict {
                return Err(GovernanceError::Conflict {
                    rule: in_flight.rule.unwrap_or(crate::error::ConflictRule::Rule1),
                    message: in_flight.message.unwrap_or_default(),
                });
            }

            let log_check = self
                .admission
                .check_access_log(
                    plant_id,
                    department_id,
                    application_ids,
                    &identity,
                    &input.access_type,
                )
                .await?;
            if log_check.conflict {
                return Err(GovernanceError::Conflict {
                    rule: log_check.rule.unwrap_or(crate::error::ConflictRule::Rule4),
                    message: log_check.message.unwrap_or_default(),
                });
            }
        }

        let workflow = self.resolver.resolve(plant_id).await?;

        let mut tx = self.pool.begin().await?;

        let request = AccessRequest::create_in_tx(
            &mut tx,
            CreateAccessRequest {
                request_number: input.request_number.clone(),
                requester_name: input.requester_name.clone(),
                requester_email: input.requester_email.clone(),
                vendor_name: input.vendor_name.clone(),
                requester_source: input.requester_source,
                access_type: input.access_type.clone(),
                approver1_email: workflow.approver1_email.clone(),
            },
        )
        .await?;

        let mut tasks = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let task = RequestTask::create_in_tx(
                &mut tx,
                request.id,
                CreateRequestTask {
                    task_number: line.task_number.clone(),
                    application_id: line.application_id,
                    department_id: line.department_id,
                    role_id: line.role_id,
                    plant_id: line.plant_id,
                    approver1_email: Some(workflow.approver1_email.clone()),
                },
            )
            .await?;
            tasks.push(task);
        }

        tx.commit().await?;

        self.audit
            .append(CreateAuditLogEntry {
                actor_email: acting_user.email.clone(),
                module: "requests".to_string(),
                table_name: "access_requests".to_string(),
                record_id: request.request_number.clone(),
                action: "create".to_string(),
                old_value: None,
                new_value: serde_json::to_value(&request).ok(),
                comment: None,
            })
            .await;

        fire_request_created(
            self.notifier.as_ref(),
            RequestCreatedNotice {
                request_id: request.id,
                request_number: request.request_number.clone(),
                requester_name: request.requester_name.clone(),
                notify_email: workflow.approver1_email.clone(),
                task_count: tasks.len(),
            },
        )
        .await;

        Ok(CreatedRequest { request, tasks })
    }
}
