//! Plant approval-workflow resolution.
//!
//! Resolves, per plant, the level-1 approver identity and the level-2
//! candidate pool from the single active workflow row. Used at request
//! creation to stamp notification targets and at decision time to authorize
//! the acting user.

use sqlx::PgPool;
use tracing::instrument;

use gatehouse_db::{ApprovalWorkflow, ApproverRef};

use crate::error::{GovernanceError, Result};
use crate::types::ResolvedWorkflow;

/// Resolver over the plant-scoped workflow configuration store.
pub struct WorkflowResolver {
    pool: PgPool,
}

impl WorkflowResolver {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve the approver routing for a plant.
    ///
    /// The newest active row wins when more than one matches. Slot 1 must
    /// hold exactly one id and slot 2 must parse to a non-empty pool;
    /// anything else is a configuration error, not an approval failure.
    #[instrument(skip(self))]
    pub async fn resolve(&self, plant_id: i64) -> Result<ResolvedWorkflow> {
        let workflow = ApprovalWorkflow::find_active_for_plant(&self.pool, plant_id)
            .await?
            .ok_or(GovernanceError::WorkflowNotConfigured(plant_id))?;

        let approver1_id = workflow.approver1_pool().single().ok_or_else(|| {
            GovernanceError::WorkflowMisconfigured(format!(
                "plant {plant_id}: slot 1 must hold exactly one approver"
            ))
        })?;

        let pool2 = workflow.approver2_pool();
        if pool2.is_empty() {
            return Err(GovernanceError::WorkflowMisconfigured(format!(
                "plant {plant_id}: slot 2 pool is empty"
            )));
        }

        let approver1 = ApproverRef::find_by_id(&self.pool, approver1_id)
            .await?
            .ok_or_else(|| {
                GovernanceError::WorkflowMisconfigured(format!(
                    "plant {plant_id}: approver {approver1_id} not found"
                ))
            })?;

        let pool2_ids: Vec<i64> = pool2.iter().collect();
        let pool2_refs = ApproverRef::find_by_ids(&self.pool, &pool2_ids).await?;
        // Keep pool order: refs come back unordered.
        let approver2_emails = pool2_ids
            .iter()
            .filter_map(|id| {
                pool2_refs
                    .iter()
                    .find(|r| r.id == *id)
                    .map(|r| r.email.clone())
            })
            .collect();

        Ok(ResolvedWorkflow {
            plant_id,
            approver1_id,
            approver1_email: approver1.email,
            approver1_name: approver1.display_name,
            approver2_pool: pool2,
            approver2_emails,
        })
    }
}
