//! Closure projection synchronization.
//!
//! Owns the two durable projections written at task closure and the mapping
//! between their keys: [`ClosureRecord`] by business identifiers
//! (ritm_number, task_number) and [`AccessLogEntry`] by (request_id,
//! task_id). Both are natural-key upserts so retried closures update in place
//! instead of duplicating. The access log upsert runs inside the enclosing
//! closure transaction because admission decisions read that table.

use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use gatehouse_db::{
    AccessLogEntry, AccessRequest, ClosureRecord, CreateAccessLogEntry, CreateClosureRecord,
    RequestTask, TaskStatus,
};

use crate::error::Result;
use crate::types::{normalize_identity, requester_identity, CloseTaskInput};

/// Synchronizer for the closure-side projections.
pub struct ClosureService {
    pool: PgPool,
}

impl ClosureService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One-way hash for issued credentials. Plaintext never reaches storage.
    pub fn hash_credential(credential: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(credential.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Upsert the closure record for a task inside the caller's transaction.
    ///
    /// Last write wins on all mutable fields. A supplied credential is hashed
    /// here; an omitted one preserves whatever hash is already stored.
    pub async fn upsert_closure_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ritm_number: &str,
        task_number: &str,
        status: TaskStatus,
        input: &CloseTaskInput,
    ) -> Result<ClosureRecord> {
        let credential_hash = input.credential.as_deref().map(Self::hash_credential);

        let record = ClosureRecord::upsert_in_tx(
            tx,
            CreateClosureRecord {
                ritm_number: ritm_number.to_string(),
                task_number: task_number.to_string(),
                assignment_group: input.assignment_group.clone(),
                assigned_to: input.assigned_to.clone(),
                access_granted: input.access_granted.clone(),
                valid_from: input.valid_from,
                valid_to: input.valid_to,
                credential_hash,
                closed_at: status.is_closed().then(chrono::Utc::now),
            },
        )
        .await?;

        Ok(record)
    }

    /// Upsert the access log entry for a task inside the caller's transaction,
    /// mirroring its latest disposition.
    pub async fn upsert_access_log_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: &AccessRequest,
        task: &RequestTask,
        disposition: TaskStatus,
    ) -> Result<AccessLogEntry> {
        let identity = requester_identity(
            request.requester_source,
            &request.requester_name,
            request.vendor_name.as_deref(),
        );

        let entry = AccessLogEntry::upsert_in_tx(
            tx,
            CreateAccessLogEntry {
                request_id: request.id,
                task_id: task.id,
                plant_id: task.plant_id,
                department_id: task.department_id,
                application_id: task.application_id,
                requester_name: normalize_identity(identity),
                access_type: request.access_type.clone(),
                disposition,
            },
        )
        .await?;

        Ok(entry)
    }

    /// Record a closure that has no originating request task.
    ///
    /// Keyed purely by business identifiers; runs in its own transaction.
    #[instrument(skip(self, input))]
    pub async fn record_closure(
        &self,
        ritm_number: &str,
        task_number: &str,
        input: &CloseTaskInput,
    ) -> Result<ClosureRecord> {
        let mut tx = self.pool.begin().await?;
        let record = self
            .upsert_closure_in_tx(&mut tx, ritm_number, task_number, TaskStatus::Closed, input)
            .await?;
        tx.commit().await?;
        Ok(record)
    }
}
