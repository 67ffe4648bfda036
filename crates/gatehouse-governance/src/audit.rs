//! Best-effort audit logging.
//!
//! Every state-machine mutation appends an audit event after its transaction
//! commits. Appends are best-effort: a failed write is logged and swallowed so
//! workflow correctness never depends on the audit trail.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use gatehouse_db::{AuditLogEntry, CreateAuditLogEntry};

use crate::error::Result;

/// Trait for audit event storage backends.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an audit event.
    async fn append(&self, input: CreateAuditLogEntry) -> Result<()>;
}

/// Postgres-backed audit store.
pub struct PgAuditStore {
    pool: sqlx::PgPool,
}

impl PgAuditStore {
    #[must_use]
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, input: CreateAuditLogEntry) -> Result<()> {
        AuditLogEntry::create(&self.pool, input).await?;
        Ok(())
    }
}

/// In-memory audit store for testing.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    events: Arc<RwLock<Vec<CreateAuditLogEntry>>>,
}

impl InMemoryAuditStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the count of events in the store.
    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Get all events (for assertions).
    pub async fn all(&self) -> Vec<CreateAuditLogEntry> {
        self.events.read().await.clone()
    }

    /// Clear all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, input: CreateAuditLogEntry) -> Result<()> {
        self.events.write().await.push(input);
        Ok(())
    }
}

/// Service wrapping a store, downgrading every failure to a warning.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
}

impl AuditService {
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append an event; failures are logged and swallowed.
    pub async fn append(&self, input: CreateAuditLogEntry) {
        if let Err(e) = self.store.append(input).await {
            warn!(error = %e, "audit append failed; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(action: &str) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            actor_email: "approver@example.com".to_string(),
            module: "approvals".to_string(),
            table_name: "access_requests".to_string(),
            record_id: "RITM0001".to_string(),
            action: action.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_appends() {
        let store = InMemoryAuditStore::new();
        store.append(sample("approve")).await.unwrap();
        store.append(sample("reject")).await.unwrap();
        assert_eq!(store.count().await, 2);

        let events = store.all().await;
        assert_eq!(events[0].action, "approve");
        assert_eq!(events[1].action, "reject");
    }

    #[tokio::test]
    async fn test_service_swallows_failures() {
        struct FailingStore;

        #[async_trait::async_trait]
        impl AuditStore for FailingStore {
            async fn append(&self, _input: CreateAuditLogEntry) -> Result<()> {
                Err(crate::error::GovernanceError::Validation(
                    "store down".to_string(),
                ))
            }
        }

        let service = AuditService::new(Arc::new(FailingStore));
        // Must not panic or propagate.
        service.append(sample("approve")).await;
    }
}
