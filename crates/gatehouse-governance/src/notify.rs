//! Fire-and-forget workflow notifications.
//!
//! The core emits a notification when a request is created and when a decision
//! lands. Delivery is owned by an external collaborator; failures here are
//! logged and swallowed, never blocking the workflow.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;

/// A decision notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionNotice {
    pub request_id: Uuid,
    pub request_number: String,
    /// "approved" or "rejected".
    pub decision: String,
    /// Slot the decision was taken in ("approver1" / "approver2").
    pub decided_as: String,
    pub decided_by: String,
    pub comments: Option<String>,
}

/// A request-created notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCreatedNotice {
    pub request_id: Uuid,
    pub request_number: String,
    pub requester_name: String,
    /// Approver who should act next.
    pub notify_email: String,
    pub task_count: usize,
}

/// Trait for notification delivery backends.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_request_created(&self, notice: RequestCreatedNotice) -> Result<()>;
    async fn notify_decision(&self, notice: DecisionNotice) -> Result<()>;
}

/// Default notifier that only logs; used where no delivery backend is wired.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait::async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_request_created(&self, notice: RequestCreatedNotice) -> Result<()> {
        info!(
            request = %notice.request_number,
            to = %notice.notify_email,
            tasks = notice.task_count,
            "request created notification"
        );
        Ok(())
    }

    async fn notify_decision(&self, notice: DecisionNotice) -> Result<()> {
        info!(
            request = %notice.request_number,
            decision = %notice.decision,
            decided_as = %notice.decided_as,
            "decision notification"
        );
        Ok(())
    }
}

/// Send a request-created notice, swallowing failures.
pub async fn fire_request_created(notifier: &dyn Notifier, notice: RequestCreatedNotice) {
    if let Err(e) = notifier.notify_request_created(notice).await {
        warn!(error = %e, "request-created notification failed; continuing");
    }
}

/// Send a decision notice, swallowing failures.
pub async fn fire_decision(notifier: &dyn Notifier, notice: DecisionNotice) {
    if let Err(e) = notifier.notify_decision(notice).await {
        warn!(error = %e, "decision notification failed; continuing");
    }
}
