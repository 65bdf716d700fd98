//! Submission port — how dispatchers hand automations to the coordinator.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use taskflow_domain::automation::TriggerPayload;
use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::ExecutionRecord;
use taskflow_domain::id::{AutomationId, ExecutionId};

/// Handle on an accepted execution running in the background.
#[derive(Debug)]
pub struct ExecutionHandle {
    execution_id: ExecutionId,
    join: JoinHandle<ExecutionRecord>,
}

impl ExecutionHandle {
    #[must_use]
    pub fn new(execution_id: ExecutionId, join: JoinHandle<ExecutionRecord>) -> Self {
        Self { execution_id, join }
    }

    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Wait for the finalized record. `None` if the execution task died.
    pub async fn wait(self) -> Option<ExecutionRecord> {
        self.join.await.ok()
    }
}

/// Result of a submission. Only [`SubmitOutcome::Accepted`] produces a record.
#[derive(Debug)]
pub enum SubmitOutcome {
    Accepted(ExecutionHandle),
    /// Another execution of the same automation holds the lease.
    Busy,
    /// The automation is not active (or the coordinator is shutting down).
    Skipped,
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted(_) => "accepted",
            Self::Busy => "busy",
            Self::Skipped => "skipped",
        }
    }
}

/// Accepts automations for execution without waiting for them to finish.
pub trait ExecutionSubmitter {
    fn submit(
        &self,
        automation_id: AutomationId,
        payload: TriggerPayload,
    ) -> impl Future<Output = Result<SubmitOutcome, TaskflowError>> + Send;
}

impl<T: ExecutionSubmitter + Send + Sync> ExecutionSubmitter for Arc<T> {
    fn submit(
        &self,
        automation_id: AutomationId,
        payload: TriggerPayload,
    ) -> impl Future<Output = Result<SubmitOutcome, TaskflowError>> + Send {
        (**self).submit(automation_id, payload)
    }
}
