//! Metrics aggregator — dashboard figures and execution history per owner.

use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::ExecutionRecord;
use taskflow_domain::id::OwnerId;
use taskflow_domain::metrics::{Metrics, MetricsOptions};
use taskflow_domain::time::Timestamp;

use crate::ports::{AutomationRepository, ExecutionFilter, ExecutionLedger, Pagination};

/// Read side over the registry and the ledger.
pub struct MetricsAggregator<R, L> {
    registry: R,
    ledger: L,
    options: MetricsOptions,
}

impl<R, L> MetricsAggregator<R, L>
where
    R: AutomationRepository + Send + Sync,
    L: ExecutionLedger + Send + Sync,
{
    pub fn new(registry: R, ledger: L, options: MetricsOptions) -> Self {
        Self {
            registry,
            ledger,
            options,
        }
    }

    /// Compute the metrics of `owner_id` as seen at `as_of`.
    ///
    /// Counters come from the ledger's aggregate query; only the most recent
    /// records are loaded.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the registry or the ledger fails.
    #[tracing::instrument(skip(self))]
    pub async fn get_metrics(
        &self,
        owner_id: OwnerId,
        as_of: Timestamp,
    ) -> Result<Metrics, TaskflowError> {
        let automations = self.registry.list_by_owner(owner_id).await?;
        let summary = self.ledger.summarize(owner_id, as_of).await?;
        let recent_limit = u32::try_from(self.options.recent_limit).unwrap_or(u32::MAX);
        let recent = self
            .ledger
            .query(
                owner_id,
                ExecutionFilter::default(),
                Pagination::first(recent_limit),
            )
            .await?;
        Ok(Metrics::from_summary(
            &automations,
            summary,
            recent,
            &self.options,
        ))
    }

    /// Page through the execution history of `owner_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the ledger fails.
    #[tracing::instrument(skip(self))]
    pub async fn list_executions(
        &self,
        owner_id: OwnerId,
        filter: ExecutionFilter,
        pagination: Pagination,
    ) -> Result<Vec<ExecutionRecord>, TaskflowError> {
        self.ledger.query(owner_id, filter, pagination).await
    }
}
