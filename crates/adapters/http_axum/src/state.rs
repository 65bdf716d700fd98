//! Shared application state for axum handlers.

use std::sync::Arc;

use taskflow_app::ports::{AutomationRepository, EventVerifier, ExecutionLedger, ExecutionSubmitter};
use taskflow_app::services::metrics_aggregator::MetricsAggregator;
use taskflow_app::services::trigger_dispatcher::TriggerDispatcher;

/// Application state shared across all axum handlers.
///
/// Generic over the registry, verifier, submitter and ledger to avoid
/// dynamic dispatch. `Clone` is implemented manually so only the `Arc`
/// wrappers are cloned.
pub struct AppState<R, V, S, L> {
    /// Ingress for provider webhooks.
    pub dispatcher: Arc<TriggerDispatcher<R, V, S>>,
    /// Read side for dashboards.
    pub metrics: Arc<MetricsAggregator<R, L>>,
}

impl<R, V, S, L> Clone for AppState<R, V, S, L> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<R, V, S, L> AppState<R, V, S, L>
where
    R: AutomationRepository + Send + Sync + 'static,
    V: EventVerifier + Send + Sync + 'static,
    S: ExecutionSubmitter + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
{
    pub fn new(dispatcher: TriggerDispatcher<R, V, S>, metrics: MetricsAggregator<R, L>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            metrics: Arc::new(metrics),
        }
    }
}
