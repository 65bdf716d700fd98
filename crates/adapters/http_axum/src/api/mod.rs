//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod owners;
#[allow(clippy::missing_errors_doc)]
pub mod webhooks;

use axum::Router;
use axum::routing::{get, post};

use taskflow_app::ports::{AutomationRepository, EventVerifier, ExecutionLedger, ExecutionSubmitter};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, V, S, L>() -> Router<AppState<R, V, S, L>>
where
    R: AutomationRepository + Send + Sync + 'static,
    V: EventVerifier + Send + Sync + 'static,
    S: ExecutionSubmitter + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
{
    Router::new()
        .route("/webhooks", post(webhooks::ingest))
        .route("/owners/{owner_id}/metrics", get(owners::metrics))
        .route("/owners/{owner_id}/executions", get(owners::executions))
}
