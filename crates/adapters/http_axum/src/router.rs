//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use taskflow_app::ports::{AutomationRepository, EventVerifier, ExecutionLedger, ExecutionSubmitter};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the API routes under `/api`. Includes a [`TraceLayer`] that logs
/// each HTTP request/response using the `tracing` ecosystem.
pub fn build<R, V, S, L>(state: AppState<R, V, S, L>) -> Router
where
    R: AutomationRepository + Send + Sync + 'static,
    V: EventVerifier + Send + Sync + 'static,
    S: ExecutionSubmitter + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
