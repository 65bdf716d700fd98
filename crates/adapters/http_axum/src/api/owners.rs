//! Per-owner read endpoints: dashboard metrics and execution history.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use taskflow_app::ports::{
    AutomationRepository, EventVerifier, ExecutionFilter, ExecutionLedger, ExecutionSubmitter,
    Pagination,
};
use taskflow_domain::error::{TaskflowError, ValidationError};
use taskflow_domain::execution::{ExecutionRecord, ExecutionStatus};
use taskflow_domain::id::{AutomationId, OwnerId};
use taskflow_domain::metrics::Metrics;
use taskflow_domain::time::Timestamp;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest page the history endpoint returns.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Query string of the history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutionsQuery {
    pub automation_id: Option<AutomationId>,
    pub status: Option<ExecutionStatus>,
    pub started_after: Option<Timestamp>,
    pub started_before: Option<Timestamp>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

impl ExecutionsQuery {
    fn filter(&self) -> ExecutionFilter {
        ExecutionFilter {
            automation_id: self.automation_id,
            status: self.status,
            started_after: self.started_after,
            started_before: self.started_before,
        }
    }

    fn pagination(&self) -> Pagination {
        Pagination {
            limit: Some(
                self.limit
                    .unwrap_or(Pagination::DEFAULT_LIMIT)
                    .min(MAX_PAGE_SIZE),
            ),
            offset: self.offset,
        }
    }
}

/// Possible responses from the metrics endpoint.
pub enum MetricsResponse {
    Ok(Json<Metrics>),
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the executions endpoint.
pub enum ExecutionsResponse {
    Ok(Json<Vec<ExecutionRecord>>),
}

impl IntoResponse for ExecutionsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

fn parse_owner(raw: &str) -> Result<OwnerId, ApiError> {
    OwnerId::from_str(raw).map_err(|_| {
        ApiError::from(TaskflowError::from(ValidationError::InvalidId(
            raw.to_string(),
        )))
    })
}

/// `GET /api/owners/{owner_id}/metrics` — dashboard figures as of now.
pub async fn metrics<R, V, S, L>(
    State(state): State<AppState<R, V, S, L>>,
    Path(owner_id): Path<String>,
) -> Result<MetricsResponse, ApiError>
where
    R: AutomationRepository + Send + Sync + 'static,
    V: EventVerifier + Send + Sync + 'static,
    S: ExecutionSubmitter + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
{
    let owner_id = parse_owner(&owner_id)?;
    let metrics = state
        .metrics
        .get_metrics(owner_id, taskflow_domain::time::now())
        .await?;
    Ok(MetricsResponse::Ok(Json(metrics)))
}

/// `GET /api/owners/{owner_id}/executions` — filtered history, newest first.
pub async fn executions<R, V, S, L>(
    State(state): State<AppState<R, V, S, L>>,
    Path(owner_id): Path<String>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<ExecutionsResponse, ApiError>
where
    R: AutomationRepository + Send + Sync + 'static,
    V: EventVerifier + Send + Sync + 'static,
    S: ExecutionSubmitter + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
{
    let owner_id = parse_owner(&owner_id)?;
    let records = state
        .metrics
        .list_executions(owner_id, query.filter(), query.pagination())
        .await?;
    Ok(ExecutionsResponse::Ok(Json(records)))
}
