//! Provider webhook ingress.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use taskflow_app::ports::{AutomationRepository, EventVerifier, ExecutionLedger, ExecutionSubmitter};
use taskflow_domain::automation::TriggerKind;
use taskflow_domain::event::InboundEvent;
use taskflow_domain::id::{OwnerId, ProviderEventId};

use crate::error::ApiError;
use crate::state::AppState;
use crate::verifier::SIGNATURE_HEADER;

/// Body of a webhook delivery.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    /// Provider event id, used for deduplication.
    pub id: String,
    #[serde(rename = "type")]
    pub trigger: TriggerKind,
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct IngestReceipt {
    pub matched: usize,
}

/// Possible responses from the ingest endpoint.
pub enum IngestResponse {
    Accepted(Json<IngestReceipt>),
}

impl IntoResponse for IngestResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
        }
    }
}

/// `POST /api/webhooks` — verify, parse and dispatch one provider event.
///
/// The signature header is checked against the raw body bytes before the
/// body is parsed, so unauthenticated callers get `401` whatever they send.
pub async fn ingest<R, V, S, L>(
    State(state): State<AppState<R, V, S, L>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<IngestResponse, ApiError>
where
    R: AutomationRepository + Send + Sync + 'static,
    V: EventVerifier + Send + Sync + 'static,
    S: ExecutionSubmitter + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    state.dispatcher.authenticate(&body, signature)?;

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(format!("invalid webhook body: {err}")))?;
    if envelope.id.trim().is_empty() {
        return Err(ApiError::BadRequest("webhook id must not be empty".to_string()));
    }

    let mut event = InboundEvent::new(
        ProviderEventId::new(envelope.id),
        envelope.trigger,
        envelope.data,
    )
    .with_signed_body(body.to_vec());
    if let Some(owner_id) = envelope.owner_id {
        event = event.with_owner(owner_id);
    }
    if let Some(signature) = signature {
        event = event.with_signature(signature);
    }

    let matched = state.dispatcher.ingest_event(event).await?;
    Ok(IngestResponse::Accepted(Json(IngestReceipt { matched })))
}
