//! Integration port — the call contract of action capabilities.
//!
//! A capability performs one kind of side effect against an external
//! provider (mail service, task tracker, CRM, reporting). The engine never
//! sees provider details: it hands over a validated [`Action`] and gets back
//! either a receipt or a classified [`IntegrationError`].

use std::future::Future;

use taskflow_domain::automation::{Action, TriggerPayload};
use taskflow_domain::id::{AutomationId, ExecutionId, OwnerId};

/// Who the side effect is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerContext {
    pub owner_id: OwnerId,
    pub automation_id: AutomationId,
    pub execution_id: ExecutionId,
}

/// Successful provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityReceipt {
    /// Provider-side reference (message id, task id, report URL…).
    pub provider_ref: Option<String>,
    pub output: serde_json::Value,
}

impl CapabilityReceipt {
    #[must_use]
    pub fn new(provider_ref: impl Into<String>) -> Self {
        Self {
            provider_ref: Some(provider_ref.into()),
            output: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = output;
        self
    }
}

/// Provider failure, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrationError {
    /// Worth retrying (rate limit, network hiccup, 5xx).
    #[error("transient integration failure: {0}")]
    Transient(String),

    /// Retrying will not help (rejected request, unknown record).
    #[error("permanent integration failure: {0}")]
    Permanent(String),
}

/// One integration capability, bound to a single action kind.
///
/// Implementations are responsible for their own provider-level idempotency.
/// They are invoked on a spawned task, so they must be `'static`.
pub trait ActionCapability: Send + Sync + 'static {
    /// Whether an in-flight call may be aborted when it times out.
    ///
    /// When `false`, a timed-out call is detached and left to finish.
    fn supports_cancellation(&self) -> bool {
        true
    }

    /// Perform the side effect.
    fn invoke(
        &self,
        action: &Action,
        payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = Result<CapabilityReceipt, IntegrationError>> + Send;
}
