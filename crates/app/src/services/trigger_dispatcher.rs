//! Trigger dispatcher — turns inbound provider events into submissions.

use taskflow_domain::automation::TriggerPayload;
use taskflow_domain::error::TaskflowError;
use taskflow_domain::event::InboundEvent;

use crate::dedupe::DedupeCache;
use crate::ports::{AutomationRepository, EventVerifier, ExecutionSubmitter, SubmitOutcome};

/// Default dedupe window for provider event ids.
pub const DEFAULT_DEDUPE_WINDOW: chrono::Duration = chrono::Duration::hours(24);

/// Verifies, parses and deduplicates inbound events, then submits every
/// active automation whose trigger matches.
pub struct TriggerDispatcher<R, V, S> {
    registry: R,
    verifier: V,
    submitter: S,
    dedupe: DedupeCache,
}

impl<R, V, S> TriggerDispatcher<R, V, S>
where
    R: AutomationRepository + Send + Sync,
    V: EventVerifier + Send + Sync,
    S: ExecutionSubmitter + Send + Sync,
{
    pub fn new(registry: R, verifier: V, submitter: S, dedupe_window: chrono::Duration) -> Self {
        Self {
            registry,
            verifier,
            submitter,
            dedupe: DedupeCache::new(dedupe_window),
        }
    }

    /// Check the provider signature over the exact signed bytes.
    ///
    /// Ingress adapters call this before parsing a body so that an
    /// unauthenticated caller never learns whether its payload parses.
    ///
    /// # Errors
    ///
    /// Returns [`TaskflowError::Auth`] when the verifier rejects the body.
    pub fn authenticate(
        &self,
        signed_body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), TaskflowError> {
        self.verifier.verify(signed_body, signature).map_err(|err| {
            tracing::warn!(error = %err, "rejected inbound event");
            err.into()
        })
    }

    /// Process one event and return how many automations it matched.
    ///
    /// A duplicate delivery returns `Ok(0)` without touching the registry.
    /// Matched automations that are busy or fail to submit still count.
    ///
    /// # Errors
    ///
    /// - [`TaskflowError::Auth`] when the verifier rejects the event.
    /// - [`TaskflowError::Validation`] when the payload does not fit its hint.
    /// - A storage error when candidate automations cannot be listed; the
    ///   event id is forgotten so a redelivery is processed.
    #[tracing::instrument(
        skip_all,
        fields(
            provider_event_id = %event.provider_event_id,
            trigger = %event.trigger_hint,
        )
    )]
    pub async fn ingest_event(&self, event: InboundEvent) -> Result<usize, TaskflowError> {
        self.authenticate(&event.signed_body, event.signature.as_deref())?;
        let payload = TriggerPayload::parse(event.trigger_hint, &event.payload)?;

        let now = taskflow_domain::time::now();
        if !self.dedupe.check_and_record(&event.provider_event_id, now) {
            tracing::debug!("duplicate event ignored");
            return Ok(0);
        }

        let candidates = match self.registry.list_active(event.owner_id).await {
            Ok(candidates) => candidates,
            Err(err) => {
                self.dedupe.forget(&event.provider_event_id);
                return Err(err);
            }
        };

        let mut matched = 0;
        for automation in candidates
            .iter()
            .filter(|a| event.addresses(a.owner_id) && a.trigger.matches(&payload))
        {
            matched += 1;
            match self.submitter.submit(automation.id, payload.clone()).await {
                Ok(SubmitOutcome::Accepted(handle)) => {
                    tracing::debug!(
                        automation_id = %automation.id,
                        execution_id = %handle.execution_id(),
                        "submitted"
                    );
                }
                Ok(outcome) => {
                    tracing::info!(
                        automation_id = %automation.id,
                        outcome = outcome.label(),
                        "automation not submitted"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        automation_id = %automation.id,
                        error = %err,
                        "failed to submit automation"
                    );
                }
            }
        }
        tracing::info!(matched, candidates = candidates.len(), "event dispatched");
        Ok(matched)
    }
}
