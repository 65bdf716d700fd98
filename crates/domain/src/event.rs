//! Inbound events delivered by external providers.

use serde::{Deserialize, Serialize};

use crate::automation::TriggerKind;
use crate::id::{OwnerId, ProviderEventId};
use crate::time::Timestamp;

/// An event received from an external provider (lead form, payment
/// processor, mailing service).
///
/// The payload is kept raw until the dispatcher parses it against the shape
/// of `trigger_hint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Provider-assigned id, used for deduplication.
    pub provider_event_id: ProviderEventId,
    /// Which trigger kind the payload claims to be.
    pub trigger_hint: TriggerKind,
    /// Restrict delivery to one owner's automations; `None` addresses all.
    pub owner_id: Option<OwnerId>,
    pub payload: serde_json::Value,
    /// Hex-encoded provenance signature, if the provider sent one.
    pub signature: Option<String>,
    /// The exact bytes the signature was computed over.
    #[serde(skip)]
    pub signed_body: Vec<u8>,
    pub received_at: Timestamp,
}

impl InboundEvent {
    /// Create an unsigned event whose signed body is the serialized payload.
    #[must_use]
    pub fn new(
        provider_event_id: ProviderEventId,
        trigger_hint: TriggerKind,
        payload: serde_json::Value,
    ) -> Self {
        let signed_body = serde_json::to_vec(&payload).unwrap_or_default();
        Self {
            provider_event_id,
            trigger_hint,
            owner_id: None,
            payload,
            signature: None,
            signed_body,
            received_at: crate::time::now(),
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Replace the bytes the signature is checked against (the raw HTTP body).
    #[must_use]
    pub fn with_signed_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.signed_body = body.into();
        self
    }

    /// Whether the event is addressed to `owner`.
    #[must_use]
    pub fn addresses(&self, owner: OwnerId) -> bool {
        self.owner_id.is_none_or(|target| target == owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_address_every_owner_when_unscoped() {
        let event = InboundEvent::new(
            ProviderEventId::new("evt_1"),
            TriggerKind::NewLead,
            serde_json::json!({"value": 1}),
        );
        assert!(event.addresses(OwnerId::new()));
    }

    #[test]
    fn should_address_only_its_owner_when_scoped() {
        let owner = OwnerId::new();
        let event = InboundEvent::new(
            ProviderEventId::new("evt_1"),
            TriggerKind::NewLead,
            serde_json::json!({"value": 1}),
        )
        .with_owner(owner);
        assert!(event.addresses(owner));
        assert!(!event.addresses(OwnerId::new()));
    }

    #[test]
    fn should_sign_serialized_payload_by_default() {
        let payload = serde_json::json!({"value": 1});
        let event = InboundEvent::new(
            ProviderEventId::new("evt_1"),
            TriggerKind::NewLead,
            payload.clone(),
        );
        assert_eq!(event.signed_body, serde_json::to_vec(&payload).unwrap());
        let event = event.with_signed_body(b"raw".to_vec());
        assert_eq!(event.signed_body, b"raw");
    }
}
