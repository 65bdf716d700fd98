//! Event verifier port — provenance checks on inbound events.

use taskflow_domain::error::AuthError;

/// Decides whether an inbound event really comes from its provider.
///
/// Verification runs on the exact bytes the provider signed, before the
/// body is parsed.
pub trait EventVerifier {
    /// Accept or reject a signed body.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the event must not be processed.
    fn verify(&self, signed_body: &[u8], signature: Option<&str>) -> Result<(), AuthError>;
}

/// No verifier configured: every event is accepted.
impl<V: EventVerifier> EventVerifier for Option<V> {
    fn verify(&self, signed_body: &[u8], signature: Option<&str>) -> Result<(), AuthError> {
        match self {
            Some(verifier) => verifier.verify(signed_body, signature),
            None => Ok(()),
        }
    }
}

impl<V: EventVerifier> EventVerifier for std::sync::Arc<V> {
    fn verify(&self, signed_body: &[u8], signature: Option<&str>) -> Result<(), AuthError> {
        (**self).verify(signed_body, signature)
    }
}
