//! HMAC-SHA256 provenance check for webhook deliveries.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use taskflow_app::ports::EventVerifier;
use taskflow_domain::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded signature of the request body.
pub const SIGNATURE_HEADER: &str = "x-taskflow-signature";

/// Accepts an event only if its signature is the HMAC-SHA256 of the signed
/// body under the shared secret.
///
/// The signature may carry a `sha256=` prefix.
pub struct HmacSha256Verifier {
    secret: Vec<u8>,
}

impl HmacSha256Verifier {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::SignatureMismatch)
    }

    /// Hex signature of `body`, as a provider would send it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SignatureMismatch`] if the secret is unusable as a key.
    pub fn sign(&self, body: &[u8]) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl EventVerifier for HmacSha256Verifier {
    fn verify(&self, signed_body: &[u8], signature: Option<&str>) -> Result<(), AuthError> {
        let signature = signature.ok_or(AuthError::MissingSignature)?;
        let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
        let expected = hex::decode(signature).map_err(|_| AuthError::SignatureMismatch)?;

        let mut mac = self.mac()?;
        mac.update(signed_body);
        mac.verify_slice(&expected)
            .map_err(|_| AuthError::SignatureMismatch)
    }
}
