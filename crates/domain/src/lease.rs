//! Execution leases — mutual exclusion per automation.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::id::{AutomationId, LeaseToken};
use crate::time::Timestamp;

/// Exclusive right to execute one automation until `expires_at`.
///
/// At most one unexpired lease exists per automation; an expired lease may
/// be taken over by anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub automation_id: AutomationId,
    pub holder: LeaseToken,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Lease {
    /// Grant a fresh lease with a new holder token.
    #[must_use]
    pub fn grant(automation_id: AutomationId, now: Timestamp, ttl: Duration) -> Self {
        Self {
            automation_id,
            holder: LeaseToken::new(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}
