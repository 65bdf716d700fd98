//! In-process lease store for single-instance deployments and tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use chrono::Duration;
use taskflow_domain::error::TaskflowError;
use taskflow_domain::id::AutomationId;
use taskflow_domain::lease::Lease;
use taskflow_domain::time::Timestamp;

use crate::ports::LeaseStore;

/// [`LeaseStore`] backed by a mutex-guarded map.
///
/// The lock is held only for the check-and-set of a single key.
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<AutomationId, Lease>>,
}

impl InMemoryLeaseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The live lease of an automation, if any.
    #[must_use]
    pub fn current(&self, automation_id: AutomationId, now: Timestamp) -> Option<Lease> {
        let leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        leases
            .get(&automation_id)
            .filter(|lease| !lease.is_expired(now))
            .cloned()
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn try_acquire(
        &self,
        automation_id: AutomationId,
        ttl: Duration,
        now: Timestamp,
    ) -> impl Future<Output = Result<Option<Lease>, TaskflowError>> + Send {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        let granted = match leases.get(&automation_id) {
            Some(held) if !held.is_expired(now) => None,
            _ => {
                let lease = Lease::grant(automation_id, now, ttl);
                leases.insert(automation_id, lease.clone());
                Some(lease)
            }
        };
        async move { Ok(granted) }
    }

    fn release(&self, lease: &Lease) -> impl Future<Output = Result<bool, TaskflowError>> + Send {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        let released = match leases.get(&lease.automation_id) {
            Some(held) if held.holder == lease.holder => {
                leases.remove(&lease.automation_id);
                true
            }
            _ => false,
        };
        async move { Ok(released) }
    }
}
