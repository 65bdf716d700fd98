//! Lease store port — per-automation mutual exclusion.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use taskflow_domain::error::TaskflowError;
use taskflow_domain::id::AutomationId;
use taskflow_domain::lease::Lease;
use taskflow_domain::time::Timestamp;

/// Grants time-bounded exclusive [`Lease`]s keyed by automation id.
///
/// Acquisition must be atomic: under concurrent callers exactly one wins
/// while an unexpired lease exists. Expired leases are taken over silently.
pub trait LeaseStore {
    /// Try to take the lease; `None` when another holder's lease is live.
    fn try_acquire(
        &self,
        automation_id: AutomationId,
        ttl: Duration,
        now: Timestamp,
    ) -> impl Future<Output = Result<Option<Lease>, TaskflowError>> + Send;

    /// Release a lease. Returns `false` if it had already expired and been
    /// taken over (or released).
    fn release(&self, lease: &Lease) -> impl Future<Output = Result<bool, TaskflowError>> + Send;
}

impl<T: LeaseStore + Send + Sync> LeaseStore for Arc<T> {
    fn try_acquire(
        &self,
        automation_id: AutomationId,
        ttl: Duration,
        now: Timestamp,
    ) -> impl Future<Output = Result<Option<Lease>, TaskflowError>> + Send {
        (**self).try_acquire(automation_id, ttl, now)
    }

    fn release(&self, lease: &Lease) -> impl Future<Output = Result<bool, TaskflowError>> + Send {
        (**self).release(lease)
    }
}
