//! Automation repository port — the registry of automation definitions.

use std::future::Future;
use std::sync::Arc;

use taskflow_domain::automation::Automation;
use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::AggregateDelta;
use taskflow_domain::id::{AutomationId, OwnerId};
use taskflow_domain::time::Timestamp;

/// Registry of [`Automation`]s and their aggregate state.
///
/// Definition fields are written by the CRUD layer through [`create`](Self::create);
/// the engine only touches aggregates, `next_run` and the invalid marking.
pub trait AutomationRepository {
    /// Store a new automation.
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, TaskflowError>> + Send;

    /// Load an automation by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, TaskflowError>> + Send;

    /// All automations of one owner, whatever their status.
    fn list_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send;

    /// Active automations, restricted to `owner_id` when given.
    fn list_active(
        &self,
        owner_id: Option<OwnerId>,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send;

    /// Active schedule automations whose `next_run` is at or before `now`.
    fn list_due_for_schedule(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send;

    /// Atomically fold one finalized execution into the aggregate counters.
    fn update_aggregates(
        &self,
        id: AutomationId,
        delta: AggregateDelta,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send;

    /// Set `next_run` to `next` only if it currently equals `expected`.
    ///
    /// Returns `false` when another writer got there first.
    fn compare_and_swap_next_run(
        &self,
        id: AutomationId,
        expected: Option<Timestamp>,
        next: Option<Timestamp>,
    ) -> impl Future<Output = Result<bool, TaskflowError>> + Send;

    /// Flag an automation as `invalid`, deactivating it and clearing `next_run`.
    fn mark_invalid(
        &self,
        id: AutomationId,
        reason: String,
        now: Timestamp,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send;
}

impl<T: AutomationRepository + Send + Sync> AutomationRepository for Arc<T> {
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, TaskflowError>> + Send {
        (**self).create(automation)
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, TaskflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn list_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send {
        (**self).list_by_owner(owner_id)
    }

    fn list_active(
        &self,
        owner_id: Option<OwnerId>,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send {
        (**self).list_active(owner_id)
    }

    fn list_due_for_schedule(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send {
        (**self).list_due_for_schedule(now)
    }

    fn update_aggregates(
        &self,
        id: AutomationId,
        delta: AggregateDelta,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send {
        (**self).update_aggregates(id, delta)
    }

    fn compare_and_swap_next_run(
        &self,
        id: AutomationId,
        expected: Option<Timestamp>,
        next: Option<Timestamp>,
    ) -> impl Future<Output = Result<bool, TaskflowError>> + Send {
        (**self).compare_and_swap_next_run(id, expected, next)
    }

    fn mark_invalid(
        &self,
        id: AutomationId,
        reason: String,
        now: Timestamp,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send {
        (**self).mark_invalid(id, reason, now)
    }
}
