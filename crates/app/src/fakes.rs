//! In-memory port fakes shared by the service tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use taskflow_domain::automation::{Automation, TriggerPayload};
use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::{AggregateDelta, ExecutionRecord};
use taskflow_domain::id::{AutomationId, OwnerId};
use taskflow_domain::metrics::ExecutionSummary;
use taskflow_domain::time::Timestamp;

use crate::ports::{
    AutomationRepository, ExecutionFilter, ExecutionHandle, ExecutionLedger, ExecutionSubmitter,
    Pagination, SubmitOutcome,
};

fn storage_error(message: &str) -> TaskflowError {
    TaskflowError::Storage(message.into())
}

// ── In-memory automation repo ──────────────────────────────────

#[derive(Default)]
pub struct InMemoryAutomationRepo {
    store: Mutex<HashMap<AutomationId, Automation>>,
    fail_next_list: AtomicBool,
}

impl InMemoryAutomationRepo {
    pub fn with(automations: Vec<Automation>) -> Self {
        let map: HashMap<_, _> = automations.into_iter().map(|a| (a.id, a)).collect();
        Self {
            store: Mutex::new(map),
            fail_next_list: AtomicBool::new(false),
        }
    }

    pub fn get(&self, id: AutomationId) -> Automation {
        self.store.lock().unwrap()[&id].clone()
    }

    pub fn fail_next_list(&self) {
        self.fail_next_list.store(true, Ordering::SeqCst);
    }

    fn list_where(
        &self,
        predicate: impl Fn(&Automation) -> bool,
    ) -> Result<Vec<Automation>, TaskflowError> {
        if self.fail_next_list.swap(false, Ordering::SeqCst) {
            return Err(storage_error("registry unavailable"));
        }
        let store = self.store.lock().unwrap();
        Ok(store.values().filter(|a| predicate(a)).cloned().collect())
    }
}

impl AutomationRepository for InMemoryAutomationRepo {
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, TaskflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        store.insert(automation.id, automation.clone());
        async { Ok(automation) }
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, TaskflowError>> + Send {
        let store = self.store.lock().unwrap();
        let r = store.get(&id).cloned();
        async { Ok(r) }
    }

    fn list_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send {
        let r = self.list_where(|a| a.owner_id == owner_id);
        async { r }
    }

    fn list_active(
        &self,
        owner_id: Option<OwnerId>,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send {
        let r = self.list_where(|a| a.is_runnable() && owner_id.is_none_or(|o| a.owner_id == o));
        async { r }
    }

    fn list_due_for_schedule(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<Automation>, TaskflowError>> + Send {
        let r = self.list_where(|a| {
            a.is_runnable() && a.is_schedule_based() && a.next_run.is_some_and(|next| next <= now)
        });
        async { r }
    }

    fn update_aggregates(
        &self,
        id: AutomationId,
        delta: AggregateDelta,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        if let Some(automation) = store.get_mut(&id) {
            automation.apply(delta);
        }
        async { Ok(()) }
    }

    fn compare_and_swap_next_run(
        &self,
        id: AutomationId,
        expected: Option<Timestamp>,
        next: Option<Timestamp>,
    ) -> impl Future<Output = Result<bool, TaskflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        let swapped = match store.get_mut(&id) {
            Some(automation) if automation.next_run == expected => {
                automation.next_run = next;
                true
            }
            _ => false,
        };
        async move { Ok(swapped) }
    }

    fn mark_invalid(
        &self,
        id: AutomationId,
        reason: String,
        now: Timestamp,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send {
        let mut store = self.store.lock().unwrap();
        if let Some(automation) = store.get_mut(&id) {
            automation.mark_invalid(reason, now);
        }
        async { Ok(()) }
    }
}

// ── In-memory ledger ───────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryLedger {
    records: Mutex<Vec<ExecutionRecord>>,
    pages: Mutex<Vec<Pagination>>,
}

impl InMemoryLedger {
    pub fn all(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Every pagination passed to `query`, in call order.
    pub fn pages(&self) -> Vec<Pagination> {
        self.pages.lock().unwrap().clone()
    }

    pub fn for_automation(&self, id: AutomationId) -> Vec<ExecutionRecord> {
        self.all()
            .into_iter()
            .filter(|r| r.automation_id == id)
            .collect()
    }
}

impl ExecutionLedger for InMemoryLedger {
    fn append(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send {
        let mut records = self.records.lock().unwrap();
        let r = if records.iter().any(|existing| existing.id == record.id) {
            Err(storage_error("duplicate execution id"))
        } else {
            records.push(record);
            Ok(())
        };
        async { r }
    }

    fn query(
        &self,
        owner_id: OwnerId,
        filter: ExecutionFilter,
        pagination: Pagination,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, TaskflowError>> + Send {
        self.pages.lock().unwrap().push(pagination);
        let mut matching: Vec<_> = self
            .all()
            .into_iter()
            .filter(|r| r.owner_id == owner_id && filter.matches(r))
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let page: Vec<_> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect();
        async { Ok(page) }
    }

    fn summarize(
        &self,
        owner_id: OwnerId,
        as_of: Timestamp,
    ) -> impl Future<Output = Result<ExecutionSummary, TaskflowError>> + Send {
        let owned: Vec<_> = self
            .all()
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect();
        let summary = ExecutionSummary::tally(&owned, as_of);
        async move { Ok(summary) }
    }
}

// ── Recording submitter ────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSubmitter {
    submitted: Mutex<Vec<(AutomationId, TriggerPayload)>>,
    busy: AtomicBool,
}

impl RecordingSubmitter {
    pub fn busy() -> Self {
        Self {
            busy: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<(AutomationId, TriggerPayload)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_ids(&self) -> Vec<AutomationId> {
        self.submitted().into_iter().map(|(id, _)| id).collect()
    }
}

impl ExecutionSubmitter for RecordingSubmitter {
    fn submit(
        &self,
        automation_id: AutomationId,
        payload: TriggerPayload,
    ) -> impl Future<Output = Result<SubmitOutcome, TaskflowError>> + Send {
        self.submitted
            .lock()
            .unwrap()
            .push((automation_id, payload.clone()));
        let busy = self.busy.load(Ordering::SeqCst);
        async move {
            if busy {
                return Ok(SubmitOutcome::Busy);
            }
            let record = ExecutionRecord::pending(
                automation_id,
                OwnerId::new(),
                payload.to_value(),
                taskflow_domain::time::now(),
            );
            let execution_id = record.id;
            let join = tokio::spawn(async move { record });
            Ok(SubmitOutcome::Accepted(ExecutionHandle::new(
                execution_id,
                join,
            )))
        }
    }
}
