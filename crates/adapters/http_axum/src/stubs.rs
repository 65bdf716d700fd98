//! Hand-written port stubs shared by the handler tests.

use std::sync::{Arc, Mutex};

use taskflow_app::ports::{
    AutomationRepository, ExecutionFilter, ExecutionLedger, ExecutionSubmitter, Pagination,
    SubmitOutcome,
};
use taskflow_app::services::metrics_aggregator::MetricsAggregator;
use taskflow_app::services::trigger_dispatcher::{DEFAULT_DEDUPE_WINDOW, TriggerDispatcher};
use taskflow_domain::automation::{Action, Automation, CrmRecordType, Trigger, TriggerPayload};
use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::{AggregateDelta, ExecutionRecord};
use taskflow_domain::id::{AutomationId, OwnerId};
use taskflow_domain::metrics::{ExecutionSummary, MetricsOptions};
use taskflow_domain::time::Timestamp;

use crate::state::AppState;
use crate::verifier::HmacSha256Verifier;

pub type TestState =
    AppState<Arc<StubRegistry>, Option<HmacSha256Verifier>, Arc<StubSubmitter>, StubLedger>;

pub struct StubRegistry {
    automations: Vec<Automation>,
}

impl AutomationRepository for StubRegistry {
    async fn create(&self, automation: Automation) -> Result<Automation, TaskflowError> {
        Ok(automation)
    }
    async fn get_by_id(&self, id: AutomationId) -> Result<Option<Automation>, TaskflowError> {
        Ok(self.automations.iter().find(|a| a.id == id).cloned())
    }
    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Automation>, TaskflowError> {
        Ok(self
            .automations
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect())
    }
    async fn list_active(
        &self,
        owner_id: Option<OwnerId>,
    ) -> Result<Vec<Automation>, TaskflowError> {
        Ok(self
            .automations
            .iter()
            .filter(|a| a.is_active && owner_id.is_none_or(|owner| a.owner_id == owner))
            .cloned()
            .collect())
    }
    async fn list_due_for_schedule(
        &self,
        _now: Timestamp,
    ) -> Result<Vec<Automation>, TaskflowError> {
        Ok(vec![])
    }
    async fn update_aggregates(
        &self,
        _id: AutomationId,
        _delta: AggregateDelta,
    ) -> Result<(), TaskflowError> {
        Ok(())
    }
    async fn compare_and_swap_next_run(
        &self,
        _id: AutomationId,
        _expected: Option<Timestamp>,
        _next: Option<Timestamp>,
    ) -> Result<bool, TaskflowError> {
        Ok(false)
    }
    async fn mark_invalid(
        &self,
        _id: AutomationId,
        _reason: String,
        _now: Timestamp,
    ) -> Result<(), TaskflowError> {
        Ok(())
    }
}

pub struct StubLedger {
    records: Vec<ExecutionRecord>,
}

impl ExecutionLedger for StubLedger {
    async fn append(&self, _record: ExecutionRecord) -> Result<(), TaskflowError> {
        Ok(())
    }
    async fn query(
        &self,
        owner_id: OwnerId,
        filter: ExecutionFilter,
        pagination: Pagination,
    ) -> Result<Vec<ExecutionRecord>, TaskflowError> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id && filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let limit = pagination.limit.map_or(usize::MAX, |l| l as usize);
        Ok(records
            .into_iter()
            .skip(pagination.offset as usize)
            .take(limit)
            .collect())
    }
    async fn summarize(
        &self,
        owner_id: OwnerId,
        as_of: Timestamp,
    ) -> Result<ExecutionSummary, TaskflowError> {
        let owned: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(ExecutionSummary::tally(&owned, as_of))
    }
}

/// Records submissions and reports them as skipped.
#[derive(Default)]
pub struct StubSubmitter {
    submitted: Mutex<Vec<AutomationId>>,
}

impl StubSubmitter {
    pub fn submitted(&self) -> Vec<AutomationId> {
        self.submitted.lock().unwrap().clone()
    }
}

impl ExecutionSubmitter for StubSubmitter {
    async fn submit(
        &self,
        automation_id: AutomationId,
        _payload: TriggerPayload,
    ) -> Result<SubmitOutcome, TaskflowError> {
        self.submitted.lock().unwrap().push(automation_id);
        Ok(SubmitOutcome::Skipped)
    }
}

pub fn lead_automation(owner_id: OwnerId, min_value: Option<f64>) -> Automation {
    Automation::builder()
        .name("Route big leads")
        .owner_id(owner_id)
        .trigger(Trigger::NewLead {
            sources: vec![],
            min_value,
        })
        .action(Action::UpdateCrm {
            record_type: CrmRecordType::Deal,
            record_id: "deal_1".to_string(),
            fields: serde_json::Map::new(),
        })
        .active()
        .build()
        .unwrap()
}

pub fn state_with(
    automations: Vec<Automation>,
    records: Vec<ExecutionRecord>,
    secret: Option<&str>,
) -> (TestState, Arc<StubSubmitter>) {
    let registry = Arc::new(StubRegistry { automations });
    let submitter = Arc::new(StubSubmitter::default());
    let state = AppState::new(
        TriggerDispatcher::new(
            Arc::clone(&registry),
            secret.map(HmacSha256Verifier::new),
            Arc::clone(&submitter),
            DEFAULT_DEDUPE_WINDOW,
        ),
        MetricsAggregator::new(registry, StubLedger { records }, MetricsOptions::default()),
    );
    (state, submitter)
}
