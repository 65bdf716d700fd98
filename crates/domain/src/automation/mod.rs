//! Automation — trigger → action rules owned by a user.
//!
//! Each automation pairs one [`Trigger`] (an inbound event shape or a cron
//! schedule) with one [`Action`] performed through an integration capability.
//! The automation also carries the aggregate counters of its executions;
//! those only change when an execution record is finalized.

mod action;
mod payload;
mod trigger;

pub use action::{Action, ActionKind, CrmRecordType, TaskPriority};
pub use payload::{
    EmailOpenPayload, LeadPayload, PaymentPayload, SchedulePayload, TriggerPayload,
};
pub use trigger::{Trigger, TriggerKind};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TaskflowError, ValidationError};
use crate::execution::{AggregateDelta, ExecutionStatus};
use crate::id::{AutomationId, OwnerId};
use crate::time::Timestamp;

/// Lifecycle of an automation.
///
/// ```text
/// draft → active ⇄ inactive
///   any → invalid (bad schedule)
/// invalid → draft (after correction)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    Invalid,
}

impl AutomationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for AutomationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutomationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "invalid" => Ok(Self::Invalid),
            other => Err(other.to_string()),
        }
    }
}

/// Business area an automation belongs to, used for metrics breakdowns.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sales,
    Marketing,
    Support,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Self; 4] = [Self::Sales, Self::Marketing, Self::Support, Self::General];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Marketing => "marketing",
            Self::Support => "support",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A user-owned rule that reacts to a trigger by performing one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    pub owner_id: OwnerId,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub trigger: Trigger,
    pub action: Action,
    pub status: AutomationStatus,
    pub is_active: bool,
    /// Why the automation was marked invalid, if it was.
    pub status_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_run: Option<Timestamp>,
    /// Next fire time; only set for active schedule automations.
    pub next_run: Option<Timestamp>,
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub cancelled_count: u64,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TaskflowError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `is_active` is set on a non-active status ([`ValidationError::ActiveWithoutActiveStatus`])
    /// - `next_run` is set on anything but an active schedule automation
    ///   ([`ValidationError::UnexpectedNextRun`])
    pub fn validate(&self) -> Result<(), TaskflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.is_active && self.status != AutomationStatus::Active {
            return Err(ValidationError::ActiveWithoutActiveStatus.into());
        }
        if self.next_run.is_some() && !(self.is_active && self.is_schedule_based()) {
            return Err(ValidationError::UnexpectedNextRun.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_schedule_based(&self) -> bool {
        self.trigger.kind().is_schedule()
    }

    /// Whether the automation may currently fire.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.is_active && self.status == AutomationStatus::Active
    }

    /// Move to `active`. Activating an already active automation is a no-op.
    ///
    /// The schedule planner is responsible for arming `next_run` afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] from `invalid`.
    pub fn activate(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        match self.status {
            AutomationStatus::Active => Ok(()),
            AutomationStatus::Draft | AutomationStatus::Inactive => {
                self.status = AutomationStatus::Active;
                self.is_active = true;
                self.updated_at = now;
                Ok(())
            }
            AutomationStatus::Invalid => Err(self.transition_error(AutomationStatus::Active)),
        }
    }

    /// Move to `inactive`, disarming any schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] unless the automation
    /// is active or already inactive.
    pub fn deactivate(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        match self.status {
            AutomationStatus::Inactive => Ok(()),
            AutomationStatus::Active => {
                self.status = AutomationStatus::Inactive;
                self.is_active = false;
                self.next_run = None;
                self.updated_at = now;
                Ok(())
            }
            AutomationStatus::Draft | AutomationStatus::Invalid => {
                Err(self.transition_error(AutomationStatus::Inactive))
            }
        }
    }

    /// Move to `invalid` from any state, recording why.
    pub fn mark_invalid(&mut self, reason: impl Into<String>, now: Timestamp) {
        self.status = AutomationStatus::Invalid;
        self.is_active = false;
        self.next_run = None;
        self.status_reason = Some(reason.into());
        self.updated_at = now;
    }

    /// Return an `invalid` automation to `draft` after its configuration was
    /// corrected.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] from any other state.
    pub fn return_to_draft(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        if self.status != AutomationStatus::Invalid {
            return Err(self.transition_error(AutomationStatus::Draft));
        }
        self.status = AutomationStatus::Draft;
        self.status_reason = None;
        self.updated_at = now;
        Ok(())
    }

    /// Fold one finalized execution into the aggregate counters.
    ///
    /// `ran_at` is the execution's start time; `last_run` only moves forward.
    /// `Pending` is ignored: only terminal outcomes are counted.
    pub fn record_outcome(&mut self, status: ExecutionStatus, ran_at: Timestamp) {
        let counter = match status {
            ExecutionStatus::Pending => return,
            ExecutionStatus::Success => &mut self.success_count,
            ExecutionStatus::Failure => &mut self.failure_count,
            ExecutionStatus::Cancelled => &mut self.cancelled_count,
        };
        *counter += 1;
        self.execution_count += 1;
        self.last_run = Some(self.last_run.map_or(ran_at, |last| last.max(ran_at)));
        self.updated_at = self.updated_at.max(ran_at);
    }

    /// Apply the delta of one finalized execution.
    pub fn apply(&mut self, delta: AggregateDelta) {
        self.record_outcome(delta.outcome, delta.ran_at);
    }

    /// `execution_count` equals the sum of the outcome counters.
    #[must_use]
    pub fn counters_consistent(&self) -> bool {
        self.execution_count == self.success_count + self.failure_count + self.cancelled_count
    }

    fn transition_error(&self, to: AutomationStatus) -> ValidationError {
        ValidationError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    owner_id: Option<OwnerId>,
    name: Option<String>,
    description: Option<String>,
    category: Category,
    trigger: Option<Trigger>,
    action: Option<Action>,
    status: AutomationStatus,
    is_active: bool,
    created_at: Option<Timestamp>,
    next_run: Option<Timestamp>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn owner_id(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Build the automation already in the `active` state.
    #[must_use]
    pub fn active(mut self) -> Self {
        self.status = AutomationStatus::Active;
        self.is_active = true;
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    #[must_use]
    pub fn next_run(mut self, ts: Timestamp) -> Self {
        self.next_run = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskflowError::Validation`] if required fields are missing or
    /// the result violates an invariant.
    pub fn build(self) -> Result<Automation, TaskflowError> {
        let trigger = self.trigger.ok_or(ValidationError::MissingTrigger)?;
        let action = self.action.ok_or(ValidationError::MissingAction)?;
        let created_at = self.created_at.unwrap_or_else(crate::time::now);
        let automation = Automation {
            id: self.id.unwrap_or_default(),
            owner_id: self.owner_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            category: self.category,
            trigger,
            action,
            status: self.status,
            is_active: self.is_active,
            status_reason: None,
            created_at,
            updated_at: created_at,
            last_run: None,
            next_run: self.next_run,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            cancelled_count: 0,
        };
        automation.validate()?;
        Ok(automation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn valid_action() -> Action {
        Action::CreateTask {
            title: "Follow up".to_string(),
            description: None,
            assignee_id: None,
            priority: TaskPriority::High,
            due_date: None,
        }
    }

    fn lead_trigger() -> Trigger {
        Trigger::NewLead {
            sources: vec![],
            min_value: Some(100.0),
        }
    }

    fn schedule_trigger() -> Trigger {
        Trigger::CustomSchedule {
            cron_expression: "*/5 * * * *".to_string(),
            timezone: None,
        }
    }

    fn valid_automation() -> Automation {
        Automation::builder()
            .name("Follow up on big leads")
            .category(Category::Sales)
            .trigger(lead_trigger())
            .action(valid_action())
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_draft_automation_when_required_fields_provided() {
        let auto = valid_automation();
        assert_eq!(auto.name, "Follow up on big leads");
        assert_eq!(auto.status, AutomationStatus::Draft);
        assert!(!auto.is_active);
        assert_eq!(auto.execution_count, 0);
        assert!(auto.last_run.is_none());
        assert_eq!(auto.created_at, auto.updated_at);
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Automation::builder()
            .trigger(lead_trigger())
            .action(valid_action())
            .build();
        assert!(matches!(
            result,
            Err(TaskflowError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_action_is_missing() {
        let result = Automation::builder()
            .name("No action")
            .trigger(lead_trigger())
            .build();
        assert!(matches!(
            result,
            Err(TaskflowError::Validation(ValidationError::MissingAction))
        ));
    }

    #[test]
    fn should_reject_next_run_on_event_automation() {
        let result = Automation::builder()
            .name("Lead rule")
            .trigger(lead_trigger())
            .action(valid_action())
            .active()
            .next_run(crate::time::now())
            .build();
        assert!(matches!(
            result,
            Err(TaskflowError::Validation(ValidationError::UnexpectedNextRun))
        ));
    }

    #[test]
    fn should_accept_next_run_on_active_schedule_automation() {
        let auto = Automation::builder()
            .name("Every five minutes")
            .trigger(schedule_trigger())
            .action(valid_action())
            .active()
            .next_run(crate::time::now())
            .build()
            .unwrap();
        assert!(auto.is_schedule_based());
        assert!(auto.is_runnable());
    }

    #[test]
    fn should_reject_active_flag_without_active_status() {
        let mut auto = valid_automation();
        auto.is_active = true;
        assert!(matches!(
            auto.validate(),
            Err(TaskflowError::Validation(
                ValidationError::ActiveWithoutActiveStatus
            ))
        ));
    }

    #[test]
    fn should_activate_and_deactivate_automation() {
        let mut auto = valid_automation();
        let now = crate::time::now();
        auto.activate(now).unwrap();
        assert_eq!(auto.status, AutomationStatus::Active);
        assert!(auto.is_active);

        auto.deactivate(now).unwrap();
        assert_eq!(auto.status, AutomationStatus::Inactive);
        assert!(!auto.is_active);
        assert!(auto.next_run.is_none());

        auto.activate(now).unwrap();
        assert!(auto.is_runnable());
    }

    #[test]
    fn should_refuse_to_deactivate_draft() {
        let mut auto = valid_automation();
        let err = auto.deactivate(crate::time::now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidTransition {
                from: "draft".to_string(),
                to: "inactive".to_string()
            }
        );
    }

    #[test]
    fn should_mark_invalid_and_disarm_schedule() {
        let now = crate::time::now();
        let mut auto = Automation::builder()
            .name("Broken schedule")
            .trigger(schedule_trigger())
            .action(valid_action())
            .active()
            .next_run(now)
            .build()
            .unwrap();

        auto.mark_invalid("bad cron", now);

        assert_eq!(auto.status, AutomationStatus::Invalid);
        assert!(!auto.is_active);
        assert!(auto.next_run.is_none());
        assert_eq!(auto.status_reason.as_deref(), Some("bad cron"));
        assert!(auto.activate(now).is_err());

        auto.return_to_draft(now).unwrap();
        assert_eq!(auto.status, AutomationStatus::Draft);
        assert!(auto.status_reason.is_none());
    }

    #[test]
    fn should_fold_outcomes_into_counters() {
        let mut auto = valid_automation();
        let t0 = crate::time::now();
        auto.record_outcome(ExecutionStatus::Success, t0);
        auto.record_outcome(ExecutionStatus::Failure, t0 + Duration::seconds(1));
        auto.record_outcome(ExecutionStatus::Cancelled, t0 + Duration::seconds(2));
        auto.record_outcome(ExecutionStatus::Pending, t0 + Duration::seconds(3));

        assert_eq!(auto.execution_count, 3);
        assert_eq!(auto.success_count, 1);
        assert_eq!(auto.failure_count, 1);
        assert_eq!(auto.cancelled_count, 1);
        assert!(auto.counters_consistent());
        assert_eq!(auto.last_run, Some(t0 + Duration::seconds(2)));
    }

    #[test]
    fn should_keep_latest_last_run_when_outcomes_arrive_out_of_order() {
        let mut auto = valid_automation();
        let t0 = crate::time::now();
        auto.record_outcome(ExecutionStatus::Success, t0 + Duration::seconds(5));
        auto.record_outcome(ExecutionStatus::Success, t0);
        assert_eq!(auto.last_run, Some(t0 + Duration::seconds(5)));
    }

    #[test]
    fn should_parse_status_and_category_names() {
        assert_eq!("invalid".parse(), Ok(AutomationStatus::Invalid));
        assert_eq!("marketing".parse(), Ok(Category::Marketing));
        assert!("unknown".parse::<Category>().is_err());
    }

    #[test]
    fn should_roundtrip_automation_through_serde_json() {
        let auto = valid_automation();
        let json = serde_json::to_string(&auto).unwrap();
        let parsed: Automation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, auto);
    }
}
