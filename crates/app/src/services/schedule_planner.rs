//! Schedule planner — fires cron automations whose `next_run` has come due.
//!
//! Each due automation is advanced with a compare-and-swap on `next_run`
//! before it is submitted, so concurrent planners (or overlapping ticks)
//! fire a given occurrence at most once. A fire that loses the swap is
//! dropped; a crash between the swap and the submission loses that fire.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use taskflow_domain::automation::{Automation, SchedulePayload, TriggerPayload};
use taskflow_domain::error::{InvalidScheduleError, NotFoundError, TaskflowError};
use taskflow_domain::id::AutomationId;
use taskflow_domain::schedule::compute_next_run;
use taskflow_domain::time::Timestamp;

use crate::ports::{AutomationRepository, ExecutionSubmitter, SubmitOutcome};

/// What one planner tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Automations returned as due.
    pub due: usize,
    /// Submissions accepted by the coordinator.
    pub fired: usize,
    /// Due automations not fired: lost the swap, busy or skipped.
    pub skipped: usize,
    /// Automations marked invalid because their schedule cannot be evaluated.
    pub invalidated: usize,
    /// Storage or submission errors.
    pub failed: usize,
}

pub struct SchedulePlanner<R, S> {
    registry: R,
    submitter: S,
}

impl<R, S> SchedulePlanner<R, S>
where
    R: AutomationRepository + Send + Sync,
    S: ExecutionSubmitter + Send + Sync,
{
    pub fn new(registry: R, submitter: S) -> Self {
        Self {
            registry,
            submitter,
        }
    }

    /// Fire every schedule automation due at `now`.
    ///
    /// # Errors
    ///
    /// Returns a storage error when due automations cannot be listed.
    /// Per-automation failures are logged and counted in the report.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self, now: Timestamp) -> Result<TickReport, TaskflowError> {
        let due = self.registry.list_due_for_schedule(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };
        for automation in due {
            match self.fire(&automation, now).await {
                Ok(Fired::Accepted) => report.fired += 1,
                Ok(Fired::NotFired) => report.skipped += 1,
                Ok(Fired::Invalidated) => report.invalidated += 1,
                Err(err) => {
                    tracing::error!(automation_id = %automation.id, error = %err, "failed to fire schedule");
                    report.failed += 1;
                }
            }
        }
        if report.due > 0 {
            tracing::info!(?report, "planner tick");
        }
        Ok(report)
    }

    async fn fire(&self, automation: &Automation, now: Timestamp) -> Result<Fired, TaskflowError> {
        let Some(scheduled_for) = automation.next_run else {
            return Ok(Fired::NotFired);
        };
        let next = match next_run_of(automation, now) {
            Ok(next) => next,
            Err(err) => {
                self.invalidate(automation, &err, now).await?;
                return Ok(Fired::Invalidated);
            }
        };

        let swapped = self
            .registry
            .compare_and_swap_next_run(automation.id, Some(scheduled_for), Some(next))
            .await?;
        if !swapped {
            tracing::warn!(automation_id = %automation.id, "occurrence already claimed by another planner");
            return Ok(Fired::NotFired);
        }

        let payload = TriggerPayload::CustomSchedule(SchedulePayload {
            scheduled_for,
            fired_at: now,
        });
        match self.submitter.submit(automation.id, payload).await? {
            SubmitOutcome::Accepted(handle) => {
                tracing::info!(
                    automation_id = %automation.id,
                    execution_id = %handle.execution_id(),
                    %scheduled_for,
                    %next,
                    "schedule fired"
                );
                Ok(Fired::Accepted)
            }
            outcome => {
                tracing::info!(
                    automation_id = %automation.id,
                    outcome = outcome.label(),
                    "scheduled occurrence not executed"
                );
                Ok(Fired::NotFired)
            }
        }
    }

    /// Set the first `next_run` of a schedule automation after `now`.
    ///
    /// Returns the stored value; an automation whose `next_run` already lies
    /// in the future keeps it.
    ///
    /// # Errors
    ///
    /// - [`TaskflowError::NotFound`] for an unknown automation.
    /// - [`TaskflowError::InvalidSchedule`] when the automation has no
    ///   schedule trigger or the schedule cannot be evaluated; in the latter
    ///   case the automation is also marked invalid.
    #[tracing::instrument(skip(self))]
    pub async fn arm(
        &self,
        automation_id: AutomationId,
        now: Timestamp,
    ) -> Result<Timestamp, TaskflowError> {
        let automation = self
            .registry
            .get_by_id(automation_id)
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Automation",
                id: automation_id.to_string(),
            })?;
        if !automation.is_schedule_based() {
            return Err(InvalidScheduleError::NotScheduled.into());
        }
        if let Some(current) = automation.next_run.filter(|next| *next > now) {
            return Ok(current);
        }
        let next = match next_run_of(&automation, now) {
            Ok(next) => next,
            Err(err) => {
                self.invalidate(&automation, &err, now).await?;
                return Err(err.into());
            }
        };
        self.registry
            .compare_and_swap_next_run(automation_id, automation.next_run, Some(next))
            .await?;
        Ok(next)
    }

    /// Arm every active schedule automation that has no `next_run`.
    ///
    /// Returns how many were armed.
    ///
    /// # Errors
    ///
    /// Returns a storage error when active automations cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn arm_all(&self, now: Timestamp) -> Result<usize, TaskflowError> {
        let unarmed: Vec<_> = self
            .registry
            .list_active(None)
            .await?
            .into_iter()
            .filter(|a| a.is_schedule_based() && a.next_run.is_none())
            .collect();
        let mut armed = 0;
        for automation in unarmed {
            match self.arm(automation.id, now).await {
                Ok(_) => armed += 1,
                Err(err) => {
                    tracing::warn!(automation_id = %automation.id, error = %err, "could not arm schedule");
                }
            }
        }
        tracing::info!(armed, "schedules armed");
        Ok(armed)
    }

    /// Tick every `interval` until `shutdown` flips to `true`.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(?interval, "schedule planner started");
        loop {
            tokio::select! {
                biased;
                requested = async { shutdown.wait_for(|stop| *stop).await.is_ok() } => {
                    if requested {
                        break;
                    }
                    // Sender gone without a shutdown request: keep ticking.
                    ticker.tick().await;
                }
                _ = ticker.tick() => {}
            }
            if let Err(err) = self.tick(taskflow_domain::time::now()).await {
                tracing::error!(error = %err, "planner tick failed");
            }
        }
        tracing::info!("schedule planner stopped");
    }

    async fn invalidate(
        &self,
        automation: &Automation,
        err: &InvalidScheduleError,
        now: Timestamp,
    ) -> Result<(), TaskflowError> {
        tracing::warn!(automation_id = %automation.id, error = %err, "schedule cannot be evaluated, marking automation invalid");
        self.registry
            .mark_invalid(automation.id, err.to_string(), now)
            .await
    }
}

enum Fired {
    Accepted,
    NotFired,
    Invalidated,
}

fn next_run_of(automation: &Automation, from: Timestamp) -> Result<Timestamp, InvalidScheduleError> {
    let (expression, timezone) = automation
        .trigger
        .schedule()
        .ok_or(InvalidScheduleError::NotScheduled)?;
    compute_next_run(expression, timezone, from)
}
