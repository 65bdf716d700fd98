//! Execution coordinator — runs accepted automations one at a time each.
//!
//! Every submission goes through the same steps: load the automation, take
//! its lease (or report [`SubmitOutcome::Busy`]), open a pending record and
//! hand the rest to a background task. That task drives the action runner
//! under the retry policy, finalizes the record, appends it to the ledger,
//! releases the lease and folds the outcome into the automation aggregates.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use taskflow_domain::automation::{Automation, TriggerPayload};
use taskflow_domain::error::{NotFoundError, TaskflowError};
use taskflow_domain::execution::{ActionResult, AggregateDelta, ExecutionRecord};
use taskflow_domain::id::AutomationId;
use taskflow_domain::lease::Lease;
use taskflow_domain::time::Timestamp;

use crate::ports::{
    AutomationRepository, ExecutionHandle, ExecutionLedger, ExecutionSubmitter, LeaseStore,
    OwnerContext, SubmitOutcome,
};
use crate::services::action_executor::ActionRunner;

/// Exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_factor: u32,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            backoff_factor: 2,
            backoff_cap: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_factor
            .checked_pow(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .map_or(self.backoff_cap, |delay| delay.min(self.backoff_cap))
    }

    /// Longest time an execution can take when every attempt times out.
    #[must_use]
    pub fn worst_case(&self, attempt_timeout: Duration) -> Duration {
        let attempts = attempt_timeout.saturating_mul(self.max_retries.saturating_add(1));
        (1..=self.max_retries)
            .map(|retry| self.backoff(retry))
            .fold(attempts, Duration::saturating_add)
    }
}

/// Coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub retry: RetryPolicy,
    /// Added to the worst-case execution time to form the lease TTL.
    pub lease_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            lease_grace: Duration::from_secs(30),
        }
    }
}

/// How the attempt loop ended.
enum Settled {
    Finished(ActionResult),
    Cancelled { attempts: u32 },
}

/// Decrements the in-flight counter when an execution task ends, even by
/// panicking.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn enter(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

struct Inner<R, L, S, X> {
    registry: R,
    ledger: L,
    leases: S,
    runner: X,
    config: CoordinatorConfig,
    cancel: watch::Sender<bool>,
    in_flight: Arc<watch::Sender<usize>>,
}

/// Enforces at most one in-flight execution per automation.
pub struct ExecutionCoordinator<R, L, S, X> {
    inner: Arc<Inner<R, L, S, X>>,
}

impl<R, L, S, X> Clone for ExecutionCoordinator<R, L, S, X> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, L, S, X> ExecutionCoordinator<R, L, S, X>
where
    R: AutomationRepository + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
    S: LeaseStore + Send + Sync + 'static,
    X: ActionRunner,
{
    pub fn new(registry: R, ledger: L, leases: S, runner: X, config: CoordinatorConfig) -> Self {
        let (cancel, _) = watch::channel(false);
        let (in_flight, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                registry,
                ledger,
                leases,
                runner,
                config,
                cancel,
                in_flight: Arc::new(in_flight),
            }),
        }
    }

    /// Accept an automation for execution without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`TaskflowError::NotFound`] for an unknown automation, or a
    /// storage error from the registry or lease store.
    #[tracing::instrument(skip(self, payload), fields(trigger = %payload.kind()))]
    pub async fn submit(
        &self,
        automation_id: AutomationId,
        payload: TriggerPayload,
    ) -> Result<SubmitOutcome, TaskflowError> {
        if self.is_shutting_down() {
            tracing::warn!("coordinator is shutting down, skipping submission");
            return Ok(SubmitOutcome::Skipped);
        }
        let inner = &self.inner;
        let automation = inner
            .registry
            .get_by_id(automation_id)
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Automation",
                id: automation_id.to_string(),
            })?;
        if !automation.is_runnable() {
            tracing::debug!(status = %automation.status, "automation is not active, skipping");
            return Ok(SubmitOutcome::Skipped);
        }

        let now = taskflow_domain::time::now();
        let ttl = inner.lease_ttl(&automation);
        let Some(lease) = inner.leases.try_acquire(automation_id, ttl, now).await? else {
            tracing::warn!("automation already has an execution in flight");
            return Ok(SubmitOutcome::Busy);
        };

        let record = ExecutionRecord::pending(
            automation_id,
            automation.owner_id,
            payload.to_value(),
            now,
        )
        .with_metadata("action", automation.action.kind().as_str())
        .with_metadata("trigger_source", payload.kind().as_str());
        let execution_id = record.id;
        tracing::info!(%execution_id, "execution accepted");

        let guard = InFlight::enter(&inner.in_flight);
        let task_inner = Arc::clone(inner);
        let join = tokio::spawn(async move {
            let _guard = guard;
            task_inner.run(automation, record, lease, payload).await
        });
        Ok(SubmitOutcome::Accepted(ExecutionHandle::new(
            execution_id,
            join,
        )))
    }

    /// Cancel in-flight executions and wait until all of them are finalized.
    pub async fn shutdown(&self) {
        self.inner.cancel.send_replace(true);
        let mut in_flight = self.inner.in_flight.subscribe();
        let remaining = *in_flight.borrow();
        tracing::info!(remaining, "cancelling in-flight executions");
        let _ = in_flight.wait_for(|n| *n == 0).await;
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    /// Number of executions currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }
}

impl<R, L, S, X> ExecutionSubmitter for ExecutionCoordinator<R, L, S, X>
where
    R: AutomationRepository + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
    S: LeaseStore + Send + Sync + 'static,
    X: ActionRunner,
{
    fn submit(
        &self,
        automation_id: AutomationId,
        payload: TriggerPayload,
    ) -> impl Future<Output = Result<SubmitOutcome, TaskflowError>> + Send {
        ExecutionCoordinator::submit(self, automation_id, payload)
    }
}

impl<R, L, S, X> Inner<R, L, S, X>
where
    R: AutomationRepository + Send + Sync + 'static,
    L: ExecutionLedger + Send + Sync + 'static,
    S: LeaseStore + Send + Sync + 'static,
    X: ActionRunner,
{
    fn lease_ttl(&self, automation: &Automation) -> chrono::Duration {
        let attempt = self.runner.attempt_timeout(automation.action.kind());
        let ttl = self
            .config
            .retry
            .worst_case(attempt)
            .saturating_add(self.config.lease_grace);
        chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
    }

    #[tracing::instrument(
        skip_all,
        fields(automation_id = %automation.id, execution_id = %record.id)
    )]
    async fn run(
        &self,
        automation: Automation,
        mut record: ExecutionRecord,
        lease: Lease,
        payload: TriggerPayload,
    ) -> ExecutionRecord {
        let clock = tokio::time::Instant::now();
        let context = OwnerContext {
            owner_id: automation.owner_id,
            automation_id: automation.id,
            execution_id: record.id,
        };

        let settled = self.attempt(&automation, &payload, &context).await;
        let completed_at = elapsed_since(record.started_at, clock);
        let finalized = match settled {
            Settled::Finished(result) => {
                record.metadata.insert("attempts".into(), result.attempts.into());
                record.complete(result, completed_at)
            }
            Settled::Cancelled { attempts } => {
                record.metadata.insert("attempts".into(), attempts.into());
                record.cancel("execution cancelled by shutdown", completed_at)
            }
        };
        if let Err(err) = finalized {
            tracing::error!(error = %err, "execution record could not be finalized");
        }
        tracing::info!(
            status = %record.status,
            duration_ms = record.duration_ms,
            error_kind = record.error_kind.map(|k| k.as_str()),
            "execution finalized"
        );

        if let Err(err) = self.ledger.append(record.clone()).await {
            tracing::error!(error = %err, "failed to append execution record to ledger");
        }
        match self.leases.release(&lease).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("lease expired before the execution finished"),
            Err(err) => tracing::error!(error = %err, "failed to release lease"),
        }
        if let Some(delta) = AggregateDelta::from_record(&record)
            && let Err(err) = self.registry.update_aggregates(automation.id, delta).await
        {
            tracing::error!(error = %err, "failed to update automation aggregates");
        }
        record
    }

    /// Run attempts until success, a non-retryable failure, exhausted retries
    /// or cancellation.
    async fn attempt(
        &self,
        automation: &Automation,
        payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> Settled {
        let mut cancel = self.cancel.subscribe();
        let policy = self.config.retry;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let mut result = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => return Settled::Cancelled { attempts: attempt },
                result = self.runner.execute(&automation.action, payload, context) => result,
            };
            result.attempts = attempt;

            let retryable = result.error_kind.is_some_and(|kind| kind.is_retryable());
            if result.ok || !retryable || attempt > policy.max_retries {
                return Settled::Finished(result);
            }

            let delay = policy.backoff(attempt);
            tracing::warn!(
                attempt,
                error_kind = ?result.error_kind,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "attempt failed, retrying"
            );
            tokio::select! {
                biased;
                () = cancelled(&mut cancel) => return Settled::Cancelled { attempts: attempt },
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Resolves once shutdown has been signalled.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        // The sender lives as long as the coordinator; never cancel by accident.
        std::future::pending::<()>().await;
    }
}

/// Completion time measured on the monotonic clock from `started_at`.
fn elapsed_since(started_at: Timestamp, clock: tokio::time::Instant) -> Timestamp {
    chrono::Duration::from_std(clock.elapsed())
        .ok()
        .and_then(|elapsed| started_at.checked_add_signed(elapsed))
        .unwrap_or(started_at)
}
