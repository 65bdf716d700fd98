//! Action executor — routes an action to its integration capability.
//!
//! One attempt per call: the executor validates the configuration, invokes
//! the capability on its own task under a hard timeout and normalizes every
//! way the call can end (receipt, classified error, timeout, panic) into an
//! [`ActionResult`]. Retrying is the coordinator's business.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinError};

use taskflow_domain::automation::{Action, ActionKind, TriggerPayload};
use taskflow_domain::execution::{ActionResult, ErrorKind};

use crate::ports::{ActionCapability, IntegrationError, OwnerContext};

/// Runs a single attempt of an action.
///
/// Implementations never panic and never return early without a result:
/// every failure is classified inside the returned [`ActionResult`].
pub trait ActionRunner: Send + Sync + 'static {
    fn execute(
        &self,
        action: &Action,
        payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = ActionResult> + Send;

    /// Upper bound of a single attempt for `kind`.
    fn attempt_timeout(&self, kind: ActionKind) -> Duration;
}

/// Timeouts applied to capability calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub default_timeout: Duration,
    /// Per-kind overrides of `default_timeout`.
    pub timeouts: HashMap<ActionKind, Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            timeouts: HashMap::new(),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, kind: ActionKind, timeout: Duration) -> Self {
        self.timeouts.insert(kind, timeout);
        self
    }

    #[must_use]
    pub fn timeout_for(&self, kind: ActionKind) -> Duration {
        self.timeouts
            .get(&kind)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

/// Dispatches each action kind to its capability.
pub struct ActionExecutor<E, T, C, R> {
    email: Arc<E>,
    tasks: Arc<T>,
    crm: Arc<C>,
    reports: Arc<R>,
    config: ExecutorConfig,
}

impl<E, T, C, R> ActionExecutor<E, T, C, R>
where
    E: ActionCapability,
    T: ActionCapability,
    C: ActionCapability,
    R: ActionCapability,
{
    /// Create an executor from one capability per action kind.
    pub fn new(email: E, tasks: T, crm: C, reports: R, config: ExecutorConfig) -> Self {
        Self {
            email: Arc::new(email),
            tasks: Arc::new(tasks),
            crm: Arc::new(crm),
            reports: Arc::new(reports),
            config,
        }
    }

    /// Execute one attempt of `action`.
    #[tracing::instrument(
        skip(self, action, payload, context),
        fields(action = %action.kind(), execution_id = %context.execution_id)
    )]
    pub async fn execute(
        &self,
        action: &Action,
        payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> ActionResult {
        if let Err(err) = action.validate() {
            tracing::warn!(error = %err, "rejecting action configuration");
            return ActionResult::failure(ErrorKind::InvalidConfig, err.to_string(), 1);
        }
        let timeout = self.config.timeout_for(action.kind());
        let call = (action.clone(), payload.clone(), *context);
        match action {
            Action::SendEmail { .. } => invoke(&self.email, call, timeout).await,
            Action::CreateTask { .. } => invoke(&self.tasks, call, timeout).await,
            Action::UpdateCrm { .. } => invoke(&self.crm, call, timeout).await,
            Action::GenerateReport { .. } => invoke(&self.reports, call, timeout).await,
        }
    }
}

impl<E, T, C, R> ActionRunner for ActionExecutor<E, T, C, R>
where
    E: ActionCapability,
    T: ActionCapability,
    C: ActionCapability,
    R: ActionCapability,
{
    fn execute(
        &self,
        action: &Action,
        payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = ActionResult> + Send {
        ActionExecutor::execute(self, action, payload, context)
    }

    fn attempt_timeout(&self, kind: ActionKind) -> Duration {
        self.config.timeout_for(kind)
    }
}

impl<X: ActionRunner> ActionRunner for Arc<X> {
    fn execute(
        &self,
        action: &Action,
        payload: &TriggerPayload,
        context: &OwnerContext,
    ) -> impl Future<Output = ActionResult> + Send {
        (**self).execute(action, payload, context)
    }

    fn attempt_timeout(&self, kind: ActionKind) -> Duration {
        (**self).attempt_timeout(kind)
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn invoke<K: ActionCapability>(
    capability: &Arc<K>,
    (action, payload, context): (Action, TriggerPayload, OwnerContext),
    timeout: Duration,
) -> ActionResult {
    let capability = Arc::clone(capability);
    let cancellable = capability.supports_cancellation();
    let mut task =
        tokio::spawn(async move { capability.invoke(&action, &payload, &context).await });
    // Covers both the timeout below and the caller dropping this future.
    let _abort = cancellable.then(|| AbortOnDrop(task.abort_handle()));

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(Ok(receipt))) => ActionResult::success(receipt.provider_ref, receipt.output, 1),
        Ok(Ok(Err(IntegrationError::Transient(message)))) => {
            ActionResult::failure(ErrorKind::Transient, message, 1)
        }
        Ok(Ok(Err(IntegrationError::Permanent(message)))) => {
            ActionResult::failure(ErrorKind::Permanent, message, 1)
        }
        Ok(Err(err)) => joined_with_error(err),
        Err(_) => {
            if cancellable {
                tracing::warn!(?timeout, "integration call timed out, aborting");
            } else {
                tracing::warn!(?timeout, "integration call timed out, detaching");
            }
            ActionResult::failure(
                ErrorKind::Timeout,
                format!("no response within {}ms", timeout.as_millis()),
                1,
            )
        }
    }
}

fn joined_with_error(err: JoinError) -> ActionResult {
    if err.is_panic() {
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "integration panicked".to_string());
        tracing::error!(%message, "integration panicked");
        ActionResult::failure(ErrorKind::Panicked, message, 1)
    } else {
        ActionResult::failure(ErrorKind::Cancelled, "integration call was cancelled", 1)
    }
}
