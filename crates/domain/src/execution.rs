//! Execution records — the audit trail of every attempt to run an automation.
//!
//! A record is created `pending` when an execution starts and is finalized
//! exactly once into a terminal status. Finalized records are immutable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::id::{AutomationId, ExecutionId, OwnerId};
use crate::time::{Timestamp, elapsed_ms};

/// State of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failure,
    Cancelled,
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(other.to_string()),
        }
    }
}

/// Classification of a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or provider hiccup; worth retrying.
    Transient,
    /// The provider refused the request; retrying will not help.
    Permanent,
    /// The capability did not answer within the action timeout.
    Timeout,
    /// The action configuration was rejected before any call was made.
    InvalidConfig,
    /// The capability panicked.
    Panicked,
    /// The execution was interrupted by shutdown.
    Cancelled,
}

impl ErrorKind {
    /// Only transient failures and timeouts are retried.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Timeout)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Timeout => "timeout",
            Self::InvalidConfig => "invalid_config",
            Self::Panicked => "panicked",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transient" => Ok(Self::Transient),
            "permanent" => Ok(Self::Permanent),
            "timeout" => Ok(Self::Timeout),
            "invalid_config" => Ok(Self::InvalidConfig),
            "panicked" => Ok(Self::Panicked),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(other.to_string()),
        }
    }
}

/// Outcome reported by the action executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub ok: bool,
    /// Provider-side reference (message id, task id, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Number of capability calls made, including the successful one.
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub output: Value,
}

impl ActionResult {
    #[must_use]
    pub fn success(provider_ref: Option<String>, output: Value, attempts: u32) -> Self {
        Self {
            ok: true,
            provider_ref,
            error_kind: None,
            message: None,
            attempts,
            output,
        }
    }

    #[must_use]
    pub fn failure(kind: ErrorKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            ok: false,
            provider_ref: None,
            error_kind: Some(kind),
            message: Some(message.into()),
            attempts,
            output: Value::Null,
        }
    }
}

/// One attempt to run an automation, from start to terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub automation_id: AutomationId,
    pub owner_id: OwnerId,
    pub status: ExecutionStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub duration_ms: Option<u64>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub trigger_payload: Value,
    pub action_result: Option<ActionResult>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ExecutionRecord {
    /// Start a new `pending` record.
    #[must_use]
    pub fn pending(
        automation_id: AutomationId,
        owner_id: OwnerId,
        trigger_payload: Value,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            automation_id,
            owner_id,
            status: ExecutionStatus::Pending,
            started_at,
            completed_at: None,
            duration_ms: None,
            error_kind: None,
            error_message: None,
            trigger_payload,
            action_result: None,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// Finalize from the executor's result: `success` when `result.ok`,
    /// otherwise `failure` carrying the result's error kind and message.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AlreadyFinalized`] if the record is not
    /// pending.
    pub fn complete(
        &mut self,
        result: ActionResult,
        completed_at: Timestamp,
    ) -> Result<(), ValidationError> {
        if result.ok {
            self.finish(ExecutionStatus::Success, completed_at, None, Some(result))
        } else {
            let kind = result.error_kind.unwrap_or(ErrorKind::Permanent);
            let message = result.message.clone().unwrap_or_default();
            self.finish(
                ExecutionStatus::Failure,
                completed_at,
                Some((kind, message)),
                Some(result),
            )
        }
    }

    /// Finalize as `failure` without an action result (e.g. the automation
    /// vanished or its action could not be started).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AlreadyFinalized`] if the record is not
    /// pending.
    pub fn fail(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
        completed_at: Timestamp,
    ) -> Result<(), ValidationError> {
        self.finish(
            ExecutionStatus::Failure,
            completed_at,
            Some((kind, message.into())),
            None,
        )
    }

    /// Finalize as `cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AlreadyFinalized`] if the record is not
    /// pending.
    pub fn cancel(
        &mut self,
        message: impl Into<String>,
        completed_at: Timestamp,
    ) -> Result<(), ValidationError> {
        self.finish(
            ExecutionStatus::Cancelled,
            completed_at,
            Some((ErrorKind::Cancelled, message.into())),
            None,
        )
    }

    fn finish(
        &mut self,
        status: ExecutionStatus,
        completed_at: Timestamp,
        error: Option<(ErrorKind, String)>,
        result: Option<ActionResult>,
    ) -> Result<(), ValidationError> {
        if self.is_finalized() {
            return Err(ValidationError::AlreadyFinalized);
        }
        let completed_at = completed_at.max(self.started_at);
        self.status = status;
        self.completed_at = Some(completed_at);
        self.duration_ms = Some(elapsed_ms(self.started_at, completed_at));
        if let Some((kind, message)) = error {
            self.error_kind = Some(kind);
            self.error_message = Some(message);
        }
        self.action_result = result;
        Ok(())
    }
}

/// Change applied to an automation's aggregate counters when one of its
/// executions is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateDelta {
    pub outcome: ExecutionStatus,
    /// The execution's `started_at`, which becomes the automation's `last_run`.
    pub ran_at: Timestamp,
}

impl AggregateDelta {
    /// Delta for a finalized record; `None` while the record is pending.
    #[must_use]
    pub fn from_record(record: &ExecutionRecord) -> Option<Self> {
        record.is_finalized().then_some(Self {
            outcome: record.status,
            ran_at: record.started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending() -> ExecutionRecord {
        ExecutionRecord::pending(
            AutomationId::new(),
            OwnerId::new(),
            serde_json::json!({"type": "new_lead", "value": 150}),
            crate::time::now(),
        )
    }

    #[test]
    fn should_start_pending_without_completion() {
        let record = pending();
        assert_eq!(record.status, ExecutionStatus::Pending);
        assert!(record.completed_at.is_none());
        assert!(record.duration_ms.is_none());
        assert!(!record.is_finalized());
    }

    #[test]
    fn should_complete_successfully_with_duration() {
        let mut record = pending();
        let done = record.started_at + Duration::milliseconds(250);
        record
            .complete(
                ActionResult::success(Some("task_1".to_string()), Value::Null, 1),
                done,
            )
            .unwrap();

        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.completed_at, Some(done));
        assert_eq!(record.duration_ms, Some(250));
        assert!(record.error_kind.is_none());
        assert_eq!(
            record.action_result.unwrap().provider_ref.as_deref(),
            Some("task_1")
        );
    }

    #[test]
    fn should_record_error_kind_when_result_failed() {
        let mut record = pending();
        let done = record.started_at + Duration::seconds(1);
        record
            .complete(ActionResult::failure(ErrorKind::Timeout, "slow", 4), done)
            .unwrap();

        assert_eq!(record.status, ExecutionStatus::Failure);
        assert_eq!(record.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(record.error_message.as_deref(), Some("slow"));
    }

    #[test]
    fn should_refuse_second_finalization() {
        let mut record = pending();
        let at = record.started_at;
        record.cancel("shutdown", at).unwrap();
        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert_eq!(record.error_kind, Some(ErrorKind::Cancelled));
        assert_eq!(
            record.fail(ErrorKind::Permanent, "late", at),
            Err(ValidationError::AlreadyFinalized)
        );
        assert_eq!(record.status, ExecutionStatus::Cancelled);
    }

    #[test]
    fn should_clamp_completion_to_start() {
        let mut record = pending();
        let earlier = record.started_at - Duration::seconds(5);
        record.fail(ErrorKind::Permanent, "boom", earlier).unwrap();
        assert_eq!(record.completed_at, Some(record.started_at));
        assert_eq!(record.duration_ms, Some(0));
    }

    #[test]
    fn should_retry_only_transient_and_timeout() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Permanent.is_retryable());
        assert!(!ErrorKind::InvalidConfig.is_retryable());
        assert!(!ErrorKind::Panicked.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn should_parse_status_and_error_kind_names() {
        assert_eq!("cancelled".parse(), Ok(ExecutionStatus::Cancelled));
        assert_eq!("invalid_config".parse(), Ok(ErrorKind::InvalidConfig));
        assert!("exploded".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn should_derive_aggregate_delta_only_from_finalized_record() {
        let mut record = pending();
        assert!(AggregateDelta::from_record(&record).is_none());
        let at = record.started_at + Duration::seconds(3);
        record.fail(ErrorKind::Transient, "flaky", at).unwrap();
        let delta = AggregateDelta::from_record(&record).unwrap();
        assert_eq!(delta.outcome, ExecutionStatus::Failure);
        assert_eq!(delta.ran_at, record.started_at);
    }

    #[test]
    fn should_attach_metadata() {
        let record = pending().with_metadata("source", "schedule");
        assert_eq!(record.metadata["source"], "schedule");
    }
}
