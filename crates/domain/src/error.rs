//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`TaskflowError`]
//! via `#[from]`. Integration failures are *not* errors at this level: the
//! execution coordinator absorbs them into execution record outcomes.

use crate::automation::{ActionKind, TriggerKind};

/// Top-level error returned by application services and ports.
#[derive(Debug, thiserror::Error)]
pub enum TaskflowError {
    /// Malformed input. Never retried.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An inbound event failed provenance verification.
    #[error("authentication error")]
    Auth(#[from] AuthError),

    /// A cron expression or timezone could not be parsed.
    #[error("invalid schedule")]
    InvalidSchedule(#[from] InvalidScheduleError),

    /// The backing store failed.
    #[error("storage error")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations and malformed inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("a trigger is required")]
    MissingTrigger,

    #[error("an action is required")]
    MissingAction,

    #[error("an active automation must have status `active`")]
    ActiveWithoutActiveStatus,

    #[error("next_run is only meaningful for active schedule automations")]
    UnexpectedNextRun,

    #[error("payload does not match the `{trigger}` shape: {reason}")]
    MalformedPayload {
        trigger: TriggerKind,
        reason: String,
    },

    #[error("`{trigger}` triggers cannot be delivered as external events")]
    NotAnEventTrigger { trigger: TriggerKind },

    #[error("invalid `{action}` configuration: {reason}")]
    InvalidActionConfig { action: ActionKind, reason: String },

    #[error("invalid identifier `{0}`")]
    InvalidId(String),

    #[error("cannot move automation from `{from}` to `{to}`")]
    InvalidTransition { from: String, to: String },

    #[error("execution record is already finalized")]
    AlreadyFinalized,
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An inbound event was rejected by the provenance verifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing signature")]
    MissingSignature,

    #[error("signature mismatch")]
    SignatureMismatch,
}

/// A cron expression or timezone is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidScheduleError {
    #[error("invalid cron expression `{expression}`: {reason}")]
    Expression { expression: String, reason: String },

    #[error("unknown timezone `{0}`")]
    Timezone(String),

    #[error("cron expression `{0}` has no future occurrence")]
    Exhausted(String),

    #[error("automation does not have a schedule trigger")]
    NotScheduled,
}
