//! # taskflow-app
//!
//! Application layer — engine services and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationRepository` — automation registry, aggregates and `next_run`
//!   - `ExecutionLedger` — append & query execution records
//!   - `LeaseStore` — per-automation execution leases
//!   - `ActionCapability` — one external integration (email, tasks, CRM, reports)
//!   - `EventVerifier` — provenance checks on inbound events
//! - Provide the **engine services**:
//!   - `TriggerDispatcher` — inbound event → matching automations
//!   - `SchedulePlanner` — cron automations whose `next_run` is due
//!   - `ExecutionCoordinator` — leases, retries, cancellation, finalization
//!   - `ActionExecutor` — action → capability, with timeouts and error mapping
//!   - `MetricsAggregator` — dashboard metrics and execution history
//! - Provide **in-process infrastructure** that doesn't need IO (dedupe
//!   cache, in-memory lease store)
//!
//! ## Dependency rule
//! Depends on `taskflow-domain` only (plus `tokio` for tasks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod dedupe;
pub mod lease;
pub mod ports;
pub mod services;

#[cfg(test)]
mod fakes;
