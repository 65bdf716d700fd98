//! # taskflow-adapter-simulated
//!
//! Simulated integrations for the four action kinds, used for local runs
//! and tests.
//!
//! ## Provided capabilities
//!
//! | Capability | Action | Provider reference | Output |
//! |------------|--------|--------------------|--------|
//! | [`SimulatedEmail`] | `send_email` | `msg_<uuid>` | rendered subject, recipients |
//! | [`SimulatedTasks`] | `create_task` | `task_<uuid>` | title, priority, due date |
//! | [`SimulatedCrm`] | `update_crm` | `<record_type>:<record_id>` | updated fields |
//! | [`SimulatedReports`] | `generate_report` | `report_<uuid>` | report URL |
//!
//! Every call sleeps for the configured latency, then either consumes a
//! scripted failure or succeeds and appends its output to a bounded journal.
//!
//! ## Dependency rule
//!
//! Depends on `taskflow-app` (port traits) and `taskflow-domain` only.

mod capabilities;

use std::time::Duration;

use taskflow_app::services::action_executor::{ActionExecutor, ExecutorConfig};

pub use capabilities::{SimulatedCrm, SimulatedEmail, SimulatedReports, SimulatedTasks};

/// Executor wired to the four simulated capabilities.
pub type SimulatedExecutor =
    ActionExecutor<SimulatedEmail, SimulatedTasks, SimulatedCrm, SimulatedReports>;

/// Build an executor whose capabilities all answer after `latency`.
#[must_use]
pub fn executor(latency: Duration, config: ExecutorConfig) -> SimulatedExecutor {
    ActionExecutor::new(
        SimulatedEmail::new(latency),
        SimulatedTasks::new(latency),
        SimulatedCrm::new(latency),
        SimulatedReports::new(latency),
        config,
    )
}
