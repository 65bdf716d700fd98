//! # taskflow-domain
//!
//! Pure domain model for the taskflow automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Automations** (trigger → action rules owned by an owner)
//! - Define **Triggers** (event predicates and cron schedules) and the typed
//!   **payloads** they are evaluated against
//! - Define **Actions** (send email, create task, update CRM, generate report)
//! - Define **Execution records** (the immutable ledger entries) and their
//!   state machine
//! - Define **Leases** (per-automation mutual exclusion tokens)
//! - Compute cron next-fire times and metric rollups
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod event;
pub mod execution;
pub mod lease;
pub mod metrics;
pub mod schedule;
