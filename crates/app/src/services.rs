//! Application services — engine use-cases.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod action_executor;
pub mod execution_coordinator;
pub mod metrics_aggregator;
pub mod schedule_planner;
pub mod trigger_dispatcher;
