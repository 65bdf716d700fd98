//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the engine and the outside world.
//! They are defined here (in `app`) so that both the service layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod automation_repo;
pub mod event_verifier;
pub mod execution_ledger;
pub mod integration;
pub mod lease_store;
pub mod submitter;

pub use automation_repo::AutomationRepository;
pub use event_verifier::EventVerifier;
pub use execution_ledger::{ExecutionFilter, ExecutionLedger, Pagination};
pub use integration::{ActionCapability, CapabilityReceipt, IntegrationError, OwnerContext};
pub use lease_store::LeaseStore;
pub use submitter::{ExecutionHandle, ExecutionSubmitter, SubmitOutcome};
