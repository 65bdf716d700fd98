//! # taskflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `AutomationRepository`, `ExecutionLedger` and `LeaseStore`
//!   port traits defined in `taskflow-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `taskflow-app` (for port traits) and `taskflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;

pub mod automation_repo;
pub mod error;
pub mod execution_ledger;
pub mod lease_store;
pub mod pool;

pub use automation_repo::SqliteAutomationRepository;
pub use error::StorageError;
pub use execution_ledger::SqliteExecutionLedger;
pub use lease_store::SqliteLeaseStore;
pub use pool::{Config, Database};
