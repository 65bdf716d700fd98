//! Execution ledger port — append-only store of execution records.

use std::future::Future;
use std::sync::Arc;

use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::{ExecutionRecord, ExecutionStatus};
use taskflow_domain::id::{AutomationId, OwnerId};
use taskflow_domain::metrics::ExecutionSummary;
use taskflow_domain::time::Timestamp;

/// Optional restrictions applied by [`ExecutionLedger::query`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionFilter {
    pub automation_id: Option<AutomationId>,
    pub status: Option<ExecutionStatus>,
    /// Inclusive lower bound on `started_at`.
    pub started_after: Option<Timestamp>,
    /// Exclusive upper bound on `started_at`.
    pub started_before: Option<Timestamp>,
}

impl ExecutionFilter {
    /// Check whether a record passes every set restriction.
    #[must_use]
    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        self.automation_id.is_none_or(|id| record.automation_id == id)
            && self.status.is_none_or(|status| record.status == status)
            && self.started_after.is_none_or(|after| record.started_at >= after)
            && self
                .started_before
                .is_none_or(|before| record.started_at < before)
    }
}

/// Window over a newest-first result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Maximum number of records; `None` returns everything after `offset`.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;

    #[must_use]
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::first(Self::DEFAULT_LIMIT)
    }
}

/// Append-only store of finalized [`ExecutionRecord`]s.
pub trait ExecutionLedger {
    /// Persist a record. Appending the same id twice is an error.
    fn append(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send;

    /// Records of one owner matching `filter`, newest `started_at` first.
    fn query(
        &self,
        owner_id: OwnerId,
        filter: ExecutionFilter,
        pagination: Pagination,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, TaskflowError>> + Send;

    /// Outcome counters over every record of one owner, with "today" being
    /// the UTC day of `as_of`.
    fn summarize(
        &self,
        owner_id: OwnerId,
        as_of: Timestamp,
    ) -> impl Future<Output = Result<ExecutionSummary, TaskflowError>> + Send;
}

impl<T: ExecutionLedger + Send + Sync> ExecutionLedger for Arc<T> {
    fn append(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<(), TaskflowError>> + Send {
        (**self).append(record)
    }

    fn query(
        &self,
        owner_id: OwnerId,
        filter: ExecutionFilter,
        pagination: Pagination,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, TaskflowError>> + Send {
        (**self).query(owner_id, filter, pagination)
    }

    fn summarize(
        &self,
        owner_id: OwnerId,
        as_of: Timestamp,
    ) -> impl Future<Output = Result<ExecutionSummary, TaskflowError>> + Send {
        (**self).summarize(owner_id, as_of)
    }
}
