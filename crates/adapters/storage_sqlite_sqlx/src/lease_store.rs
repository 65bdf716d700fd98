//! `SQLite` implementation of [`LeaseStore`].
//!
//! Acquisition is a single upsert that only overwrites an expired row, so
//! several processes sharing the database file still get one winner.

use chrono::Duration;
use sqlx::SqlitePool;

use taskflow_app::ports::LeaseStore;
use taskflow_domain::error::TaskflowError;
use taskflow_domain::id::AutomationId;
use taskflow_domain::lease::Lease;
use taskflow_domain::time::Timestamp;

use crate::codec::timestamp;
use crate::error::StorageError;

const ACQUIRE: &str = r"
    INSERT INTO leases (automation_id, holder, acquired_at, expires_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (automation_id) DO UPDATE SET
        holder = excluded.holder,
        acquired_at = excluded.acquired_at,
        expires_at = excluded.expires_at
    WHERE leases.expires_at <= excluded.acquired_at
";

const RELEASE: &str = "DELETE FROM leases WHERE automation_id = ? AND holder = ?";

/// `SQLite`-backed lease store.
pub struct SqliteLeaseStore {
    pool: SqlitePool,
}

impl SqliteLeaseStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LeaseStore for SqliteLeaseStore {
    async fn try_acquire(
        &self,
        automation_id: AutomationId,
        ttl: Duration,
        now: Timestamp,
    ) -> Result<Option<Lease>, TaskflowError> {
        let lease = Lease::grant(automation_id, now, ttl);
        let result = sqlx::query(ACQUIRE)
            .bind(automation_id.as_uuid())
            .bind(lease.holder.as_uuid())
            .bind(timestamp(lease.acquired_at))
            .bind(timestamp(lease.expires_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok((result.rows_affected() == 1).then_some(lease))
    }

    async fn release(&self, lease: &Lease) -> Result<bool, TaskflowError> {
        let result = sqlx::query(RELEASE)
            .bind(lease.automation_id.as_uuid())
            .bind(lease.holder.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
