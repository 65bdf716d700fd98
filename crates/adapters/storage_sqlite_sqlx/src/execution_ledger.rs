//! `SQLite` implementation of [`ExecutionLedger`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use taskflow_app::ports::{ExecutionFilter, ExecutionLedger, Pagination};
use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::{ActionResult, ErrorKind, ExecutionRecord, ExecutionStatus};
use taskflow_domain::id::{AutomationId, ExecutionId, OwnerId};
use taskflow_domain::metrics::{ExecutionSummary, utc_day};
use taskflow_domain::time::Timestamp;

use crate::codec::{count, decode_error, parse_optional_timestamp, parse_timestamp, timestamp};
use crate::error::StorageError;

struct Wrapper(ExecutionRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let automation_id: uuid::Uuid = row.try_get("automation_id")?;
        let owner_id: uuid::Uuid = row.try_get("owner_id")?;
        let status: String = row.try_get("status")?;
        let started_at: String = row.try_get("started_at")?;
        let duration_ms: Option<i64> = row.try_get("duration_ms")?;
        let error_kind: Option<String> = row.try_get("error_kind")?;
        let payload_json: String = row.try_get("trigger_payload")?;
        let result_json: Option<String> = row.try_get("action_result")?;
        let metadata_json: String = row.try_get("metadata")?;

        let action_result: Option<ActionResult> = result_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(decode_error)?;

        Ok(Self(ExecutionRecord {
            id: ExecutionId::from_uuid(id),
            automation_id: AutomationId::from_uuid(automation_id),
            owner_id: OwnerId::from_uuid(owner_id),
            status: ExecutionStatus::from_str(&status).map_err(decode_error)?,
            started_at: parse_timestamp(&started_at)?,
            completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
            duration_ms: duration_ms.map(count).transpose()?,
            error_kind: error_kind
                .as_deref()
                .map(ErrorKind::from_str)
                .transpose()
                .map_err(decode_error)?,
            error_message: row.try_get("error_message")?,
            trigger_payload: serde_json::from_str(&payload_json).map_err(decode_error)?,
            action_result,
            metadata: serde_json::from_str(&metadata_json).map_err(decode_error)?,
        }))
    }
}

fn summary_from_row(row: &SqliteRow) -> Result<ExecutionSummary, sqlx::Error> {
    let column = |name: &str| -> Result<u64, sqlx::Error> { count(row.try_get(name)?) };
    Ok(ExecutionSummary {
        successes: column("successes")?,
        failures: column("failures")?,
        successes_today: column("successes_today")?,
        success_duration_ms: column("success_duration_ms")?,
        timed_successes: column("timed_successes")?,
    })
}

const INSERT: &str = r"
    INSERT INTO execution_records (
        id, automation_id, owner_id, status, started_at, completed_at, duration_ms,
        error_kind, error_message, trigger_payload, action_result, metadata
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

// `LIMIT -1` means no limit in SQLite.
const QUERY: &str = r"
    SELECT * FROM execution_records
    WHERE owner_id = ?1
      AND (?2 IS NULL OR automation_id = ?2)
      AND (?3 IS NULL OR status = ?3)
      AND (?4 IS NULL OR started_at >= ?4)
      AND (?5 IS NULL OR started_at < ?5)
    ORDER BY started_at DESC, id
    LIMIT ?6 OFFSET ?7
";

const SUMMARIZE: &str = r"
    SELECT
        COALESCE(SUM(status = 'success'), 0) AS successes,
        COALESCE(SUM(status = 'failure'), 0) AS failures,
        COALESCE(SUM(status = 'success' AND started_at >= ?2 AND started_at < ?3), 0)
            AS successes_today,
        COALESCE(SUM(CASE WHEN status = 'success' THEN duration_ms END), 0)
            AS success_duration_ms,
        COUNT(CASE WHEN status = 'success' THEN duration_ms END) AS timed_successes
    FROM execution_records
    WHERE owner_id = ?1
";

/// `SQLite`-backed execution ledger.
pub struct SqliteExecutionLedger {
    pool: SqlitePool,
}

impl SqliteExecutionLedger {
    /// Create a new ledger using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ExecutionLedger for SqliteExecutionLedger {
    async fn append(&self, record: ExecutionRecord) -> Result<(), TaskflowError> {
        let payload_json =
            serde_json::to_string(&record.trigger_payload).map_err(StorageError::from)?;
        let result_json = record
            .action_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StorageError::from)?;
        let metadata_json = serde_json::to_string(&record.metadata).map_err(StorageError::from)?;
        let duration_ms = record
            .duration_ms
            .map(|ms| i64::try_from(ms).map_err(|_| StorageError::Overflow("duration_ms")))
            .transpose()?;

        sqlx::query(INSERT)
            .bind(record.id.as_uuid())
            .bind(record.automation_id.as_uuid())
            .bind(record.owner_id.as_uuid())
            .bind(record.status.as_str())
            .bind(timestamp(record.started_at))
            .bind(record.completed_at.map(timestamp))
            .bind(duration_ms)
            .bind(record.error_kind.map(ErrorKind::as_str))
            .bind(&record.error_message)
            .bind(&payload_json)
            .bind(&result_json)
            .bind(&metadata_json)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn query(
        &self,
        owner_id: OwnerId,
        filter: ExecutionFilter,
        pagination: Pagination,
    ) -> Result<Vec<ExecutionRecord>, TaskflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(QUERY)
            .bind(owner_id.as_uuid())
            .bind(filter.automation_id.map(AutomationId::as_uuid))
            .bind(filter.status.map(ExecutionStatus::as_str))
            .bind(filter.started_after.map(timestamp))
            .bind(filter.started_before.map(timestamp))
            .bind(pagination.limit.map_or(-1, i64::from))
            .bind(i64::from(pagination.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn summarize(
        &self,
        owner_id: OwnerId,
        as_of: Timestamp,
    ) -> Result<ExecutionSummary, TaskflowError> {
        let (day_start, day_end) = utc_day(as_of);
        let row = sqlx::query(SUMMARIZE)
            .bind(owner_id.as_uuid())
            .bind(timestamp(day_start))
            .bind(timestamp(day_end))
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(summary_from_row(&row).map_err(StorageError::from)?)
    }
}
