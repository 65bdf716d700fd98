//! `SQLite` implementation of [`AutomationRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use taskflow_app::ports::AutomationRepository;
use taskflow_domain::automation::{
    Action, Automation, AutomationStatus, Category, Trigger, TriggerKind,
};
use taskflow_domain::error::TaskflowError;
use taskflow_domain::execution::{AggregateDelta, ExecutionStatus};
use taskflow_domain::id::{AutomationId, OwnerId};
use taskflow_domain::time::Timestamp;

use crate::codec::{count, decode_error, parse_optional_timestamp, parse_timestamp, timestamp};
use crate::error::StorageError;

struct Wrapper(Automation);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Automation> {
        value.map(|w| w.0)
    }

    fn unwrap_all(rows: Vec<Self>) -> Vec<Automation> {
        rows.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let owner_id: uuid::Uuid = row.try_get("owner_id")?;
        let category: String = row.try_get("category")?;
        let trigger_json: String = row.try_get("trigger_data")?;
        let action_json: String = row.try_get("action_data")?;
        let status: String = row.try_get("status")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let trigger: Trigger = serde_json::from_str(&trigger_json).map_err(decode_error)?;
        let action: Action = serde_json::from_str(&action_json).map_err(decode_error)?;

        Ok(Self(Automation {
            id: AutomationId::from_uuid(id),
            owner_id: OwnerId::from_uuid(owner_id),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: Category::from_str(&category).map_err(decode_error)?,
            trigger,
            action,
            status: AutomationStatus::from_str(&status).map_err(decode_error)?,
            is_active: row.try_get("is_active")?,
            status_reason: row.try_get("status_reason")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            last_run: parse_optional_timestamp(row.try_get("last_run")?)?,
            next_run: parse_optional_timestamp(row.try_get("next_run")?)?,
            execution_count: count(row.try_get("execution_count")?)?,
            success_count: count(row.try_get("success_count")?)?,
            failure_count: count(row.try_get("failure_count")?)?,
            cancelled_count: count(row.try_get("cancelled_count")?)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO automations (
        id, owner_id, name, description, category, trigger_kind, trigger_data,
        action_data, status, is_active, status_reason, created_at, updated_at,
        last_run, next_run, execution_count, success_count, failure_count,
        cancelled_count
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM automations WHERE id = ?";
const SELECT_BY_OWNER: &str = "SELECT * FROM automations WHERE owner_id = ? ORDER BY name, id";
const SELECT_ACTIVE: &str = r"
    SELECT * FROM automations
    WHERE is_active = 1 AND status = 'active' AND (?1 IS NULL OR owner_id = ?1)
    ORDER BY created_at, id
";
const SELECT_DUE: &str = r"
    SELECT * FROM automations
    WHERE is_active = 1 AND status = 'active' AND trigger_kind = ?
      AND next_run IS NOT NULL AND next_run <= ?
    ORDER BY next_run, id
";

// Single statement so concurrent finalizations never lose an increment.
const UPDATE_AGGREGATES: &str = r"
    UPDATE automations SET
        execution_count = execution_count + 1,
        success_count = success_count + ?1,
        failure_count = failure_count + ?2,
        cancelled_count = cancelled_count + ?3,
        last_run = CASE WHEN last_run IS NULL OR last_run < ?4 THEN ?4 ELSE last_run END,
        updated_at = MAX(updated_at, ?4)
    WHERE id = ?5
";

const SWAP_NEXT_RUN: &str = "UPDATE automations SET next_run = ? WHERE id = ? AND next_run IS ?";

const MARK_INVALID: &str = r"
    UPDATE automations
    SET status = 'invalid', is_active = 0, next_run = NULL, status_reason = ?, updated_at = ?
    WHERE id = ?
";

/// `SQLite`-backed automation registry.
pub struct SqliteAutomationRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn signed(value: u64, column: &'static str) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::Overflow(column))
}

impl AutomationRepository for SqliteAutomationRepository {
    async fn create(&self, automation: Automation) -> Result<Automation, TaskflowError> {
        automation.validate()?;
        let trigger_json =
            serde_json::to_string(&automation.trigger).map_err(StorageError::from)?;
        let action_json = serde_json::to_string(&automation.action).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(automation.id.as_uuid())
            .bind(automation.owner_id.as_uuid())
            .bind(&automation.name)
            .bind(&automation.description)
            .bind(automation.category.as_str())
            .bind(automation.trigger.kind().as_str())
            .bind(&trigger_json)
            .bind(&action_json)
            .bind(automation.status.as_str())
            .bind(automation.is_active)
            .bind(&automation.status_reason)
            .bind(timestamp(automation.created_at))
            .bind(timestamp(automation.updated_at))
            .bind(automation.last_run.map(timestamp))
            .bind(automation.next_run.map(timestamp))
            .bind(signed(automation.execution_count, "execution_count")?)
            .bind(signed(automation.success_count, "success_count")?)
            .bind(signed(automation.failure_count, "failure_count")?)
            .bind(signed(automation.cancelled_count, "cancelled_count")?)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(automation)
    }

    async fn get_by_id(&self, id: AutomationId) -> Result<Option<Automation>, TaskflowError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Automation>, TaskflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_OWNER)
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn list_active(
        &self,
        owner_id: Option<OwnerId>,
    ) -> Result<Vec<Automation>, TaskflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE)
            .bind(owner_id.map(OwnerId::as_uuid))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn list_due_for_schedule(&self, now: Timestamp) -> Result<Vec<Automation>, TaskflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_DUE)
            .bind(TriggerKind::CustomSchedule.as_str())
            .bind(timestamp(now))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::unwrap_all(rows))
    }

    async fn update_aggregates(
        &self,
        id: AutomationId,
        delta: AggregateDelta,
    ) -> Result<(), TaskflowError> {
        let (success, failure, cancelled) = match delta.outcome {
            ExecutionStatus::Pending => return Ok(()),
            ExecutionStatus::Success => (1, 0, 0),
            ExecutionStatus::Failure => (0, 1, 0),
            ExecutionStatus::Cancelled => (0, 0, 1),
        };
        sqlx::query(UPDATE_AGGREGATES)
            .bind(success)
            .bind(failure)
            .bind(cancelled)
            .bind(timestamp(delta.ran_at))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn compare_and_swap_next_run(
        &self,
        id: AutomationId,
        expected: Option<Timestamp>,
        next: Option<Timestamp>,
    ) -> Result<bool, TaskflowError> {
        let result = sqlx::query(SWAP_NEXT_RUN)
            .bind(next.map(timestamp))
            .bind(id.as_uuid())
            .bind(expected.map(timestamp))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_invalid(
        &self,
        id: AutomationId,
        reason: String,
        now: Timestamp,
    ) -> Result<(), TaskflowError> {
        sqlx::query(MARK_INVALID)
            .bind(&reason)
            .bind(timestamp(now))
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::{Duration, TimeZone, Utc};
    use taskflow_domain::automation::TaskPriority;

    async fn setup() -> SqliteAutomationRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteAutomationRepository::new(db.pool().clone())
    }

    fn at(h: u32, mi: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, h, mi, 0).unwrap()
    }

    fn lead_automation(owner: OwnerId) -> Automation {
        Automation::builder()
            .name("Lead follow-up")
            .owner_id(owner)
            .category(Category::Sales)
            .trigger(Trigger::NewLead {
                sources: vec!["website".to_string()],
                min_value: Some(100.0),
            })
            .action(Action::CreateTask {
                title: "Call the lead".to_string(),
                description: Some("Within the hour".to_string()),
                assignee_id: None,
                priority: TaskPriority::High,
                due_date: None,
            })
            .created_at(at(0, 0))
            .active()
            .build()
            .unwrap()
    }

    fn scheduled(owner: OwnerId, next_run: Timestamp) -> Automation {
        Automation::builder()
            .name("Daily report")
            .owner_id(owner)
            .trigger(Trigger::CustomSchedule {
                cron_expression: "*/5 * * * *".to_string(),
                timezone: None,
            })
            .action(Action::GenerateReport {
                report_type: "daily".to_string(),
                parameters: serde_json::Map::new(),
                recipients: vec!["ops@example.com".to_string()],
            })
            .created_at(at(0, 0))
            .active()
            .next_run(next_run)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_preserve_automation_through_roundtrip() {
        let repo = setup().await;
        let automation = lead_automation(OwnerId::new());

        repo.create(automation.clone()).await.unwrap();
        let fetched = repo.get_by_id(automation.id).await.unwrap().unwrap();

        assert_eq!(fetched, automation);
    }

    #[tokio::test]
    async fn should_return_none_when_automation_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(AutomationId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_reject_invalid_automation_on_create() {
        let repo = setup().await;
        let mut automation = lead_automation(OwnerId::new());
        automation.name = "   ".to_string();

        let result = repo.create(automation).await;

        assert!(matches!(result, Err(TaskflowError::Validation(_))));
    }

    #[tokio::test]
    async fn should_list_by_owner_and_active_scope() {
        let repo = setup().await;
        let alice = OwnerId::new();
        let bob = OwnerId::new();
        let active = lead_automation(alice);
        let mut paused = lead_automation(alice);
        paused.deactivate(at(0, 1)).unwrap();
        let bobs = lead_automation(bob);
        for automation in [active.clone(), paused.clone(), bobs.clone()] {
            repo.create(automation).await.unwrap();
        }

        assert_eq!(repo.list_by_owner(alice).await.unwrap().len(), 2);

        let alice_active = repo.list_active(Some(alice)).await.unwrap();
        assert_eq!(alice_active.len(), 1);
        assert_eq!(alice_active[0].id, active.id);

        assert_eq!(repo.list_active(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_list_only_due_schedules() {
        let repo = setup().await;
        let owner = OwnerId::new();
        let due = scheduled(owner, at(0, 0));
        let later = scheduled(owner, at(0, 10));
        for automation in [due.clone(), later, lead_automation(owner)] {
            repo.create(automation).await.unwrap();
        }

        let listed = repo.list_due_for_schedule(at(0, 5)).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);
    }

    #[tokio::test]
    async fn should_swap_next_run_only_from_expected_value() {
        let repo = setup().await;
        let automation = scheduled(OwnerId::new(), at(0, 0));
        repo.create(automation.clone()).await.unwrap();

        let first = repo
            .compare_and_swap_next_run(automation.id, Some(at(0, 0)), Some(at(0, 5)))
            .await
            .unwrap();
        let second = repo
            .compare_and_swap_next_run(automation.id, Some(at(0, 0)), Some(at(0, 5)))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let stored = repo.get_by_id(automation.id).await.unwrap().unwrap();
        assert_eq!(stored.next_run, Some(at(0, 5)));
    }

    #[tokio::test]
    async fn should_swap_from_unset_next_run() {
        let repo = setup().await;
        let mut automation = scheduled(OwnerId::new(), at(0, 0));
        automation.next_run = None;
        repo.create(automation.clone()).await.unwrap();

        let swapped = repo
            .compare_and_swap_next_run(automation.id, None, Some(at(0, 5)))
            .await
            .unwrap();

        assert!(swapped);
    }

    #[tokio::test]
    async fn should_fold_aggregates_and_keep_latest_last_run() {
        let repo = setup().await;
        let automation = lead_automation(OwnerId::new());
        repo.create(automation.clone()).await.unwrap();

        let deltas = [
            (ExecutionStatus::Success, at(1, 0)),
            (ExecutionStatus::Failure, at(3, 0)),
            (ExecutionStatus::Cancelled, at(2, 0)),
            (ExecutionStatus::Pending, at(4, 0)),
        ];
        for (outcome, ran_at) in deltas {
            repo.update_aggregates(automation.id, AggregateDelta { outcome, ran_at })
                .await
                .unwrap();
        }

        let stored = repo.get_by_id(automation.id).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 3);
        assert_eq!(stored.success_count, 1);
        assert_eq!(stored.failure_count, 1);
        assert_eq!(stored.cancelled_count, 1);
        assert_eq!(stored.last_run, Some(at(3, 0)));
        assert_eq!(stored.updated_at, at(3, 0));
        assert!(stored.counters_consistent());
    }

    #[tokio::test]
    async fn should_mark_automation_invalid() {
        let repo = setup().await;
        let automation = scheduled(OwnerId::new(), at(0, 0));
        repo.create(automation.clone()).await.unwrap();

        repo.mark_invalid(automation.id, "bad cron".to_string(), at(0, 1) + Duration::seconds(5))
            .await
            .unwrap();

        let stored = repo.get_by_id(automation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AutomationStatus::Invalid);
        assert!(!stored.is_active);
        assert!(stored.next_run.is_none());
        assert_eq!(stored.status_reason.as_deref(), Some("bad cron"));
        assert!(repo.list_active(None).await.unwrap().is_empty());
    }
}
