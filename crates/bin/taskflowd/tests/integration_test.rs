//! End-to-end tests for the full taskflowd stack.
//!
//! Each test wires the complete engine (in-memory `SQLite`, real registry,
//! ledger and lease store, real coordinator over the simulated integrations,
//! real axum router) and exercises it via `tower::ServiceExt::oneshot`; no
//! TCP port is bound.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use taskflow_adapter_http_axum::{AppState, HmacSha256Verifier, SIGNATURE_HEADER, router};
use taskflow_adapter_simulated::SimulatedExecutor;
use taskflow_adapter_storage_sqlite_sqlx::{
    Config, SqliteAutomationRepository, SqliteExecutionLedger, SqliteLeaseStore,
};
use taskflow_app::ports::AutomationRepository;
use taskflow_app::services::action_executor::ExecutorConfig;
use taskflow_app::services::execution_coordinator::{
    CoordinatorConfig, ExecutionCoordinator, RetryPolicy,
};
use taskflow_app::services::metrics_aggregator::MetricsAggregator;
use taskflow_app::services::schedule_planner::SchedulePlanner;
use taskflow_app::services::trigger_dispatcher::{DEFAULT_DEDUPE_WINDOW, TriggerDispatcher};
use taskflow_domain::automation::{Action, Automation, TaskPriority, Trigger};
use taskflow_domain::id::OwnerId;
use taskflow_domain::metrics::MetricsOptions;

const SECRET: &str = "whsec_integration";

type Registry = Arc<SqliteAutomationRepository>;
type Coordinator = ExecutionCoordinator<
    Registry,
    Arc<SqliteExecutionLedger>,
    SqliteLeaseStore,
    SimulatedExecutor,
>;

struct Harness {
    app: axum::Router,
    registry: Registry,
    coordinator: Coordinator,
    planner: SchedulePlanner<Registry, Coordinator>,
}

/// Build a fully-wired engine backed by an in-memory `SQLite` database.
async fn harness() -> Harness {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise");
    let pool = db.pool().clone();

    let registry = Arc::new(SqliteAutomationRepository::new(pool.clone()));
    let ledger = Arc::new(SqliteExecutionLedger::new(pool.clone()));
    let coordinator = ExecutionCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        SqliteLeaseStore::new(pool),
        taskflow_adapter_simulated::executor(Duration::ZERO, ExecutorConfig::default()),
        CoordinatorConfig {
            retry: RetryPolicy::none(),
            ..CoordinatorConfig::default()
        },
    );
    let planner = SchedulePlanner::new(Arc::clone(&registry), coordinator.clone());
    let dispatcher = TriggerDispatcher::new(
        Arc::clone(&registry),
        Some(HmacSha256Verifier::new(SECRET)),
        coordinator.clone(),
        DEFAULT_DEDUPE_WINDOW,
    );
    let metrics = MetricsAggregator::new(
        Arc::clone(&registry),
        ledger,
        MetricsOptions::default(),
    );

    Harness {
        app: router::build(AppState::new(dispatcher, metrics)),
        registry,
        coordinator,
        planner,
    }
}

fn create_task() -> Action {
    Action::CreateTask {
        title: "Call the lead back".to_string(),
        description: None,
        assignee_id: None,
        priority: TaskPriority::High,
        due_date: None,
    }
}

fn webhook(body: &str, sign: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhooks")
        .header("content-type", "application/json");
    if sign {
        let signature = HmacSha256Verifier::new(SECRET)
            .sign(body.as_bytes())
            .unwrap();
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn settle(coordinator: &Coordinator) {
    for _ in 0..200 {
        if coordinator.in_flight() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("executions did not settle");
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let harness = harness().await;

    let response = harness.app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Webhook → execution → ledger → metrics
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn should_execute_matching_automation_from_signed_webhook() {
    let harness = harness().await;
    let owner = OwnerId::new();
    let automation = Automation::builder()
        .name("Follow up on big leads")
        .owner_id(owner)
        .trigger(Trigger::NewLead {
            sources: vec!["website".to_string()],
            min_value: Some(100.0),
        })
        .action(create_task())
        .active()
        .build()
        .unwrap();
    let automation = harness.registry.create(automation).await.unwrap();

    let body = r#"{"id":"evt_lead_1","type":"new_lead","data":{"lead_id":"l1","source":"Website","value":150}}"#;
    let response = harness
        .app
        .clone()
        .oneshot(webhook(body, true))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await["matched"], 1);
    settle(&harness.coordinator).await;

    let executions = harness
        .app
        .clone()
        .oneshot(get(&format!("/api/owners/{owner}/executions")))
        .await
        .unwrap();
    assert_eq!(executions.status(), StatusCode::OK);
    let executions = json_body(executions).await;
    let records = executions.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "success");
    assert_eq!(records[0]["automation_id"], automation.id.to_string());
    assert_eq!(records[0]["metadata"]["action"], "create_task");
    assert_eq!(records[0]["metadata"]["trigger_source"], "new_lead");
    assert!(
        records[0]["action_result"]["provider_ref"]
            .as_str()
            .unwrap()
            .starts_with("task_")
    );

    let stored = harness
        .registry
        .get_by_id(automation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.execution_count, 1);
    assert_eq!(stored.success_count, 1);
    assert!(stored.last_run.is_some());

    let metrics = harness
        .app
        .oneshot(get(&format!("/api/owners/{owner}/metrics")))
        .await
        .unwrap();
    let metrics = json_body(metrics).await;
    assert_eq!(metrics["total_automations"], 1);
    assert_eq!(metrics["active_automations"], 1);
    assert_eq!(metrics["success_rate"], 100.0);
    assert_eq!(metrics["recent_executions"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn should_ignore_redelivered_webhook() {
    let harness = harness().await;
    let automation = Automation::builder()
        .name("Thank payers")
        .trigger(Trigger::PaymentReceived {
            min_amount: None,
            currency: Some("USD".to_string()),
            product_ids: vec![],
        })
        .action(create_task())
        .active()
        .build()
        .unwrap();
    let owner = automation.owner_id;
    harness.registry.create(automation).await.unwrap();

    let body = r#"{"id":"evt_pay_1","type":"payment_received","data":{"amount":49.0,"currency":"usd"}}"#;
    let first = harness
        .app
        .clone()
        .oneshot(webhook(body, true))
        .await
        .unwrap();
    assert_eq!(json_body(first).await["matched"], 1);
    settle(&harness.coordinator).await;

    let second = harness
        .app
        .clone()
        .oneshot(webhook(body, true))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(second).await["matched"], 0);
    settle(&harness.coordinator).await;

    let executions = harness
        .app
        .oneshot(get(&format!("/api/owners/{owner}/executions")))
        .await
        .unwrap();
    assert_eq!(json_body(executions).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn should_reject_unsigned_webhook() {
    let harness = harness().await;
    let body = r#"{"id":"evt_1","type":"new_lead","data":{"value":150}}"#;

    let response = harness.app.oneshot(webhook(body, false)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Schedule → execution
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn should_fire_due_schedule_once() {
    let harness = harness().await;
    let automation = Automation::builder()
        .name("Weekly digest")
        .trigger(Trigger::CustomSchedule {
            cron_expression: "*/5 * * * *".to_string(),
            timezone: None,
        })
        .action(create_task())
        .active()
        .build()
        .unwrap();
    let owner = automation.owner_id;
    let automation = harness.registry.create(automation).await.unwrap();

    let now = taskflow_domain::time::now();
    harness.planner.arm(automation.id, now).await.unwrap();
    let later = now + chrono::Duration::minutes(6);
    let (first, second) = tokio::join!(harness.planner.tick(later), harness.planner.tick(later));
    assert_eq!(first.unwrap().fired + second.unwrap().fired, 1);
    settle(&harness.coordinator).await;

    let stored = harness
        .registry
        .get_by_id(automation.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.next_run.is_some_and(|next| next > later));

    let executions = harness
        .app
        .oneshot(get(&format!("/api/owners/{owner}/executions?status=success")))
        .await
        .unwrap();
    let executions = json_body(executions).await;
    let records = executions.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["metadata"]["trigger_source"], "custom_schedule");
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn should_refuse_submissions_after_shutdown() {
    let harness = harness().await;
    let automation = Automation::builder()
        .name("Follow up")
        .trigger(Trigger::NewLead {
            sources: vec![],
            min_value: None,
        })
        .action(create_task())
        .active()
        .build()
        .unwrap();
    let owner = automation.owner_id;
    harness.registry.create(automation).await.unwrap();

    harness.coordinator.shutdown().await;
    let body = r#"{"id":"evt_late","type":"new_lead","data":{"value":1}}"#;
    let response = harness
        .app
        .clone()
        .oneshot(webhook(body, true))
        .await
        .unwrap();

    assert_eq!(json_body(response).await["matched"], 1);
    let executions = harness
        .app
        .oneshot(get(&format!("/api/owners/{owner}/executions")))
        .await
        .unwrap();
    assert!(json_body(executions).await.as_array().unwrap().is_empty());
}
