//! Relay and projector tests against a real Postgres database.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use cropwatch_core::ingest::{InboundTelemetry, IngestionHandler};
use cropwatch_core::lifecycle::AlertLifecycle;
use cropwatch_core::thresholds::Thresholds;
use cropwatch_db::models::OutboxEventRow;
use cropwatch_db::{
    DbPool, OutboxRepo, PgAlertRepository, PgSensorReadingRepository, PgUnitOfWorkFactory,
};
use cropwatch_events::{AlertProjector, ConsumeError, OutboxRelay, RelayConsumer};

fn hot_telemetry() -> InboundTelemetry {
    InboundTelemetry {
        source_id: Uuid::new_v4(),
        sensor_id: "SENSOR-001".into(),
        plot_id: Uuid::new_v4(),
        recorded_at: Utc::now() - Duration::minutes(5),
        temperature: Some(41.5),
        humidity: Some(55.0),
        soil_moisture: Some(40.0),
        rainfall: Some(0.0),
        battery_level: Some(90.0),
    }
}

fn ingestion(pool: &DbPool) -> IngestionHandler {
    IngestionHandler::new(
        Arc::new(PgSensorReadingRepository::new(pool.clone())),
        Arc::new(PgUnitOfWorkFactory::new(pool.clone())),
        Thresholds::default(),
    )
}

fn lifecycle(pool: &DbPool) -> AlertLifecycle {
    AlertLifecycle::new(
        Arc::new(PgAlertRepository::new(pool.clone())),
        Arc::new(PgUnitOfWorkFactory::new(pool.clone())),
    )
}

fn projecting_relay(pool: &DbPool) -> OutboxRelay {
    OutboxRelay::new(
        pool.clone(),
        vec![Box::new(AlertProjector::new(pool.clone()))],
    )
}

struct FailingConsumer;

/// Projector wrapper that fails the first `alert.created` delivery and
/// behaves normally afterwards.
struct FlakyProjector {
    inner: AlertProjector,
    failed_once: AtomicBool,
}

#[async_trait::async_trait]
impl RelayConsumer for FlakyProjector {
    fn name(&self) -> &'static str {
        "flaky_projector"
    }

    async fn consume(&self, event: &OutboxEventRow) -> Result<(), ConsumeError> {
        if event.event_type == "alert.created" && !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(ConsumeError("transient database error".into()));
        }
        self.inner.consume(event).await
    }
}

#[async_trait::async_trait]
impl RelayConsumer for FailingConsumer {
    fn name(&self) -> &'static str {
        "failing_consumer"
    }

    async fn consume(&self, _event: &OutboxEventRow) -> Result<(), ConsumeError> {
        Err(ConsumeError("downstream unavailable".into()))
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn relay_projects_created_alert_into_read_model(pool: DbPool) {
    ingestion(&pool).handle(hot_telemetry()).await.unwrap();

    let dispatched = projecting_relay(&pool).drain_once().await.unwrap();
    assert_eq!(dispatched, 3);
    assert_eq!(OutboxRepo::undispatched_count(&pool).await.unwrap(), 0);

    let (status, severity): (String, String) =
        sqlx::query_as("SELECT status, severity FROM alerts")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "Pending");
    assert_eq!(severity, "Medium");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn redelivery_converges_on_the_same_read_model_row(pool: DbPool) {
    ingestion(&pool).handle(hot_telemetry()).await.unwrap();
    let relay = projecting_relay(&pool);
    relay.drain_once().await.unwrap();

    // Simulate a crash between consume and mark: re-deliver everything.
    sqlx::query("UPDATE outbox_events SET dispatched_at = NULL, next_attempt_at = now()")
        .execute(&pool)
        .await
        .unwrap();
    relay.drain_once().await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn consumer_failure_stops_the_batch_and_schedules_retry(pool: DbPool) {
    ingestion(&pool).handle(hot_telemetry()).await.unwrap();

    let relay = OutboxRelay::new(pool.clone(), vec![Box::new(FailingConsumer)]);
    let dispatched = relay.drain_once().await.unwrap();
    assert_eq!(dispatched, 0);
    assert_eq!(OutboxRepo::undispatched_count(&pool).await.unwrap(), 3);

    // Only the head of the batch accrues an attempt; later rows wait behind
    // it untouched.
    let attempts: Vec<i32> =
        sqlx::query_scalar("SELECT attempts FROM outbox_events ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(attempts, vec![1, 0, 0]);

    // The failed row is backed off and the next reading event waits behind
    // it, so an immediate drain dispatches nothing.
    let dispatched = relay.drain_once().await.unwrap();
    assert_eq!(dispatched, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn backed_off_event_holds_later_events_for_its_aggregate(pool: DbPool) {
    ingestion(&pool).handle(hot_telemetry()).await.unwrap();

    let relay = OutboxRelay::new(
        pool.clone(),
        vec![Box::new(FlakyProjector {
            inner: AlertProjector::new(pool.clone()),
            failed_once: AtomicBool::new(false),
        })],
    );

    // The reading events deliver; the alert creation fails once and is
    // backed off. Pin the backoff far out so the test is not racing the
    // one-second first retry.
    assert_eq!(relay.drain_once().await.unwrap(), 2);
    sqlx::query(
        "UPDATE outbox_events SET next_attempt_at = now() + interval '1 hour' \
         WHERE dispatched_at IS NULL",
    )
    .execute(&pool)
    .await
    .unwrap();

    // The operator acknowledges while the creation is still backed off.
    let alert_id: Uuid = sqlx::query_scalar("SELECT id FROM alert_aggregates")
        .fetch_one(&pool)
        .await
        .unwrap();
    lifecycle(&pool)
        .acknowledge(alert_id, "agronomist-1")
        .await
        .unwrap();

    // The acknowledgement is due immediately, but it must wait behind the
    // backed-off creation rather than update a row that does not exist yet.
    assert_eq!(relay.drain_once().await.unwrap(), 0);
    assert_eq!(OutboxRepo::undispatched_count(&pool).await.unwrap(), 2);

    // Once the backoff elapses, both rows deliver in emission order.
    sqlx::query("UPDATE outbox_events SET next_attempt_at = now() WHERE dispatched_at IS NULL")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(relay.drain_once().await.unwrap(), 2);

    let status: String = sqlx::query_scalar("SELECT status FROM alerts WHERE id = $1")
        .bind(alert_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "Acknowledged");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn lifecycle_events_project_in_commit_order(pool: DbPool) {
    ingestion(&pool).handle(hot_telemetry()).await.unwrap();
    let alert_id: Uuid = sqlx::query_scalar("SELECT id FROM alert_aggregates")
        .fetch_one(&pool)
        .await
        .unwrap();

    let service = lifecycle(&pool);
    service.acknowledge(alert_id, "agronomist-1").await.unwrap();
    service
        .resolve(alert_id, "agronomist-1", Some("irrigated".into()))
        .await
        .unwrap();

    projecting_relay(&pool).drain_once().await.unwrap();

    let (status, acknowledged_by, resolution_notes): (String, Option<String>, Option<String>) =
        sqlx::query_as("SELECT status, acknowledged_by, resolution_notes FROM alerts WHERE id = $1")
            .bind(alert_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "Resolved");
    assert_eq!(acknowledged_by.as_deref(), Some("agronomist-1"));
    assert_eq!(resolution_notes.as_deref(), Some("irrigated"));
}
