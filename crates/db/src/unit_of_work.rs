//! Postgres unit of work.
//!
//! Aggregates are staged in memory; `commit` opens a single transaction
//! that writes every staged row, drains each aggregate's pending-event
//! buffer into `outbox_events`, and commits. Either everything lands or
//! nothing does. Dropping an uncommitted unit of work rolls back by
//! dropping the (never-opened) transaction — cancellation before commit
//! is therefore cooperative and side-effect free.

use async_trait::async_trait;
use sqlx::PgConnection;

use cropwatch_core::alert::Alert;
use cropwatch_core::ports::{StorageError, UnitOfWork, UnitOfWorkFactory};
use cropwatch_core::reading::SensorReading;

use crate::repositories::{classify, OutboxRepo};
use crate::DbPool;

const AGGREGATE_READING: &str = "sensor_reading";
const AGGREGATE_ALERT: &str = "alert";

pub struct PgUnitOfWorkFactory {
    pool: DbPool,
}

impl PgUnitOfWorkFactory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgUnitOfWorkFactory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        Ok(Box::new(PgUnitOfWork {
            pool: self.pool.clone(),
            readings: Vec::new(),
            new_alerts: Vec::new(),
            dirty_alerts: Vec::new(),
        }))
    }
}

struct PgUnitOfWork {
    pool: DbPool,
    readings: Vec<SensorReading>,
    new_alerts: Vec<Alert>,
    dirty_alerts: Vec<Alert>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn add_reading(&mut self, reading: SensorReading) {
        self.readings.push(reading);
    }

    fn add_alert(&mut self, alert: Alert) {
        self.new_alerts.push(alert);
    }

    fn update_alert(&mut self, alert: Alert) {
        self.dirty_alerts.push(alert);
    }

    async fn commit(mut self: Box<Self>) -> Result<u64, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Unavailable(Box::new(e)))?;
        let mut affected = 0u64;

        for reading in &mut self.readings {
            insert_reading(&mut tx, reading).await?;
            capture_events(
                &mut tx,
                AGGREGATE_READING,
                reading.take_events().iter().map(|e| {
                    (e.aggregate_id(), e.event_type(), e.occurred_at(), serde_json::to_value(e))
                }),
            )
            .await?;
            affected += 1;
        }

        for alert in &mut self.new_alerts {
            insert_alert(&mut tx, alert).await?;
            capture_events(
                &mut tx,
                AGGREGATE_ALERT,
                alert.take_events().iter().map(|e| {
                    (e.aggregate_id(), e.event_type(), e.occurred_at(), serde_json::to_value(e))
                }),
            )
            .await?;
            affected += 1;
        }

        for alert in &mut self.dirty_alerts {
            update_alert(&mut tx, alert).await?;
            capture_events(
                &mut tx,
                AGGREGATE_ALERT,
                alert.take_events().iter().map(|e| {
                    (e.aggregate_id(), e.event_type(), e.occurred_at(), serde_json::to_value(e))
                }),
            )
            .await?;
            affected += 1;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Unavailable(Box::new(e)))?;
        Ok(affected)
    }
}

async fn insert_reading(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    reading: &SensorReading,
) -> Result<(), StorageError> {
    let state = reading.snapshot();
    sqlx::query(
        "INSERT INTO sensor_readings \
            (id, sensor_id, plot_id, recorded_at, temperature, humidity, soil_moisture, \
             rainfall, battery_level) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(state.id)
    .bind(&state.sensor_id)
    .bind(state.plot_id)
    .bind(state.recorded_at)
    .bind(state.temperature)
    .bind(state.humidity)
    .bind(state.soil_moisture)
    .bind(state.rainfall)
    .bind(state.battery_level)
    .execute(&mut **tx)
    .await
    .map_err(|e| classify(e, "sensor_reading"))?;
    Ok(())
}

async fn insert_alert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    alert: &Alert,
) -> Result<(), StorageError> {
    let state = alert.snapshot();
    sqlx::query(
        "INSERT INTO alert_aggregates \
            (id, sensor_id, plot_id, reading_id, alert_type, severity, status, message, \
             measured_value, threshold_value, metadata, detected_at, version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(state.id)
    .bind(&state.sensor_id)
    .bind(state.plot_id)
    .bind(state.reading_id)
    .bind(state.alert_type.as_str())
    .bind(state.severity.as_str())
    .bind(state.status.as_str())
    .bind(&state.message)
    .bind(state.measured)
    .bind(state.threshold)
    .bind(&state.metadata)
    .bind(state.detected_at)
    .bind(state.version)
    .execute(&mut **tx)
    .await
    .map_err(|e| classify(e, "alert"))?;
    Ok(())
}

/// Version-guarded update. Zero rows affected means another writer won the
/// race since this aggregate was loaded.
async fn update_alert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    alert: &Alert,
) -> Result<(), StorageError> {
    let state = alert.snapshot();
    let result = sqlx::query(
        "UPDATE alert_aggregates \
         SET status = $2, acknowledged_at = $3, acknowledged_by = $4, resolved_at = $5, \
             resolved_by = $6, resolution_notes = $7, version = version + 1 \
         WHERE id = $1 AND version = $8",
    )
    .bind(state.id)
    .bind(state.status.as_str())
    .bind(state.acknowledged_at)
    .bind(&state.acknowledged_by)
    .bind(state.resolved_at)
    .bind(&state.resolved_by)
    .bind(&state.resolution_notes)
    .bind(state.version)
    .execute(&mut **tx)
    .await
    .map_err(|e| classify(e, "alert"))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::Conflict { entity: "alert" });
    }
    Ok(())
}

async fn capture_events(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    aggregate_type: &str,
    events: impl Iterator<
        Item = (
            uuid::Uuid,
            &'static str,
            cropwatch_core::types::Timestamp,
            serde_json::Result<serde_json::Value>,
        ),
    >,
) -> Result<(), StorageError> {
    for (aggregate_id, event_type, occurred_at, payload) in events {
        let payload = payload.map_err(|e| StorageError::Unavailable(Box::new(e)))?;
        let conn: &mut PgConnection = &mut **tx;
        OutboxRepo::insert_tx(conn, aggregate_type, aggregate_id, event_type, &payload, occurred_at)
            .await
            .map_err(|e| classify(e, "outbox_event"))?;
    }
    Ok(())
}
