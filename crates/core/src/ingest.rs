//! Idempotent telemetry ingestion.
//!
//! One inbound event becomes at most one sensor reading plus the alerts its
//! threshold violations warrant, persisted as a single unit of work. The
//! handler is safe under at-least-once delivery: re-delivered events are
//! recognized by identity and become successful no-ops.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::alert::Alert;
use crate::error::DomainError;
use crate::ports::{SensorReadingRepository, StorageError, UnitOfWorkFactory};
use crate::reading::SensorReading;
use crate::thresholds::Thresholds;
use crate::types::Timestamp;

/// The inbound telemetry event, as consumed from the transport. `source_id`
/// is the event's own stable identifier and becomes the reading's identity.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundTelemetry {
    pub source_id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub recorded_at: Timestamp,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub rainfall: Option<f64>,
    pub battery_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The reading was persisted, along with `alerts_created` new alerts.
    Processed { alerts_created: usize },
    /// The event was already processed; nothing was written.
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The event can never be processed successfully — route it to
    /// dead-letter storage instead of retrying.
    #[error("poison telemetry event: {0}")]
    Poison(#[source] DomainError),

    /// Transient persistence failure — the transport should redeliver.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Consumes inbound telemetry events. Stateless apart from its ports, so a
/// single instance serves any number of concurrent deliveries.
pub struct IngestionHandler {
    readings: Arc<dyn SensorReadingRepository>,
    uow: Arc<dyn UnitOfWorkFactory>,
    thresholds: Thresholds,
}

impl IngestionHandler {
    pub fn new(
        readings: Arc<dyn SensorReadingRepository>,
        uow: Arc<dyn UnitOfWorkFactory>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            readings,
            uow,
            thresholds,
        }
    }

    pub async fn handle(&self, event: InboundTelemetry) -> Result<IngestOutcome, IngestError> {
        // 1. Map to the aggregate. A validation failure here is a poison
        //    message, not a transient fault.
        let mut reading = SensorReading::create(
            event.source_id,
            event.sensor_id,
            event.plot_id,
            event.recorded_at,
            event.temperature,
            event.humidity,
            event.soil_moisture,
            event.rainfall,
            event.battery_level,
        )
        .map_err(IngestError::Poison)?;

        // 2. Idempotency check by deterministic identity.
        if self.readings.exists(reading.id()).await? {
            tracing::debug!(
                reading_id = %reading.id(),
                sensor_id = %reading.sensor_id(),
                "Duplicate telemetry delivery, skipping"
            );
            return Ok(IngestOutcome::Duplicate);
        }

        // 3. Evaluate thresholds and build alert aggregates.
        let violations = reading.evaluate_alerts(&self.thresholds);
        let mut alerts = Vec::with_capacity(violations.len());
        for violation in &violations {
            alerts.push(Alert::from_violation(&reading, violation).map_err(IngestError::Poison)?);
        }
        let alerts_created = alerts.len();

        // 4. Persist everything atomically; events buffered in steps 1-3 are
        //    captured into the outbox by the same commit.
        let sensor_id = reading.sensor_id().to_string();
        let mut uow = self.uow.begin().await?;
        uow.add_reading(reading);
        for alert in alerts {
            uow.add_alert(alert);
        }
        match uow.commit().await {
            Ok(_) => {
                tracing::info!(
                    sensor_id = %sensor_id,
                    alerts = alerts_created,
                    "Telemetry processed"
                );
                Ok(IngestOutcome::Processed { alerts_created })
            }
            // A concurrent ingest of the same identity won the insert race;
            // that is the same benign duplicate as step 2 catching it.
            Err(StorageError::Duplicate { .. }) => {
                tracing::debug!(sensor_id = %sensor_id, "Lost insert race to a duplicate delivery");
                Ok(IngestOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
