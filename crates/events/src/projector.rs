//! Read-model projector.
//!
//! Applies committed `alert.*` events to the denormalized `alerts` table.
//! Every write it issues is idempotent, so re-delivery of an already
//! projected event converges on the same row. Reading events carry no
//! read-model state and are skipped.

use cropwatch_core::alert::AlertEvent;
use cropwatch_db::models::{NewAlertRow, OutboxEventRow};
use cropwatch_db::{AlertProjectionRepo, DbPool};

use crate::relay::{ConsumeError, RelayConsumer};

pub struct AlertProjector {
    pool: DbPool,
}

impl AlertProjector {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn apply(&self, event: AlertEvent) -> Result<(), sqlx::Error> {
        match event {
            AlertEvent::Created {
                alert_id,
                sensor_id,
                plot_id,
                alert_type,
                severity,
                message,
                measured,
                threshold,
                metadata,
                occurred_at,
                ..
            } => {
                AlertProjectionRepo::insert_created(
                    &self.pool,
                    &NewAlertRow {
                        id: alert_id,
                        sensor_id,
                        plot_id,
                        alert_type: alert_type.as_str().to_owned(),
                        severity: severity.as_str().to_owned(),
                        message,
                        measured_value: measured,
                        threshold_value: threshold,
                        metadata,
                        created_at: occurred_at,
                    },
                )
                .await
            }
            AlertEvent::Acknowledged {
                alert_id,
                acknowledged_by,
                occurred_at,
                ..
            } => {
                AlertProjectionRepo::mark_acknowledged(
                    &self.pool,
                    alert_id,
                    &acknowledged_by,
                    occurred_at,
                )
                .await
            }
            AlertEvent::Resolved {
                alert_id,
                resolved_by,
                resolution_notes,
                occurred_at,
                ..
            } => {
                AlertProjectionRepo::mark_resolved(
                    &self.pool,
                    alert_id,
                    &resolved_by,
                    resolution_notes.as_deref(),
                    occurred_at,
                )
                .await
            }
        }
    }
}

#[async_trait::async_trait]
impl RelayConsumer for AlertProjector {
    fn name(&self) -> &'static str {
        "alert_projector"
    }

    async fn consume(&self, event: &OutboxEventRow) -> Result<(), ConsumeError> {
        if event.aggregate_type != "alert" {
            return Ok(());
        }

        // A payload that no longer deserializes cannot succeed on retry
        // either; skip it rather than wedging the relay.
        let parsed: AlertEvent = match serde_json::from_value(event.payload.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(
                    outbox_id = event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "Unparseable alert event payload, skipping projection"
                );
                return Ok(());
            }
        };

        self.apply(parsed)
            .await
            .map_err(|e| ConsumeError(e.to_string()))
    }
}
