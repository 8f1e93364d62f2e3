//! Alert row models: the write-side aggregate row and the denormalized
//! read-model row.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use cropwatch_core::alert::AlertSnapshot;
use cropwatch_core::types::{ParseEnumError, Timestamp};

/// A row from the `alert_aggregates` write-model table.
#[derive(Debug, Clone, FromRow)]
pub struct AlertAggregateRow {
    pub id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub reading_id: Option<Uuid>,
    pub alert_type: String,
    pub severity: String,
    pub status: String,
    pub message: String,
    pub measured_value: f64,
    pub threshold_value: f64,
    pub metadata: serde_json::Value,
    pub detected_at: Timestamp,
    pub acknowledged_at: Option<Timestamp>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub version: i32,
}

impl TryFrom<AlertAggregateRow> for AlertSnapshot {
    type Error = ParseEnumError;

    fn try_from(row: AlertAggregateRow) -> Result<Self, Self::Error> {
        Ok(AlertSnapshot {
            id: row.id,
            sensor_id: row.sensor_id,
            plot_id: row.plot_id,
            reading_id: row.reading_id,
            alert_type: row.alert_type.parse()?,
            severity: row.severity.parse()?,
            status: row.status.parse()?,
            message: row.message,
            measured: row.measured_value,
            threshold: row.threshold_value,
            metadata: row.metadata,
            detected_at: row.detected_at,
            acknowledged_at: row.acknowledged_at,
            acknowledged_by: row.acknowledged_by,
            resolved_at: row.resolved_at,
            resolved_by: row.resolved_by,
            resolution_notes: row.resolution_notes,
            version: row.version,
        })
    }
}

/// A row from the `alerts` read-model table, served directly to queries.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertRow {
    pub id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub alert_type: String,
    pub severity: String,
    pub status: String,
    pub message: String,
    pub measured_value: f64,
    pub threshold_value: f64,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub acknowledged_at: Option<Timestamp>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

/// Fields for a new read-model row, built by the projector from an
/// `alert.created` event.
#[derive(Debug, Clone)]
pub struct NewAlertRow {
    pub id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub measured_value: f64,
    pub threshold_value: f64,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}
