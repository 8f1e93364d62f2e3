//! Sensor-reading row model.

use sqlx::FromRow;
use uuid::Uuid;

use cropwatch_core::reading::ReadingSnapshot;
use cropwatch_core::types::Timestamp;

/// A row from the `sensor_readings` table.
#[derive(Debug, Clone, FromRow)]
pub struct SensorReadingRow {
    pub id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub recorded_at: Timestamp,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub rainfall: Option<f64>,
    pub battery_level: Option<f64>,
    pub created_at: Timestamp,
}

impl From<SensorReadingRow> for ReadingSnapshot {
    fn from(row: SensorReadingRow) -> Self {
        ReadingSnapshot {
            id: row.id,
            sensor_id: row.sensor_id,
            plot_id: row.plot_id,
            recorded_at: row.recorded_at,
            temperature: row.temperature,
            humidity: row.humidity,
            soil_moisture: row.soil_moisture,
            rainfall: row.rainfall,
            battery_level: row.battery_level,
        }
    }
}
