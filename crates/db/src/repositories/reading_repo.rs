//! Write-side repository for the `sensor_readings` table.

use async_trait::async_trait;
use uuid::Uuid;

use cropwatch_core::ports::{SensorReadingRepository, StorageError};
use cropwatch_core::reading::SensorReading;

use crate::models::SensorReadingRow;
use crate::repositories::classify;
use crate::DbPool;

/// Column list for `sensor_readings` queries.
const READING_COLUMNS: &str = "id, sensor_id, plot_id, recorded_at, temperature, humidity, \
     soil_moisture, rainfall, battery_level, created_at";

pub struct PgSensorReadingRepository {
    pool: DbPool,
}

impl PgSensorReadingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SensorReadingRepository for PgSensorReadingRepository {
    async fn exists(&self, id: Uuid) -> Result<bool, StorageError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sensor_readings WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "sensor_reading"))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<SensorReading>, StorageError> {
        let query = format!("SELECT {READING_COLUMNS} FROM sensor_readings WHERE id = $1");
        let row: Option<SensorReadingRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "sensor_reading"))?;
        Ok(row.map(|r| SensorReading::rehydrate(r.into())))
    }
}
