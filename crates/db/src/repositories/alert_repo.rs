//! Write-side repository for the `alert_aggregates` table.

use async_trait::async_trait;
use uuid::Uuid;

use cropwatch_core::alert::{Alert, AlertSnapshot};
use cropwatch_core::ports::{AlertRepository, StorageError};

use crate::models::AlertAggregateRow;
use crate::repositories::classify;
use crate::DbPool;

/// Column list for `alert_aggregates` queries.
pub(crate) const ALERT_AGGREGATE_COLUMNS: &str =
    "id, sensor_id, plot_id, reading_id, alert_type, severity, status, message, \
     measured_value, threshold_value, metadata, detected_at, acknowledged_at, \
     acknowledged_by, resolved_at, resolved_by, resolution_notes, version";

pub struct PgAlertRepository {
    pool: DbPool,
}

impl PgAlertRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for PgAlertRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Alert>, StorageError> {
        let query = format!("SELECT {ALERT_AGGREGATE_COLUMNS} FROM alert_aggregates WHERE id = $1");
        let row: Option<AlertAggregateRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "alert"))?;

        row.map(|r| {
            let snapshot: AlertSnapshot = r
                .try_into()
                .map_err(|e| StorageError::Unavailable(Box::new(e)))?;
            Ok(Alert::rehydrate(snapshot))
        })
        .transpose()
    }
}
