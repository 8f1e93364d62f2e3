//! Idempotent writes to the `alerts` read-model table.
//!
//! The projector applies committed events through these; every write is
//! duplicate-safe (insert-if-absent, absolute field sets) so at-least-once
//! delivery never corrupts the view.

use uuid::Uuid;

use cropwatch_core::types::Timestamp;

use crate::models::NewAlertRow;
use crate::DbPool;

pub struct AlertProjectionRepo;

impl AlertProjectionRepo {
    /// Insert the row for a newly created alert. A duplicate delivery hits
    /// the primary key and is silently skipped.
    pub async fn insert_created(pool: &DbPool, row: &NewAlertRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO alerts \
                (id, sensor_id, plot_id, alert_type, severity, status, message, \
                 measured_value, threshold_value, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'Pending', $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(row.id)
        .bind(&row.sensor_id)
        .bind(row.plot_id)
        .bind(&row.alert_type)
        .bind(&row.severity)
        .bind(&row.message)
        .bind(row.measured_value)
        .bind(row.threshold_value)
        .bind(&row.metadata)
        .bind(row.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Stamp acknowledgement fields. The status guard keeps a late or
    /// duplicate acknowledgement from regressing an already-resolved row.
    pub async fn mark_acknowledged(
        pool: &DbPool,
        id: Uuid,
        acknowledged_by: &str,
        acknowledged_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE alerts \
             SET status = 'Acknowledged', acknowledged_at = $2, acknowledged_by = $3 \
             WHERE id = $1 AND status <> 'Resolved'",
        )
        .bind(id)
        .bind(acknowledged_at)
        .bind(acknowledged_by)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Stamp resolution fields. Absolute field set; repeating it is a no-op.
    pub async fn mark_resolved(
        pool: &DbPool,
        id: Uuid,
        resolved_by: &str,
        resolution_notes: Option<&str>,
        resolved_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE alerts \
             SET status = 'Resolved', resolved_at = $2, resolved_by = $3, resolution_notes = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(resolved_at)
        .bind(resolved_by)
        .bind(resolution_notes)
        .execute(pool)
        .await?;
        Ok(())
    }
}
