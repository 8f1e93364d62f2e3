//! Query-side access to the `alerts` read model.
//!
//! Rows here are written by the projector, so reads lag the write model by
//! at most one relay cycle. Rolling-window summaries are computed in memory
//! from a bounded 7-day fetch rather than in SQL.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use cropwatch_core::types::{Severity, Timestamp};

use crate::models::AlertRow;
use crate::DbPool;

/// Column list for `alerts` read-model queries.
const ALERT_COLUMNS: &str = "id, sensor_id, plot_id, alert_type, severity, status, message, \
     measured_value, threshold_value, metadata, created_at, acknowledged_at, acknowledged_by, \
     resolved_at, resolved_by, resolution_notes";

const STATUS_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub total_pending: i64,
    pub by_severity: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Ok,
    Warning,
    Critical,
}

/// Rolling 7-day health picture for one plot or one sensor.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeStatus {
    pub pending_count: i64,
    pub last_24h_count: i64,
    pub last_7d_count: i64,
    pub by_type: BTreeMap<String, i64>,
    pub by_severity: BTreeMap<String, i64>,
    pub most_recent: Option<AlertRow>,
    pub overall: OverallStatus,
}

pub struct AlertReadStore;

impl AlertReadStore {
    /// Pending alerts, newest first.
    pub async fn pending(pool: &DbPool, limit: i64) -> Result<Vec<AlertRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE status = 'Pending' \
             ORDER BY created_at DESC \
             LIMIT $1"
        );
        sqlx::query_as(&query).bind(limit).fetch_all(pool).await
    }

    /// Alert history for a plot over the last `days`, optionally filtered
    /// by type and status.
    pub async fn history(
        pool: &DbPool,
        plot_id: Uuid,
        days: i64,
        alert_type: Option<&str>,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AlertRow>, sqlx::Error> {
        let since = Utc::now() - Duration::days(days);
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE plot_id = "));
        qb.push_bind(plot_id);
        qb.push(" AND created_at >= ");
        qb.push_bind(since);
        if let Some(alert_type) = alert_type {
            qb.push(" AND alert_type = ");
            qb.push_bind(alert_type.to_owned());
        }
        if let Some(status) = status {
            qb.push(" AND status = ");
            qb.push_bind(status.to_owned());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(limit);
        qb.build_query_as().fetch_all(pool).await
    }

    /// Counts of pending alerts created inside the window, grouped by
    /// severity and by type.
    pub async fn pending_summary(
        pool: &DbPool,
        window_hours: i64,
    ) -> Result<PendingSummary, sqlx::Error> {
        let since = Utc::now() - Duration::hours(window_hours);

        let by_severity: Vec<(String, i64)> = sqlx::query_as(
            "SELECT severity, COUNT(*) FROM alerts \
             WHERE status = 'Pending' AND created_at >= $1 \
             GROUP BY severity",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT alert_type, COUNT(*) FROM alerts \
             WHERE status = 'Pending' AND created_at >= $1 \
             GROUP BY alert_type",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(PendingSummary {
            total_pending: by_severity.iter().map(|(_, n)| n).sum(),
            by_severity: by_severity.into_iter().collect(),
            by_type: by_type.into_iter().collect(),
        })
    }

    /// Health status for one plot, computed over the last 7 days.
    pub async fn plot_status(pool: &DbPool, plot_id: Uuid) -> Result<ScopeStatus, sqlx::Error> {
        let query = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE plot_id = $1 AND created_at >= $2 \
             ORDER BY created_at DESC"
        );
        let rows: Vec<AlertRow> = sqlx::query_as(&query)
            .bind(plot_id)
            .bind(Utc::now() - Duration::days(STATUS_WINDOW_DAYS))
            .fetch_all(pool)
            .await?;
        Ok(summarize(&rows, Utc::now()))
    }

    /// Health status for one sensor, computed over the last 7 days.
    pub async fn sensor_status(pool: &DbPool, sensor_id: &str) -> Result<ScopeStatus, sqlx::Error> {
        let query = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE sensor_id = $1 AND created_at >= $2 \
             ORDER BY created_at DESC"
        );
        let rows: Vec<AlertRow> = sqlx::query_as(&query)
            .bind(sensor_id)
            .bind(Utc::now() - Duration::days(STATUS_WINDOW_DAYS))
            .fetch_all(pool)
            .await?;
        Ok(summarize(&rows, Utc::now()))
    }
}

/// Collapse a 7-day window of rows (newest first) into a scope status.
pub fn summarize(rows: &[AlertRow], now: Timestamp) -> ScopeStatus {
    let day_ago = now - Duration::hours(24);

    let mut by_type = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    let mut pending_count = 0i64;
    let mut last_24h_count = 0i64;
    let mut any_critical = false;
    let mut any_high = false;

    for row in rows {
        *by_type.entry(row.alert_type.clone()).or_insert(0) += 1;
        *by_severity.entry(row.severity.clone()).or_insert(0) += 1;
        if row.created_at >= day_ago {
            last_24h_count += 1;
        }
        if row.status == "Pending" {
            pending_count += 1;
        }
        match row.severity.as_str() {
            s if s == Severity::Critical.as_str() => any_critical = true,
            s if s == Severity::High.as_str() => any_high = true,
            _ => {}
        }
    }

    // A critical alert anywhere in the window flags the scope even after it
    // is resolved; the operator decides when the ground truth is healthy.
    let overall = if any_critical {
        OverallStatus::Critical
    } else if any_high || pending_count > 0 {
        OverallStatus::Warning
    } else {
        OverallStatus::Ok
    };

    ScopeStatus {
        pending_count,
        last_24h_count,
        last_7d_count: rows.len() as i64,
        by_type,
        by_severity,
        most_recent: rows.first().cloned(),
        overall,
    }
}

// ---------------------------------------------------------------------------
