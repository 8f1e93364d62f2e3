//! Handlers for the `/plots` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use cropwatch_core::types::{AlertStatus, AlertType};
use cropwatch_db::AlertReadStore;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Query parameters for `GET /plots/{plot_id}/alerts`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// How many days back to look. Defaults to 30, capped at 365.
    pub days: Option<i64>,
    /// Optional alert-type filter (`HighTemperature`, ...).
    pub alert_type: Option<String>,
    /// Optional status filter (`Pending`, ...).
    pub status: Option<String>,
    /// Maximum number of results. Defaults to 500.
    pub limit: Option<i64>,
}

const DEFAULT_HISTORY_DAYS: i64 = 30;
const MAX_HISTORY_DAYS: i64 = 365;
const DEFAULT_HISTORY_LIMIT: i64 = 500;

/// GET /api/plots/{plot_id}/alerts
///
/// Alert history for a plot, newest first. Filter values are validated
/// against the known enumerations so typos fail loudly instead of
/// returning an empty list.
pub async fn plot_alert_history(
    State(state): State<AppState>,
    Path(plot_id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let days = params
        .days
        .unwrap_or(DEFAULT_HISTORY_DAYS)
        .clamp(1, MAX_HISTORY_DAYS);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, DEFAULT_HISTORY_LIMIT);

    if let Some(alert_type) = params.alert_type.as_deref() {
        alert_type
            .parse::<AlertType>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
    }
    if let Some(status) = params.status.as_deref() {
        status
            .parse::<AlertStatus>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
    }

    let alerts = AlertReadStore::history(
        &state.pool,
        plot_id,
        days,
        params.alert_type.as_deref(),
        params.status.as_deref(),
        limit,
    )
    .await?;
    Ok(Json(serde_json::json!({ "data": alerts })))
}

/// GET /api/plots/{plot_id}/status
///
/// Rolling 7-day health picture for a plot.
pub async fn plot_status(
    State(state): State<AppState>,
    Path(plot_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let status = AlertReadStore::plot_status(&state.pool, plot_id).await?;
    Ok(Json(serde_json::json!({ "data": status })))
}
