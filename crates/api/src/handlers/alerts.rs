//! Handlers for the `/alerts` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use cropwatch_core::alert::Alert;
use cropwatch_db::AlertReadStore;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query / request types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /alerts/pending`.
#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    /// Maximum number of results. Defaults to 100, capped at 500.
    pub limit: Option<i64>,
}

/// Query parameters for `GET /alerts/summary`.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Rolling window in hours. Defaults to 24, capped at one week.
    pub window_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub user_id: String,
    pub notes: Option<String>,
}

/// Default page size for pending alert listing.
const DEFAULT_LIMIT: i64 = 100;

/// Maximum page size for pending alert listing.
const MAX_LIMIT: i64 = 500;

const DEFAULT_WINDOW_HOURS: i64 = 24;
const MAX_WINDOW_HOURS: i64 = 24 * 7;

fn alert_json(alert: &Alert) -> serde_json::Value {
    serde_json::json!({ "data": alert.snapshot() })
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/alerts/pending
///
/// List pending alerts from the read model, newest first.
pub async fn pending_alerts(
    State(state): State<AppState>,
    Query(params): Query<PendingQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let alerts = AlertReadStore::pending(&state.pool, limit).await?;
    Ok(Json(serde_json::json!({ "data": alerts })))
}

/// GET /api/alerts/summary
///
/// Pending-alert counts by severity and type over a rolling window.
pub async fn pending_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let window = params
        .window_hours
        .unwrap_or(DEFAULT_WINDOW_HOURS)
        .clamp(1, MAX_WINDOW_HOURS);
    let summary = AlertReadStore::pending_summary(&state.pool, window).await?;
    Ok(Json(serde_json::json!({ "data": summary })))
}

// ---------------------------------------------------------------------------
// Lifecycle commands
// ---------------------------------------------------------------------------

/// POST /api/alerts/{id}/acknowledge
///
/// Acknowledge a pending alert. 404 for an unknown id, 409 with
/// `Alert.NotPending` if it has already moved on.
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AcknowledgeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let alert = state
        .lifecycle
        .acknowledge(id, &req.user_id)
        .await
        .map_err(AppError::from)?;
    Ok(Json(alert_json(&alert)))
}

/// POST /api/alerts/{id}/resolve
///
/// Resolve a pending or acknowledged alert. 409 with
/// `Alert.AlreadyResolved` if it is already resolved.
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let alert = state
        .lifecycle
        .resolve(id, &req.user_id, req.notes)
        .await
        .map_err(AppError::from)?;
    Ok(Json(alert_json(&alert)))
}
