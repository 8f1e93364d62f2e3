//! Route table for the alerting API.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{alerts, health, plots, sensors, telemetry};
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST /telemetry                    -> ingest_telemetry
///
/// GET  /alerts/pending               -> pending_alerts
/// GET  /alerts/summary               -> pending_summary
/// POST /alerts/{id}/acknowledge      -> acknowledge_alert
/// POST /alerts/{id}/resolve          -> resolve_alert
///
/// GET  /plots/{plot_id}/alerts       -> plot_alert_history
/// GET  /plots/{plot_id}/status       -> plot_status
///
/// GET  /sensors/{sensor_id}/status   -> sensor_status
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/telemetry", post(telemetry::ingest_telemetry))
        .route("/alerts/pending", get(alerts::pending_alerts))
        .route("/alerts/summary", get(alerts::pending_summary))
        .route("/alerts/{id}/acknowledge", post(alerts::acknowledge_alert))
        .route("/alerts/{id}/resolve", post(alerts::resolve_alert))
        .route("/plots/{plot_id}/alerts", get(plots::plot_alert_history))
        .route("/plots/{plot_id}/status", get(plots::plot_status))
        .route("/sensors/{sensor_id}/status", get(sensors::sensor_status))
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}
