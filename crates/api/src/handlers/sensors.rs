//! Handlers for the `/sensors` resource.

use axum::extract::{Path, State};
use axum::Json;

use cropwatch_db::AlertReadStore;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/sensors/{sensor_id}/status
///
/// Rolling 7-day health picture for a single sensor.
pub async fn sensor_status(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let status = AlertReadStore::sensor_status(&state.pool, &sensor_id).await?;
    Ok(Json(serde_json::json!({ "data": status })))
}
