//! Handlers for the `/telemetry` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use cropwatch_core::ingest::{InboundTelemetry, IngestOutcome};

use crate::error::AppResult;
use crate::state::AppState;

/// POST /api/telemetry
///
/// Ingest one telemetry event. Idempotent: re-posting the same `source_id`
/// is a successful no-op reported as `"duplicate"`. Always 202 on success;
/// the alerts and read-model rows materialize asynchronously via the relay.
pub async fn ingest_telemetry(
    State(state): State<AppState>,
    Json(event): Json<InboundTelemetry>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let outcome = state.ingestion.handle(event).await?;

    let body = match outcome {
        IngestOutcome::Processed { alerts_created } => serde_json::json!({
            "data": { "outcome": "processed", "alerts_created": alerts_created }
        }),
        IngestOutcome::Duplicate => serde_json::json!({
            "data": { "outcome": "duplicate" }
        }),
    };
    Ok((StatusCode::ACCEPTED, Json(body)))
}
