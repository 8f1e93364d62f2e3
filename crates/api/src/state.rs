use std::sync::Arc;

use cropwatch_core::ingest::IngestionHandler;
use cropwatch_core::lifecycle::AlertLifecycle;
use cropwatch_events::NotificationBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-model queries use it directly).
    pub pool: cropwatch_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Telemetry ingestion use case.
    pub ingestion: Arc<IngestionHandler>,
    /// Alert acknowledge/resolve use cases.
    pub lifecycle: Arc<AlertLifecycle>,
    /// In-process notification fan-out for push surfaces.
    pub bus: Arc<NotificationBus>,
}
