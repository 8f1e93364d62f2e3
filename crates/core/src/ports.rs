//! Ports to the core's collaborators.
//!
//! Persistence mechanics, transports and notification fan-out live outside
//! the core; these traits are the whole surface the core sees. The outbox
//! relay has no direct port here — capturing buffered domain events is an
//! implicit obligation of [`UnitOfWork::commit`].

use std::error::Error;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::alert::Alert;
use crate::reading::SensorReading;
use crate::types::{AlertType, Severity, Timestamp};

/// Infrastructure failures from the persistence layer, classified so the
/// caller can tell a benign duplicate from a retryable outage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A uniqueness constraint rejected an insert. For readings this is the
    /// benign idempotent outcome of a duplicate delivery, never a fault.
    #[error("duplicate {entity}")]
    Duplicate { entity: &'static str },

    /// An optimistic-concurrency guard rejected an update; the caller must
    /// retry the read-modify-write cycle.
    #[error("concurrent modification of {entity}")]
    Conflict { entity: &'static str },

    /// The store is unreachable or failed transiently; retry with backoff.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] Box<dyn Error + Send + Sync>),
}

#[async_trait]
pub trait SensorReadingRepository: Send + Sync {
    /// Identity check used for duplicate detection during ingestion.
    async fn exists(&self, id: Uuid) -> Result<bool, StorageError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<SensorReading>, StorageError>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Alert>, StorageError>;
}

/// One transactional unit of work. Aggregates are staged, then `commit`
/// persists every staged change AND captures every buffered domain event
/// into the outbox in the same atomic transaction. Dropping an uncommitted
/// unit of work abandons all staged changes.
#[async_trait]
pub trait UnitOfWork: Send {
    fn add_reading(&mut self, reading: SensorReading);

    fn add_alert(&mut self, alert: Alert);

    fn update_alert(&mut self, alert: Alert);

    /// Atomically persist all staged changes. Returns the number of
    /// aggregate rows written.
    async fn commit(self: Box<Self>) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError>;
}

// ---------------------------------------------------------------------------
// Notification port
// ---------------------------------------------------------------------------

/// Failure to hand a notification to the delivery channel. Best-effort:
/// callers log and continue, they never roll back committed state over this.
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AlertCreatedNotice {
    pub alert_id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub measured: f64,
    pub threshold: f64,
    pub detected_at: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertAcknowledgedNotice {
    pub alert_id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub acknowledged_by: String,
    pub acknowledged_at: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertResolvedNotice {
    pub alert_id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub resolved_by: String,
    pub resolved_at: Timestamp,
    pub resolution_notes: Option<String>,
}

/// Push channel for alert lifecycle notifications to subscribers of a plot.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn alert_created(&self, notice: AlertCreatedNotice) -> Result<(), NotifyError>;

    async fn alert_acknowledged(&self, notice: AlertAcknowledgedNotice)
        -> Result<(), NotifyError>;

    async fn alert_resolved(&self, notice: AlertResolvedNotice) -> Result<(), NotifyError>;
}
