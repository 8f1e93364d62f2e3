//! Domain core for the cropwatch alerting service.
//!
//! Pure business logic: threshold evaluation, the sensor-reading and alert
//! aggregates with their domain events, the idempotent ingestion handler and
//! the alert lifecycle service. No database or transport code lives here;
//! persistence and delivery are reached only through the ports in
//! [`ports`].

pub mod alert;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod ports;
pub mod reading;
pub mod thresholds;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use alert::{Alert, AlertEvent, AlertSnapshot};
pub use error::{DomainError, ValidationError};
pub use ingest::{InboundTelemetry, IngestError, IngestOutcome, IngestionHandler};
pub use lifecycle::{AlertLifecycle, LifecycleError};
pub use reading::{ReadingEvent, SensorReading};
pub use thresholds::{evaluate, Thresholds, Violation};
pub use types::{AlertStatus, AlertType, Severity, Timestamp};
