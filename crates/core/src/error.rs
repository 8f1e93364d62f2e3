//! Typed domain errors.
//!
//! Aggregates and services return these for every expected business failure;
//! panics and exception-style propagation are reserved for infrastructure
//! faults (see [`crate::ports::StorageError`]).

use uuid::Uuid;

/// Stable error codes surfaced to callers alongside human-readable messages.
pub mod codes {
    pub const SENSOR_ID_REQUIRED: &str = "SensorId.Required";
    pub const SENSOR_ID_TOO_LONG: &str = "SensorId.TooLong";
    pub const PLOT_ID_REQUIRED: &str = "PlotId.Required";
    pub const MESSAGE_REQUIRED: &str = "Message.Required";
    pub const MESSAGE_TOO_LONG: &str = "Message.TooLong";
    pub const USER_ID_REQUIRED: &str = "UserId.Required";
    pub const TIME_FUTURE_NOT_ALLOWED: &str = "Time.FutureNotAllowed";
    pub const METRICS_REQUIRED: &str = "Metrics.Required";
    pub const TEMPERATURE_OUT_OF_RANGE: &str = "Temperature.OutOfRange";
    pub const HUMIDITY_OUT_OF_RANGE: &str = "Humidity.OutOfRange";
    pub const SOIL_MOISTURE_OUT_OF_RANGE: &str = "SoilMoisture.OutOfRange";
    pub const RAINFALL_OUT_OF_RANGE: &str = "Rainfall.OutOfRange";
    pub const BATTERY_LEVEL_OUT_OF_RANGE: &str = "BatteryLevel.OutOfRange";
    pub const ALERT_NOT_PENDING: &str = "Alert.NotPending";
    pub const ALERT_ALREADY_RESOLVED: &str = "Alert.AlreadyResolved";
}

/// A single field-level validation failure with its stable code.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// An expected business failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Malformed input to a factory or transition. Carries every field
    /// failure found, not just the first.
    #[error("validation failed: {}", .0.iter().map(|e| e.code).collect::<Vec<_>>().join(", "))]
    Invalid(Vec<ValidationError>),

    /// The operation is illegal in the aggregate's current lifecycle state.
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
    },

    /// The aggregate does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
}

impl DomainError {
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        DomainError::Invalid(vec![ValidationError::new(code, message)])
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        DomainError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// The stable code of a conflict error, if this is one.
    pub fn conflict_code(&self) -> Option<&'static str> {
        match self {
            DomainError::Conflict { code, .. } => Some(code),
            _ => None,
        }
    }
}
