//! Alert aggregate.
//!
//! Event-sourced state machine: commands validate, then buffer and apply
//! exactly one domain event. Event application is free of I/O so the
//! aggregate is unit-testable in isolation and replayable from history.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{codes, DomainError, ValidationError};
use crate::reading::SensorReading;
use crate::thresholds::Violation;
use crate::types::{AlertStatus, AlertType, SENSOR_ID_MAX_LEN, Severity, Timestamp};

pub const EVENT_ALERT_CREATED: &str = "alert.created";
pub const EVENT_ALERT_ACKNOWLEDGED: &str = "alert.acknowledged";
pub const EVENT_ALERT_RESOLVED: &str = "alert.resolved";

const MESSAGE_MAX_LEN: usize = 500;

/// Domain events raised by the alert aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum AlertEvent {
    #[serde(rename = "alert.created")]
    Created {
        alert_id: Uuid,
        sensor_id: String,
        plot_id: Uuid,
        reading_id: Option<Uuid>,
        alert_type: AlertType,
        severity: Severity,
        message: String,
        measured: f64,
        threshold: f64,
        metadata: serde_json::Value,
        occurred_at: Timestamp,
    },
    #[serde(rename = "alert.acknowledged")]
    Acknowledged {
        alert_id: Uuid,
        sensor_id: String,
        plot_id: Uuid,
        acknowledged_by: String,
        occurred_at: Timestamp,
    },
    #[serde(rename = "alert.resolved")]
    Resolved {
        alert_id: Uuid,
        sensor_id: String,
        plot_id: Uuid,
        resolved_by: String,
        resolution_notes: Option<String>,
        occurred_at: Timestamp,
    },
}

impl AlertEvent {
    /// Stable dot-form name used for outbox routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            AlertEvent::Created { .. } => EVENT_ALERT_CREATED,
            AlertEvent::Acknowledged { .. } => EVENT_ALERT_ACKNOWLEDGED,
            AlertEvent::Resolved { .. } => EVENT_ALERT_RESOLVED,
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            AlertEvent::Created { alert_id, .. }
            | AlertEvent::Acknowledged { alert_id, .. }
            | AlertEvent::Resolved { alert_id, .. } => *alert_id,
        }
    }

    pub fn occurred_at(&self) -> Timestamp {
        match self {
            AlertEvent::Created { occurred_at, .. }
            | AlertEvent::Acknowledged { occurred_at, .. }
            | AlertEvent::Resolved { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Plain field snapshot of an alert, used to move state across the
/// persistence boundary in both directions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub reading_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub message: String,
    pub measured: f64,
    pub threshold: f64,
    pub metadata: serde_json::Value,
    pub detected_at: Timestamp,
    pub acknowledged_at: Option<Timestamp>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    /// Optimistic-concurrency token, incremented by the store on update.
    pub version: i32,
}

/// The alert write-side aggregate.
#[derive(Debug, Clone)]
pub struct Alert {
    state: AlertSnapshot,
    events: Vec<AlertEvent>,
}

impl Alert {
    /// Create a new pending alert, validating identity and message.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        sensor_id: impl Into<String>,
        plot_id: Uuid,
        reading_id: Option<Uuid>,
        alert_type: AlertType,
        severity: Severity,
        message: impl Into<String>,
        measured: f64,
        threshold: f64,
        metadata: serde_json::Value,
    ) -> Result<Self, DomainError> {
        let sensor_id = sensor_id.into();
        let message = message.into();
        let mut errors = Vec::new();

        if sensor_id.trim().is_empty() {
            errors.push(ValidationError::new(
                codes::SENSOR_ID_REQUIRED,
                "sensor id is required",
            ));
        } else if sensor_id.len() > SENSOR_ID_MAX_LEN {
            errors.push(ValidationError::new(
                codes::SENSOR_ID_TOO_LONG,
                format!("sensor id must be at most {SENSOR_ID_MAX_LEN} characters"),
            ));
        }
        if plot_id.is_nil() {
            errors.push(ValidationError::new(
                codes::PLOT_ID_REQUIRED,
                "plot id is required",
            ));
        }
        if message.trim().is_empty() {
            errors.push(ValidationError::new(
                codes::MESSAGE_REQUIRED,
                "alert message is required",
            ));
        } else if message.len() > MESSAGE_MAX_LEN {
            errors.push(ValidationError::new(
                codes::MESSAGE_TOO_LONG,
                format!("alert message must be at most {MESSAGE_MAX_LEN} characters"),
            ));
        }
        if !errors.is_empty() {
            return Err(DomainError::Invalid(errors));
        }

        let mut alert = Self::blank();
        alert.record(AlertEvent::Created {
            alert_id: Uuid::new_v4(),
            sensor_id,
            plot_id,
            reading_id,
            alert_type,
            severity,
            message,
            measured,
            threshold,
            metadata,
            occurred_at: Utc::now(),
        });
        Ok(alert)
    }

    /// Build an alert from a threshold violation on a validated reading.
    ///
    /// The message follows the operator-facing templates; the metadata blob
    /// carries the reading's sibling metrics for traceability.
    pub fn from_violation(
        reading: &SensorReading,
        violation: &Violation,
    ) -> Result<Self, DomainError> {
        let message = match violation.alert_type {
            AlertType::HighTemperature => {
                format!("High temperature detected: {:.1}°C", violation.measured)
            }
            AlertType::LowSoilMoisture => format!(
                "Low soil moisture detected: {:.1}% - Irrigation may be needed",
                violation.measured
            ),
            AlertType::LowBattery => format!(
                "Low battery warning: {:.1}% - Sensor maintenance required",
                violation.measured
            ),
        };
        let metadata = serde_json::json!({
            "temperature": reading.temperature(),
            "humidity": reading.humidity(),
            "soil_moisture": reading.soil_moisture(),
            "rainfall": reading.rainfall(),
            "battery_level": reading.battery_level(),
        });
        Self::create(
            reading.sensor_id(),
            reading.plot_id(),
            Some(reading.id()),
            violation.alert_type,
            violation.severity,
            message,
            violation.measured,
            violation.threshold,
            metadata,
        )
    }

    /// Acknowledge a pending alert. Legal only from `Pending`.
    pub fn acknowledge(&mut self, actor: &str) -> Result<(), DomainError> {
        if actor.trim().is_empty() {
            return Err(DomainError::invalid(
                codes::USER_ID_REQUIRED,
                "user id is required to acknowledge an alert",
            ));
        }
        if self.state.status != AlertStatus::Pending {
            return Err(DomainError::conflict(
                codes::ALERT_NOT_PENDING,
                "only pending alerts can be acknowledged",
            ));
        }
        self.record(AlertEvent::Acknowledged {
            alert_id: self.state.id,
            sensor_id: self.state.sensor_id.clone(),
            plot_id: self.state.plot_id,
            acknowledged_by: actor.to_string(),
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    /// Resolve an alert. Legal from `Pending` or `Acknowledged`; resolution
    /// preserves any acknowledgement stamps already set.
    pub fn resolve(&mut self, actor: &str, notes: Option<String>) -> Result<(), DomainError> {
        if actor.trim().is_empty() {
            return Err(DomainError::invalid(
                codes::USER_ID_REQUIRED,
                "user id is required to resolve an alert",
            ));
        }
        if self.state.status == AlertStatus::Resolved {
            return Err(DomainError::conflict(
                codes::ALERT_ALREADY_RESOLVED,
                "alert is already resolved",
            ));
        }
        self.record(AlertEvent::Resolved {
            alert_id: self.state.id,
            sensor_id: self.state.sensor_id.clone(),
            plot_id: self.state.plot_id,
            resolved_by: actor.to_string(),
            resolution_notes: notes,
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    /// Apply an event to the aggregate state. Pure field assignment — no
    /// validation, no I/O. Used both by commands and by replay.
    pub fn apply(&mut self, event: &AlertEvent) {
        match event {
            AlertEvent::Created {
                alert_id,
                sensor_id,
                plot_id,
                reading_id,
                alert_type,
                severity,
                message,
                measured,
                threshold,
                metadata,
                occurred_at,
            } => {
                self.state.id = *alert_id;
                self.state.sensor_id = sensor_id.clone();
                self.state.plot_id = *plot_id;
                self.state.reading_id = *reading_id;
                self.state.alert_type = *alert_type;
                self.state.severity = *severity;
                self.state.message = message.clone();
                self.state.measured = *measured;
                self.state.threshold = *threshold;
                self.state.metadata = metadata.clone();
                self.state.status = AlertStatus::Pending;
                self.state.detected_at = *occurred_at;
            }
            AlertEvent::Acknowledged {
                acknowledged_by,
                occurred_at,
                ..
            } => {
                self.state.status = AlertStatus::Acknowledged;
                self.state.acknowledged_at = Some(*occurred_at);
                self.state.acknowledged_by = Some(acknowledged_by.clone());
            }
            AlertEvent::Resolved {
                resolved_by,
                resolution_notes,
                occurred_at,
                ..
            } => {
                self.state.status = AlertStatus::Resolved;
                self.state.resolved_at = Some(*occurred_at);
                self.state.resolved_by = Some(resolved_by.clone());
                self.state.resolution_notes = resolution_notes.clone();
            }
        }
    }

    /// Replay a committed event history. Returns `None` unless the history
    /// starts with a `Created` event.
    pub fn from_events(events: impl IntoIterator<Item = AlertEvent>) -> Option<Self> {
        let mut iter = events.into_iter();
        let first = iter.next()?;
        if !matches!(first, AlertEvent::Created { .. }) {
            return None;
        }
        let mut alert = Self::blank();
        alert.apply(&first);
        for event in iter {
            alert.apply(&event);
        }
        Some(alert)
    }

    /// Rebuild a persisted alert from its stored state. No events are raised.
    pub fn rehydrate(state: AlertSnapshot) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    /// Drain the pending-event buffer. Called by the unit of work at commit.
    pub fn take_events(&mut self) -> Vec<AlertEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[AlertEvent] {
        &self.events
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        self.state.clone()
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn sensor_id(&self) -> &str {
        &self.state.sensor_id
    }

    pub fn plot_id(&self) -> Uuid {
        self.state.plot_id
    }

    pub fn alert_type(&self) -> AlertType {
        self.state.alert_type
    }

    pub fn severity(&self) -> Severity {
        self.state.severity
    }

    pub fn status(&self) -> AlertStatus {
        self.state.status
    }

    pub fn message(&self) -> &str {
        &self.state.message
    }

    pub fn version(&self) -> i32 {
        self.state.version
    }

    fn record(&mut self, event: AlertEvent) {
        self.apply(&event);
        self.events.push(event);
    }

    fn blank() -> Self {
        Self {
            state: AlertSnapshot {
                id: Uuid::nil(),
                sensor_id: String::new(),
                plot_id: Uuid::nil(),
                reading_id: None,
                alert_type: AlertType::HighTemperature,
                severity: Severity::Low,
                status: AlertStatus::Pending,
                message: String::new(),
                measured: 0.0,
                threshold: 0.0,
                metadata: serde_json::Value::Object(Default::default()),
                detected_at: Utc::now(),
                acknowledged_at: None,
                acknowledged_by: None,
                resolved_at: None,
                resolved_by: None,
                resolution_notes: None,
                version: 0,
            },
            events: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn pending_alert() -> Alert {
        Alert::create(
            "sensor-1",
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            AlertType::HighTemperature,
            Severity::Medium,
            "High temperature detected: 40.0°C",
            40.0,
            35.0,
            serde_json::json!({}),
        )
        .unwrap()
    }

    #[test]
    fn create_enters_pending_and_buffers_created() {
        let alert = pending_alert();
        assert_eq!(alert.status(), AlertStatus::Pending);
        assert_eq!(alert.pending_events().len(), 1);
        assert_eq!(alert.pending_events()[0].event_type(), EVENT_ALERT_CREATED);
        assert_ne!(alert.id(), Uuid::nil());
    }

    #[test]
    fn create_rejects_empty_sensor_id_and_message() {
        let err = Alert::create(
            " ",
            Uuid::nil(),
            None,
            AlertType::LowBattery,
            Severity::Low,
            "",
            0.0,
            0.0,
            serde_json::json!({}),
        )
        .unwrap_err();
        let DomainError::Invalid(errors) = err else {
            panic!("expected Invalid");
        };
        let found: Vec<_> = errors.iter().map(|e| e.code).collect();
        assert!(found.contains(&codes::SENSOR_ID_REQUIRED));
        assert!(found.contains(&codes::PLOT_ID_REQUIRED));
        assert!(found.contains(&codes::MESSAGE_REQUIRED));
    }

    #[test]
    fn create_rejects_overlong_message() {
        let err = Alert::create(
            "sensor-1",
            Uuid::new_v4(),
            None,
            AlertType::LowBattery,
            Severity::Low,
            "x".repeat(501),
            0.0,
            0.0,
            serde_json::json!({}),
        )
        .unwrap_err();
        assert_matches!(err, DomainError::Invalid(errors) if errors[0].code == codes::MESSAGE_TOO_LONG);
    }

    #[test]
    fn acknowledge_stamps_audit_fields() {
        let mut alert = pending_alert();
        alert.acknowledge("user-7").unwrap();
        let state = alert.snapshot();
        assert_eq!(state.status, AlertStatus::Acknowledged);
        assert_eq!(state.acknowledged_by.as_deref(), Some("user-7"));
        assert!(state.acknowledged_at.is_some());
        assert_eq!(alert.pending_events().len(), 2);
    }

    #[test]
    fn acknowledge_requires_actor() {
        let mut alert = pending_alert();
        let err = alert.acknowledge("  ").unwrap_err();
        assert_matches!(err, DomainError::Invalid(errors) if errors[0].code == codes::USER_ID_REQUIRED);
        assert_eq!(alert.status(), AlertStatus::Pending);
    }

    #[test]
    fn acknowledge_twice_fails_with_not_pending() {
        let mut alert = pending_alert();
        alert.acknowledge("user-7").unwrap();
        let err = alert.acknowledge("user-8").unwrap_err();
        assert_eq!(err.conflict_code(), Some(codes::ALERT_NOT_PENDING));
    }

    #[test]
    fn acknowledge_after_resolve_fails_with_not_pending() {
        let mut alert = pending_alert();
        alert.resolve("user-7", None).unwrap();
        let err = alert.acknowledge("user-8").unwrap_err();
        assert_eq!(err.conflict_code(), Some(codes::ALERT_NOT_PENDING));
    }

    #[test]
    fn resolve_directly_from_pending() {
        let mut alert = pending_alert();
        alert.resolve("user-7", Some("fixed".into())).unwrap();
        let state = alert.snapshot();
        assert_eq!(state.status, AlertStatus::Resolved);
        assert_eq!(state.resolved_by.as_deref(), Some("user-7"));
        assert_eq!(state.resolution_notes.as_deref(), Some("fixed"));
        assert!(state.acknowledged_at.is_none());
    }

    #[test]
    fn resolve_preserves_acknowledgement_stamps() {
        let mut alert = pending_alert();
        alert.acknowledge("user-7").unwrap();
        let acked_at = alert.snapshot().acknowledged_at;
        alert.resolve("user-9", None).unwrap();
        let state = alert.snapshot();
        assert_eq!(state.acknowledged_by.as_deref(), Some("user-7"));
        assert_eq!(state.acknowledged_at, acked_at);
        assert_eq!(state.resolved_by.as_deref(), Some("user-9"));
    }

    #[test]
    fn resolve_twice_fails_with_already_resolved() {
        let mut alert = pending_alert();
        alert.resolve("user-7", None).unwrap();
        let err = alert.resolve("user-8", None).unwrap_err();
        assert_eq!(err.conflict_code(), Some(codes::ALERT_ALREADY_RESOLVED));
    }

    #[test]
    fn resolved_is_terminal() {
        let mut alert = pending_alert();
        alert.resolve("user-7", None).unwrap();
        assert!(alert.acknowledge("user-8").is_err());
        assert!(alert.resolve("user-8", None).is_err());
        assert_eq!(alert.status(), AlertStatus::Resolved);
    }

    #[test]
    fn from_events_replays_full_history() {
        let mut alert = pending_alert();
        alert.acknowledge("user-7").unwrap();
        alert.resolve("user-9", Some("done".into())).unwrap();
        let events = alert.take_events();

        let replayed = Alert::from_events(events).unwrap();
        assert_eq!(replayed.snapshot(), alert.snapshot());
    }

    #[test]
    fn from_events_rejects_history_not_starting_with_created() {
        let event = AlertEvent::Acknowledged {
            alert_id: Uuid::new_v4(),
            sensor_id: "sensor-1".into(),
            plot_id: Uuid::new_v4(),
            acknowledged_by: "user-7".into(),
            occurred_at: Utc::now(),
        };
        assert!(Alert::from_events([event]).is_none());
    }

    #[test]
    fn from_violation_builds_template_message() {
        let mut reading = SensorReading::create(
            Uuid::new_v4(),
            "sensor-1",
            Uuid::new_v4(),
            Utc::now(),
            Some(40.0),
            Some(55.0),
            None,
            None,
            None,
        )
        .unwrap();
        let violations = reading.evaluate_alerts(&crate::thresholds::Thresholds::default());
        let alert = Alert::from_violation(&reading, &violations[0]).unwrap();

        assert_eq!(alert.message(), "High temperature detected: 40.0°C");
        assert_eq!(alert.alert_type(), AlertType::HighTemperature);
        assert_eq!(alert.severity(), Severity::Medium);
        assert_eq!(alert.snapshot().reading_id, Some(reading.id()));
        assert_eq!(alert.snapshot().metadata["humidity"], 55.0);
    }
}
