//! Sensor-reading aggregate.
//!
//! One immutable telemetry sample. The identity comes verbatim from the
//! inbound event's own identifier, never generated here, so a re-delivered
//! event maps to the same aggregate id and is detectable as a duplicate.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{codes, DomainError, ValidationError};
use crate::thresholds::{evaluate, Thresholds, Violation};
use crate::types::{SENSOR_ID_MAX_LEN, Timestamp};

pub const EVENT_READING_RECORDED: &str = "reading.recorded";
pub const EVENT_THRESHOLD_VIOLATED: &str = "reading.threshold_violated";

/// Domain events raised by the reading aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ReadingEvent {
    #[serde(rename = "reading.recorded")]
    Recorded {
        reading_id: Uuid,
        sensor_id: String,
        plot_id: Uuid,
        recorded_at: Timestamp,
        temperature: Option<f64>,
        humidity: Option<f64>,
        soil_moisture: Option<f64>,
        rainfall: Option<f64>,
        battery_level: Option<f64>,
        occurred_at: Timestamp,
    },
    #[serde(rename = "reading.threshold_violated")]
    ThresholdViolated {
        reading_id: Uuid,
        sensor_id: String,
        plot_id: Uuid,
        alert_type: crate::types::AlertType,
        severity: crate::types::Severity,
        measured: f64,
        threshold: f64,
        occurred_at: Timestamp,
    },
}

impl ReadingEvent {
    /// Stable dot-form name used for outbox routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            ReadingEvent::Recorded { .. } => EVENT_READING_RECORDED,
            ReadingEvent::ThresholdViolated { .. } => EVENT_THRESHOLD_VIOLATED,
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            ReadingEvent::Recorded { reading_id, .. }
            | ReadingEvent::ThresholdViolated { reading_id, .. } => *reading_id,
        }
    }

    pub fn occurred_at(&self) -> Timestamp {
        match self {
            ReadingEvent::Recorded { occurred_at, .. }
            | ReadingEvent::ThresholdViolated { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Plain field snapshot of a reading, used to move state across the
/// persistence boundary without exposing mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSnapshot {
    pub id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub recorded_at: Timestamp,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub rainfall: Option<f64>,
    pub battery_level: Option<f64>,
}

/// One validated telemetry sample. Created once, immutable thereafter;
/// the only post-creation operation is threshold evaluation, which buffers
/// events but never changes the sample itself.
#[derive(Debug, Clone)]
pub struct SensorReading {
    id: Uuid,
    sensor_id: String,
    plot_id: Uuid,
    recorded_at: Timestamp,
    temperature: Option<f64>,
    humidity: Option<f64>,
    soil_moisture: Option<f64>,
    rainfall: Option<f64>,
    battery_level: Option<f64>,
    events: Vec<ReadingEvent>,
}

impl SensorReading {
    /// Validating factory. Collects every field failure into one
    /// [`DomainError::Invalid`] instead of stopping at the first.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: Uuid,
        sensor_id: impl Into<String>,
        plot_id: Uuid,
        recorded_at: Timestamp,
        temperature: Option<f64>,
        humidity: Option<f64>,
        soil_moisture: Option<f64>,
        rainfall: Option<f64>,
        battery_level: Option<f64>,
    ) -> Result<Self, DomainError> {
        let sensor_id = sensor_id.into();
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

        if recorded_at > Utc::now() {
            errors.push(ValidationError::new(
                codes::TIME_FUTURE_NOT_ALLOWED,
                "reading timestamp must not be in the future",
            ));
        }

        if temperature.is_none()
            && humidity.is_none()
            && soil_moisture.is_none()
            && rainfall.is_none()
            && battery_level.is_none()
        {
            errors.push(ValidationError::new(
                codes::METRICS_REQUIRED,
                "at least one metric must be present",
            ));
        }

        check_range(
            temperature,
            -50.0,
            70.0,
            codes::TEMPERATURE_OUT_OF_RANGE,
            "temperature must be between -50 and 70",
            &mut errors,
        );
        check_range(
            humidity,
            0.0,
            100.0,
            codes::HUMIDITY_OUT_OF_RANGE,
            "humidity must be between 0 and 100",
            &mut errors,
        );
        check_range(
            soil_moisture,
            0.0,
            100.0,
            codes::SOIL_MOISTURE_OUT_OF_RANGE,
            "soil moisture must be between 0 and 100",
            &mut errors,
        );
        if let Some(rain) = rainfall {
            if rain < 0.0 {
                errors.push(ValidationError::new(
                    codes::RAINFALL_OUT_OF_RANGE,
                    "rainfall must not be negative",
                ));
            }
        }
        check_range(
            battery_level,
            0.0,
            100.0,
            codes::BATTERY_LEVEL_OUT_OF_RANGE,
            "battery level must be between 0 and 100",
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(DomainError::Invalid(errors));
        }

        let mut reading = Self {
            id,
            sensor_id,
            plot_id,
            recorded_at,
            temperature,
            humidity,
            soil_moisture,
            rainfall,
            battery_level,
            events: Vec::new(),
        };
        reading.events.push(ReadingEvent::Recorded {
            reading_id: reading.id,
            sensor_id: reading.sensor_id.clone(),
            plot_id: reading.plot_id,
            recorded_at: reading.recorded_at,
            temperature: reading.temperature,
            humidity: reading.humidity,
            soil_moisture: reading.soil_moisture,
            rainfall: reading.rainfall,
            battery_level: reading.battery_level,
            occurred_at: Utc::now(),
        });
        Ok(reading)
    }

    /// Rebuild a persisted reading. No events are raised.
    pub fn rehydrate(snapshot: ReadingSnapshot) -> Self {
        Self {
            id: snapshot.id,
            sensor_id: snapshot.sensor_id,
            plot_id: snapshot.plot_id,
            recorded_at: snapshot.recorded_at,
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            soil_moisture: snapshot.soil_moisture,
            rainfall: snapshot.rainfall,
            battery_level: snapshot.battery_level,
            events: Vec::new(),
        }
    }

    /// Run the threshold policy once, buffering one `ThresholdViolated`
    /// event per violation. Returns the violations so the caller can build
    /// alert aggregates from them.
    pub fn evaluate_alerts(&mut self, thresholds: &Thresholds) -> Vec<Violation> {
        let violations = evaluate(
            self.temperature,
            self.soil_moisture,
            self.battery_level,
            thresholds,
        );
        let now = Utc::now();
        for violation in &violations {
            self.events.push(ReadingEvent::ThresholdViolated {
                reading_id: self.id,
                sensor_id: self.sensor_id.clone(),
                plot_id: self.plot_id,
                alert_type: violation.alert_type,
                severity: violation.severity,
                measured: violation.measured,
                threshold: violation.threshold,
                occurred_at: now,
            });
        }
        violations
    }

    /// Drain the pending-event buffer. Called by the unit of work at commit.
    pub fn take_events(&mut self) -> Vec<ReadingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[ReadingEvent] {
        &self.events
    }

    pub fn snapshot(&self) -> ReadingSnapshot {
        ReadingSnapshot {
            id: self.id,
            sensor_id: self.sensor_id.clone(),
            plot_id: self.plot_id,
            recorded_at: self.recorded_at,
            temperature: self.temperature,
            humidity: self.humidity,
            soil_moisture: self.soil_moisture,
            rainfall: self.rainfall,
            battery_level: self.battery_level,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn plot_id(&self) -> Uuid {
        self.plot_id
    }

    pub fn recorded_at(&self) -> Timestamp {
        self.recorded_at
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn soil_moisture(&self) -> Option<f64> {
        self.soil_moisture
    }

    pub fn rainfall(&self) -> Option<f64> {
        self.rainfall
    }

    pub fn battery_level(&self) -> Option<f64> {
        self.battery_level
    }
}

fn check_range(
    value: Option<f64>,
    min: f64,
    max: f64,
    code: &'static str,
    message: &str,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(v) = value {
        if v < min || v > max {
            errors.push(ValidationError::new(code, message));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;

    use super::*;

    fn valid_reading() -> SensorReading {
        SensorReading::create(
            Uuid::new_v4(),
            "sensor-1",
            Uuid::new_v4(),
            Utc::now() - Duration::minutes(1),
            Some(22.0),
            Some(60.0),
            Some(45.0),
            None,
            Some(90.0),
        )
        .unwrap()
    }

    #[test]
    fn create_buffers_a_recorded_event() {
        let reading = valid_reading();
        assert_eq!(reading.pending_events().len(), 1);
        assert_eq!(
            reading.pending_events()[0].event_type(),
            EVENT_READING_RECORDED
        );
        assert_eq!(reading.pending_events()[0].aggregate_id(), reading.id());
    }

    #[test]
    fn create_collects_all_field_failures() {
        let err = SensorReading::create(
            Uuid::new_v4(),
            "",
            Uuid::nil(),
            Utc::now() + Duration::hours(1),
            Some(200.0),
            None,
            None,
            None,
            None,
        )
        .unwrap_err();

        let DomainError::Invalid(errors) = err else {
            panic!("expected Invalid");
        };
        let codes: Vec<_> = errors.iter().map(|e| e.code).collect();
        assert!(codes.contains(&codes::SENSOR_ID_REQUIRED));
        assert!(codes.contains(&codes::PLOT_ID_REQUIRED));
        assert!(codes.contains(&codes::TIME_FUTURE_NOT_ALLOWED));
        assert!(codes.contains(&codes::TEMPERATURE_OUT_OF_RANGE));
    }

    #[test]
    fn create_rejects_all_metrics_absent() {
        let err = SensorReading::create(
            Uuid::new_v4(),
            "sensor-1",
            Uuid::new_v4(),
            Utc::now(),
            None,
            None,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert_matches!(err, DomainError::Invalid(errors) if errors[0].code == codes::METRICS_REQUIRED);
    }

    #[test]
    fn create_rejects_overlong_sensor_id() {
        let err = SensorReading::create(
            Uuid::new_v4(),
            "s".repeat(101),
            Uuid::new_v4(),
            Utc::now(),
            Some(20.0),
            None,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert_matches!(err, DomainError::Invalid(errors) if errors[0].code == codes::SENSOR_ID_TOO_LONG);
    }

    #[test]
    fn create_rejects_negative_rainfall() {
        let err = SensorReading::create(
            Uuid::new_v4(),
            "sensor-1",
            Uuid::new_v4(),
            Utc::now(),
            None,
            None,
            None,
            Some(-1.0),
            None,
        )
        .unwrap_err();
        assert_matches!(err, DomainError::Invalid(errors) if errors[0].code == codes::RAINFALL_OUT_OF_RANGE);
    }

    #[test]
    fn evaluate_alerts_buffers_one_event_per_violation() {
        let mut reading = SensorReading::create(
            Uuid::new_v4(),
            "sensor-1",
            Uuid::new_v4(),
            Utc::now(),
            Some(42.0),
            None,
            Some(5.0),
            None,
            Some(8.0),
        )
        .unwrap();

        let violations = reading.evaluate_alerts(&Thresholds::default());
        assert_eq!(violations.len(), 3);
        // One Recorded plus three ThresholdViolated.
        assert_eq!(reading.pending_events().len(), 4);
    }

    #[test]
    fn take_events_drains_the_buffer() {
        let mut reading = valid_reading();
        let events = reading.take_events();
        assert_eq!(events.len(), 1);
        assert!(reading.pending_events().is_empty());
    }

    #[test]
    fn rehydrated_reading_has_no_pending_events() {
        let mut reading = valid_reading();
        reading.take_events();
        let restored = SensorReading::rehydrate(reading.snapshot());
        assert!(restored.pending_events().is_empty());
        assert_eq!(restored.id(), reading.id());
    }

    #[test]
    fn event_payload_is_internally_tagged() {
        let reading = valid_reading();
        let payload = serde_json::to_value(&reading.pending_events()[0]).unwrap();
        assert_eq!(payload["event"], "Recorded");
        assert_eq!(payload["sensor_id"], "sensor-1");
    }
}
