//! Threshold evaluation policy.
//!
//! Pure logic — no database access and no ambient configuration. The caller
//! passes the configured [`Thresholds`] in explicitly so evaluation is
//! deterministic and parallel-safe.

use serde::{Deserialize, Serialize};

use crate::types::{AlertType, Severity};

/// Configured alert limits, externally supplied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_temperature: f64,
    pub min_soil_moisture: f64,
    pub min_battery_level: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_temperature: 35.0,
            min_soil_moisture: 20.0,
            min_battery_level: 15.0,
        }
    }
}

/// A single threshold violation found by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub measured: f64,
    pub threshold: f64,
}

/// Evaluate a reading's metrics against the configured thresholds.
///
/// A metric triggers a violation strictly beyond its threshold: a value
/// exactly equal to the threshold does NOT trigger. Metrics are evaluated
/// independently, so one reading can yield up to three violations.
pub fn evaluate(
    temperature: Option<f64>,
    soil_moisture: Option<f64>,
    battery_level: Option<f64>,
    thresholds: &Thresholds,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if let Some(temp) = temperature {
        if temp > thresholds.max_temperature {
            violations.push(Violation {
                alert_type: AlertType::HighTemperature,
                severity: temperature_severity(temp - thresholds.max_temperature),
                measured: temp,
                threshold: thresholds.max_temperature,
            });
        }
    }

    if let Some(moisture) = soil_moisture {
        if moisture < thresholds.min_soil_moisture {
            violations.push(Violation {
                alert_type: AlertType::LowSoilMoisture,
                severity: soil_moisture_severity(thresholds.min_soil_moisture - moisture),
                measured: moisture,
                threshold: thresholds.min_soil_moisture,
            });
        }
    }

    if let Some(battery) = battery_level {
        if battery < thresholds.min_battery_level {
            violations.push(Violation {
                alert_type: AlertType::LowBattery,
                severity: battery_severity(battery),
                measured: battery,
                threshold: thresholds.min_battery_level,
            });
        }
    }

    violations
}

/// Severity from degrees above the maximum temperature.
fn temperature_severity(excess: f64) -> Severity {
    if excess >= 15.0 {
        Severity::Critical
    } else if excess >= 10.0 {
        Severity::High
    } else if excess >= 5.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Severity from percentage points below the minimum soil moisture.
fn soil_moisture_severity(deficit: f64) -> Severity {
    if deficit >= 30.0 {
        Severity::Critical
    } else if deficit >= 20.0 {
        Severity::High
    } else if deficit >= 10.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Severity from the absolute battery level — lower is worse, regardless of
/// how the configured minimum compares.
fn battery_severity(level: f64) -> Severity {
    if level < 10.0 {
        Severity::Critical
    } else if level < 20.0 {
        Severity::High
    } else if level < 30.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn value_equal_to_threshold_does_not_trigger() {
        let violations = evaluate(Some(35.0), Some(20.0), Some(15.0), &defaults());
        assert!(violations.is_empty());
    }

    #[test]
    fn value_just_beyond_threshold_triggers() {
        let violations = evaluate(Some(35.1), None, None, &defaults());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].alert_type, AlertType::HighTemperature);
        assert_eq!(violations[0].severity, Severity::Low);
        assert_eq!(violations[0].threshold, 35.0);
    }

    #[test]
    fn absent_metrics_are_skipped() {
        let violations = evaluate(None, None, None, &defaults());
        assert!(violations.is_empty());
    }

    #[test]
    fn temperature_severity_scales_with_excess() {
        // 36 / 41 / 46 / 51 over a 35 max: excess 1 / 6 / 11 / 16.
        let cases = [
            (36.0, Severity::Low),
            (41.0, Severity::Medium),
            (46.0, Severity::High),
            (51.0, Severity::Critical),
        ];
        for (temp, expected) in cases {
            let violations = evaluate(Some(temp), None, None, &defaults());
            assert_eq!(violations[0].severity, expected, "temperature {temp}");
        }
    }

    #[test]
    fn soil_moisture_severity_scales_with_deficit() {
        // 19 / 9 / 0 under a 20 minimum: deficit 1 / 11 / 20.
        let cases = [
            (19.0, Severity::Low),
            (9.0, Severity::Medium),
            (0.0, Severity::High),
        ];
        for (moisture, expected) in cases {
            let violations = evaluate(None, Some(moisture), None, &defaults());
            assert_eq!(violations[0].severity, expected, "moisture {moisture}");
        }
        // Deficit of 30 or more is critical.
        let thresholds = Thresholds {
            min_soil_moisture: 35.0,
            ..defaults()
        };
        let violations = evaluate(None, Some(4.0), None, &thresholds);
        assert_eq!(violations[0].severity, Severity::Critical);
    }

    #[test]
    fn battery_severity_uses_absolute_level() {
        let thresholds = Thresholds {
            min_battery_level: 40.0,
            ..defaults()
        };
        let cases = [
            (5.0, Severity::Critical),
            (15.0, Severity::High),
            (25.0, Severity::Medium),
            (35.0, Severity::Low),
        ];
        for (level, expected) in cases {
            let violations = evaluate(None, None, Some(level), &thresholds);
            assert_eq!(violations[0].severity, expected, "battery {level}");
        }
    }

    #[test]
    fn scenario_high_temperature_only() {
        // temp 40 / soil 30 / battery 80 against defaults: one alert,
        // temperature excess 5 -> Medium.
        let violations = evaluate(Some(40.0), Some(30.0), Some(80.0), &defaults());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].alert_type, AlertType::HighTemperature);
        assert_eq!(violations[0].severity, Severity::Medium);
        assert_eq!(violations[0].measured, 40.0);
    }

    #[test]
    fn scenario_soil_and_battery() {
        // temp 25 / soil 15 / battery 10 against defaults: soil deficit 5 ->
        // Low, battery 10 triggers (10 < 15) at High (10 < 20, not < 10).
        let violations = evaluate(Some(25.0), Some(15.0), Some(10.0), &defaults());
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].alert_type, AlertType::LowSoilMoisture);
        assert_eq!(violations[0].severity, Severity::Low);
        assert_eq!(violations[1].alert_type, AlertType::LowBattery);
        assert_eq!(violations[1].severity, Severity::High);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let a = evaluate(Some(42.0), Some(5.0), Some(8.0), &defaults());
        let b = evaluate(Some(42.0), Some(5.0), Some(8.0), &defaults());
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }
}
