//! Per-activity safety signal checks.
//!
//! Speed, fuel, and weather are supplied by external collaborators and
//! evaluated as simple threshold checks on the periodic tick. The checks
//! are independent of the compliance engine; each alert has a stable key
//! and deduplicates at the alert center.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::center::Alert;
use crate::compliance::Severity;

pub const SPEED_ALERT_KEY: &str = "safety:speed";
pub const FUEL_ALERT_KEY: &str = "safety:fuel";
pub const WEATHER_ALERT_KEY: &str = "safety:weather";

/// Thresholds for the safety checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimits {
    #[serde(default = "default_max_speed_kph")]
    pub max_speed_kph: f64,
    /// Position fixes with worse horizontal accuracy than this are ignored
    /// for the speed check.
    #[serde(default = "default_max_fix_accuracy_m")]
    pub max_fix_accuracy_m: f64,
    #[serde(default = "default_min_fuel_pct")]
    pub min_fuel_pct: f64,
    #[serde(default = "default_true")]
    pub alert_on_severe_weather: bool,
}

fn default_max_speed_kph() -> f64 {
    90.0
}
fn default_max_fix_accuracy_m() -> f64 {
    50.0
}
fn default_min_fuel_pct() -> f64 {
    12.0
}
fn default_true() -> bool {
    true
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_speed_kph: default_max_speed_kph(),
            max_fix_accuracy_m: default_max_fix_accuracy_m(),
            min_fuel_pct: default_min_fuel_pct(),
            alert_on_severe_weather: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Clear,
    Rain,
    Fog,
    Snow,
    Ice,
    Storm,
}

impl WeatherCondition {
    pub fn is_severe(self) -> bool {
        matches!(
            self,
            WeatherCondition::Snow | WeatherCondition::Ice | WeatherCondition::Storm
        )
    }
}

/// Latest readings from the location/vehicle collaborators. Absent fields
/// simply skip their check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub speed_kph: Option<f64>,
    /// Horizontal accuracy of the position fix behind `speed_kph`, meters.
    pub fix_accuracy_m: Option<f64>,
    pub fuel_level_pct: Option<f64>,
    pub weather: Option<WeatherCondition>,
}

/// Optional collaborator polled on the periodic tick.
pub trait SignalFeed: Send + Sync {
    fn snapshot(&self) -> SignalSnapshot;
}

/// Threshold checks over one snapshot. Deduplication happens at the alert
/// center, keyed by the stable keys above.
pub fn evaluate(signals: &SignalSnapshot, limits: &SafetyLimits, now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(speed) = signals.speed_kph {
        let reliable = signals
            .fix_accuracy_m
            .map(|acc| acc <= limits.max_fix_accuracy_m)
            .unwrap_or(true);
        if reliable && speed > limits.max_speed_kph {
            alerts.push(Alert {
                key: SPEED_ALERT_KEY.to_string(),
                severity: Severity::Warning,
                message: format!(
                    "Speed {speed:.0} km/h exceeds the limit of {:.0} km/h.",
                    limits.max_speed_kph
                ),
                persistent: false,
                urgent: true,
                raised_at: now,
            });
        }
    }

    if let Some(fuel) = signals.fuel_level_pct {
        if fuel < limits.min_fuel_pct {
            alerts.push(Alert {
                key: FUEL_ALERT_KEY.to_string(),
                severity: Severity::Warning,
                message: format!(
                    "Fuel level {fuel:.0}% is below the reserve threshold of {:.0}%.",
                    limits.min_fuel_pct
                ),
                persistent: true,
                urgent: false,
                raised_at: now,
            });
        }
    }

    if limits.alert_on_severe_weather {
        if let Some(weather) = signals.weather {
            if weather.is_severe() {
                alerts.push(Alert {
                    key: WEATHER_ALERT_KEY.to_string(),
                    severity: Severity::Warning,
                    message: "Severe weather reported on route. Adjust speed and distance."
                        .to_string(),
                    persistent: false,
                    urgent: false,
                    raised_at: now,
                });
            }
        }
    }

    alerts
}
