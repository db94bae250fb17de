//! Regulatory rule thresholds.
//!
//! All values are minutes. Defaults follow the EU drivers'-hours profile.
//! The rule set is immutable for the lifetime of a session; it may be
//! reloaded between sessions (see `Tracker::start_program`).

use serde::{Deserialize, Serialize};

/// Static compliance thresholds for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRules {
    /// Maximum daily driving time.
    #[serde(default = "default_max_driving_min")]
    pub max_driving_min: u64,
    /// Continuous-work span after which a break is mandatory.
    #[serde(default = "default_mandatory_break_after_min")]
    pub mandatory_break_after_min: u64,
    /// Required length of a mandatory break.
    #[serde(default = "default_min_break_duration_min")]
    pub min_break_duration_min: u64,
    /// Required length of the daily rest period.
    #[serde(default = "default_daily_rest_period_min")]
    pub daily_rest_period_min: u64,
    /// Required length of the weekly rest period.
    #[serde(default = "default_weekly_rest_period_min")]
    pub weekly_rest_period_min: u64,
    /// Maximum driving time per week.
    #[serde(default = "default_max_weekly_driving_min")]
    pub max_weekly_driving_min: u64,
    /// Maximum driving time per two consecutive weeks.
    #[serde(default = "default_max_biweekly_driving_min")]
    pub max_biweekly_driving_min: u64,
}

fn default_max_driving_min() -> u64 {
    9 * 60
}
fn default_mandatory_break_after_min() -> u64 {
    4 * 60 + 30
}
fn default_min_break_duration_min() -> u64 {
    45
}
fn default_daily_rest_period_min() -> u64 {
    11 * 60
}
fn default_weekly_rest_period_min() -> u64 {
    45 * 60
}
fn default_max_weekly_driving_min() -> u64 {
    56 * 60
}
fn default_max_biweekly_driving_min() -> u64 {
    90 * 60
}

impl Default for ComplianceRules {
    fn default() -> Self {
        Self {
            max_driving_min: default_max_driving_min(),
            mandatory_break_after_min: default_mandatory_break_after_min(),
            min_break_duration_min: default_min_break_duration_min(),
            daily_rest_period_min: default_daily_rest_period_min(),
            weekly_rest_period_min: default_weekly_rest_period_min(),
            max_weekly_driving_min: default_max_weekly_driving_min(),
            max_biweekly_driving_min: default_max_biweekly_driving_min(),
        }
    }
}

impl ComplianceRules {
    pub fn max_driving_ms(&self) -> u64 {
        min_to_ms(self.max_driving_min)
    }

    pub fn mandatory_break_after_ms(&self) -> u64 {
        min_to_ms(self.mandatory_break_after_min)
    }

    pub fn min_break_duration_ms(&self) -> u64 {
        min_to_ms(self.min_break_duration_min)
    }

    pub fn daily_rest_period_ms(&self) -> u64 {
        min_to_ms(self.daily_rest_period_min)
    }
}

pub(crate) fn min_to_ms(minutes: u64) -> u64 {
    minutes.saturating_mul(60).saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_eu_profile() {
        let rules = ComplianceRules::default();
        assert_eq!(rules.max_driving_min, 540);
        assert_eq!(rules.mandatory_break_after_min, 270);
        assert_eq!(rules.min_break_duration_min, 45);
        assert_eq!(rules.daily_rest_period_min, 660);
        assert_eq!(rules.weekly_rest_period_min, 2700);
        assert_eq!(rules.max_weekly_driving_min, 3360);
        assert_eq!(rules.max_biweekly_driving_min, 5400);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let rules: ComplianceRules = toml::from_str("max_driving_min = 600").unwrap();
        assert_eq!(rules.max_driving_min, 600);
        assert_eq!(rules.mandatory_break_after_min, 270);
    }

    #[test]
    fn ms_helpers_saturate() {
        let rules = ComplianceRules {
            max_driving_min: u64::MAX,
            ..ComplianceRules::default()
        };
        assert_eq!(rules.max_driving_ms(), u64::MAX);
    }
}
