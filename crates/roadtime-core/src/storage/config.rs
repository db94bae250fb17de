//! TOML-based application configuration.
//!
//! Stores the regulatory rule profile, alert lead times, safety thresholds
//! and the session auto-start toggle.
//!
//! Configuration is stored at `~/.config/roadtime/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::alerts::{LeadTimes, SafetyLimits};
use crate::compliance::ComplianceRules;
use crate::error::ConfigError;

/// Alert scheduling configuration. Lead times are minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_lead_min")]
    pub driving_lead_min: u64,
    #[serde(default = "default_lead_min")]
    pub mandatory_break_lead_min: u64,
    #[serde(default = "default_lead_min")]
    pub daily_rest_lead_min: u64,
    /// Periodic re-evaluation interval.
    #[serde(default = "default_tick_secs")]
    pub tick_interval_secs: u64,
    /// Auto-dismiss delay for non-persistent alerts.
    #[serde(default = "default_auto_dismiss_secs")]
    pub auto_dismiss_secs: u64,
}

fn default_lead_min() -> u64 {
    30
}
fn default_tick_secs() -> u64 {
    60
}
fn default_auto_dismiss_secs() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            driving_lead_min: default_lead_min(),
            mandatory_break_lead_min: default_lead_min(),
            daily_rest_lead_min: default_lead_min(),
            tick_interval_secs: default_tick_secs(),
            auto_dismiss_secs: default_auto_dismiss_secs(),
        }
    }
}

impl AlertsConfig {
    pub fn lead_times(&self) -> LeadTimes {
        LeadTimes {
            driving_ms: self.driving_lead_min.saturating_mul(60_000),
            mandatory_break_ms: self.mandatory_break_lead_min.saturating_mul(60_000),
            daily_rest_ms: self.daily_rest_lead_min.saturating_mul(60_000),
        }
    }

    pub fn auto_dismiss_ms(&self) -> u64 {
        self.auto_dismiss_secs.saturating_mul(1000)
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/roadtime/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: ComplianceRules,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub safety: SafetyLimits,
    /// Recover `set_activity` with no open session by opening one.
    #[serde(default = "default_true")]
    pub auto_start_session: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules: ComplianceRules::default(),
            alerts: AlertsConfig::default(),
            safety: SafetyLimits::default(),
            auto_start_session: true,
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/roadtime"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Load from disk, returning the default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.rules, cfg.rules);
        assert_eq!(parsed.alerts.tick_interval_secs, 60);
        assert!(parsed.auto_start_session);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.rules.max_driving_min, 540);
        assert_eq!(cfg.alerts.driving_lead_min, 30);
        assert_eq!(cfg.safety.max_speed_kph, 90.0);
    }

    #[test]
    fn partial_section_fills_defaults() {
        let cfg: Config = toml::from_str(
            "auto_start_session = false\n\n[alerts]\nmandatory_break_lead_min = 20\n",
        )
        .unwrap();
        assert!(!cfg.auto_start_session);
        assert_eq!(cfg.alerts.mandatory_break_lead_min, 20);
        assert_eq!(cfg.alerts.driving_lead_min, 30);
    }

    #[test]
    fn lead_times_convert_to_ms() {
        let lead = AlertsConfig::default().lead_times();
        assert_eq!(lead.driving_ms, 30 * 60 * 1000);
        assert_eq!(lead.mandatory_break_ms, 30 * 60 * 1000);
    }
}
