//! Alert bookkeeping and delivery.
//!
//! The center is the single gate to the notification sink. Each alert has a
//! stable key; a key that has been shown is never presented again for the
//! same episode until it is explicitly cleared. Non-persistent alerts
//! auto-dismiss after a fixed delay but stay in the shown set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compliance::Severity;
use crate::session::elapsed_ms;

/// Delay after which a non-persistent alert auto-dismisses.
pub const DEFAULT_AUTO_DISMISS_MS: u64 = 5_000;

/// A single notification to present to the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Stable deduplication key for the threshold-episode.
    pub key: String,
    pub severity: Severity,
    pub message: String,
    /// Persistent alerts never auto-dismiss.
    pub persistent: bool,
    pub urgent: bool,
    pub raised_at: DateTime<Utc>,
}

/// Presentation collaborator. Fire-and-forget: the core never awaits or
/// retries, and failures must not disturb compliance tracking.
pub trait NotificationSink: Send + Sync {
    fn present(&self, alert: &Alert) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn present(&self, _alert: &Alert) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// At-most-once alert delivery keyed by threshold-episode.
pub struct AlertCenter {
    sink: Arc<dyn NotificationSink>,
    /// Alerts currently on screen.
    active: HashMap<String, Alert>,
    /// Keys presented at least once and not yet explicitly cleared.
    shown: HashSet<String>,
    auto_dismiss_ms: u64,
}

impl AlertCenter {
    pub fn new(sink: Arc<dyn NotificationSink>, auto_dismiss_ms: u64) -> Self {
        Self {
            sink,
            active: HashMap::new(),
            shown: HashSet::new(),
            auto_dismiss_ms,
        }
    }

    /// Present an alert unless its key was already shown. Returns whether
    /// the alert was actually delivered.
    pub fn show(&mut self, alert: Alert) -> bool {
        if self.shown.contains(&alert.key) {
            return false;
        }
        if let Err(err) = self.sink.present(&alert) {
            // Presentation failures never corrupt tracking state.
            log::warn!("notification sink failed for '{}': {err}", alert.key);
        }
        self.shown.insert(alert.key.clone());
        self.active.insert(alert.key.clone(), alert);
        true
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    pub fn active(&self) -> impl Iterator<Item = &Alert> {
        self.active.values()
    }

    /// Explicitly clear one key: the alert leaves the screen and may be
    /// shown again for a later episode.
    pub fn dismiss(&mut self, key: &str) -> bool {
        self.shown.remove(key);
        self.active.remove(key).is_some()
    }

    /// Clear everything (session end). Returns the keys that were active.
    pub fn dismiss_all(&mut self) -> Vec<String> {
        self.shown.clear();
        let keys: Vec<String> = self.active.keys().cloned().collect();
        self.active.clear();
        keys
    }

    /// Drop non-persistent alerts older than the auto-dismiss window. They
    /// stay in the shown set, so they do not re-fire for the same episode.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let window = self.auto_dismiss_ms;
        let expired: Vec<String> = self
            .active
            .iter()
            .filter(|(_, a)| !a.persistent && elapsed_ms(a.raised_at, now) >= window)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.active.remove(key);
        }
        expired
    }
}
