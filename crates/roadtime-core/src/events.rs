use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compliance::{RuleKind, Severity};
use crate::session::{ActivityCategory, DailyTotals};

/// Every state change in the system produces an Event.
/// Callers drain them after each operation; integrations subscribe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ProgramStarted {
        session_id: String,
        /// True when the session was opened by the auto-start recovery path.
        auto_started: bool,
        at: DateTime<Utc>,
    },
    ActivityChanged {
        session_id: String,
        category: ActivityCategory,
        previous: Option<ActivityCategory>,
        at: DateTime<Utc>,
    },
    ProgramEnded {
        session_id: String,
        total_ms: u64,
        at: DateTime<Utc>,
    },
    TimerArmed {
        rule: RuleKind,
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TimerCancelled {
        rule: RuleKind,
        at: DateTime<Utc>,
    },
    AlertRaised {
        key: String,
        severity: Severity,
        message: String,
        at: DateTime<Utc>,
    },
    AlertDismissed {
        key: String,
        at: DateTime<Utc>,
    },
    TotalsSnapshot {
        session_id: String,
        totals: DailyTotals,
        at: DateTime<Utc>,
    },
}
