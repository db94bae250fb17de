use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Category of driver activity within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Driving,
    Break,
    Work,
    Other,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 4] = [
        ActivityCategory::Driving,
        ActivityCategory::Break,
        ActivityCategory::Work,
        ActivityCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityCategory::Driving => "driving",
            ActivityCategory::Break => "break",
            ActivityCategory::Work => "work",
            ActivityCategory::Other => "other",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityCategory {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driving" => Ok(ActivityCategory::Driving),
            "break" => Ok(ActivityCategory::Break),
            "work" => Ok(ActivityCategory::Work),
            "other" => Ok(ActivityCategory::Other),
            other => Err(SessionError::UnknownCategory(other.to_string())),
        }
    }
}

/// Non-negative span between two instants in milliseconds.
///
/// Clamps to zero when `to` precedes `from`, so a backward clock step can
/// never produce a negative duration.
pub(crate) fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

/// A categorized, time-bounded span of driver behavior.
///
/// `ended_at` is `None` while the activity is in progress; `duration_ms` is
/// only meaningful once closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub category: ActivityCategory,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl Activity {
    /// Open a new activity at `at`.
    pub fn open(category: ActivityCategory, at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            started_at: at,
            ended_at: None,
            duration_ms: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Close the activity at `at`. Zero-duration activities are permitted.
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.duration_ms = elapsed_ms(self.started_at, at);
        self.ended_at = Some(at);
    }

    /// Elapsed time projected to `now` for an open activity, or the closed
    /// duration.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.ended_at {
            Some(_) => self.duration_ms,
            None => elapsed_ms(self.started_at, now),
        }
    }
}

/// One continuous work program from start to end.
///
/// Finalized by `SessionManager::end_program`; immutable afterwards and
/// handed to the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub activities: Vec<Activity>,
    pub total_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    #[test]
    fn category_parses_known_values() {
        for cat in ActivityCategory::ALL {
            assert_eq!(cat.as_str().parse::<ActivityCategory>().unwrap(), cat);
        }
        assert_eq!("  Driving ".parse::<ActivityCategory>().unwrap(), ActivityCategory::Driving);
    }

    #[test]
    fn category_rejects_unknown_values() {
        let err = "nap".parse::<ActivityCategory>().unwrap_err();
        assert_eq!(err, SessionError::UnknownCategory("nap".to_string()));
    }

    #[test]
    fn close_computes_duration() {
        let mut act = Activity::open(ActivityCategory::Driving, t0());
        act.close(t0() + Duration::minutes(90));
        assert_eq!(act.duration_ms, 90 * 60 * 1000);
        assert!(!act.is_open());
    }

    #[test]
    fn zero_duration_activity_is_permitted() {
        let mut act = Activity::open(ActivityCategory::Work, t0());
        act.close(t0());
        assert_eq!(act.duration_ms, 0);
        assert_eq!(act.ended_at, Some(t0()));
    }

    #[test]
    fn backward_clock_clamps_to_zero() {
        let mut act = Activity::open(ActivityCategory::Driving, t0());
        act.close(t0() - Duration::seconds(5));
        assert_eq!(act.duration_ms, 0);
    }

    #[test]
    fn open_activity_projects_to_now() {
        let act = Activity::open(ActivityCategory::Driving, t0());
        assert_eq!(act.elapsed_ms(t0() + Duration::minutes(10)), 10 * 60 * 1000);
    }
}
