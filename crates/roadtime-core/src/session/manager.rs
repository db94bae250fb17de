//! Session lifecycle state machine.
//!
//! ```text
//! NoSession -> SessionOpen -> SessionClosed
//! ```
//!
//! `SessionClosed` keeps the finalized session for handoff; a new
//! `start_program` call returns to `SessionOpen` with a fresh session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::{elapsed_ms, Activity, ActivityCategory, Session};
use super::ledger::{ActivityLedger, DailyTotals};
use crate::error::SessionError;

/// Lifecycle phase, exposed for callers that only need the shape of the
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    NoSession,
    Open,
    Closed,
}

/// An in-progress session: id plus its activity ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSession {
    pub id: String,
    pub ledger: ActivityLedger,
}

impl OpenSession {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.ledger.started_at()
    }
}

/// Outcome of a `set_activity` transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub session_id: String,
    pub category: ActivityCategory,
    /// The activity implicitly closed by this transition, if any.
    pub closed: Option<Activity>,
    /// True when the transition auto-opened a session first.
    pub auto_started: bool,
}

#[derive(Debug, Clone)]
enum SessionState {
    NoSession,
    Open(OpenSession),
    Closed(Session),
}

/// Owns session and activity lifecycle; delegates totals to the ledger.
#[derive(Debug, Clone)]
pub struct SessionManager {
    state: SessionState,
    auto_start: bool,
}

impl SessionManager {
    /// `auto_start` enables the recovery path where `set_activity` with no
    /// open session opens one instead of failing.
    pub fn new(auto_start: bool) -> Self {
        Self {
            state: SessionState::NoSession,
            auto_start,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::NoSession => SessionPhase::NoSession,
            SessionState::Open(_) => SessionPhase::Open,
            SessionState::Closed(_) => SessionPhase::Closed,
        }
    }

    pub fn open_session(&self) -> Option<&OpenSession> {
        match self.state {
            SessionState::Open(ref open) => Some(open),
            _ => None,
        }
    }

    /// The finalized session, available while in `Closed`.
    pub fn last_session(&self) -> Option<&Session> {
        match self.state {
            SessionState::Closed(ref session) => Some(session),
            _ => None,
        }
    }

    /// Open a fresh session at `at` and return its id.
    pub fn start_program(&mut self, at: DateTime<Utc>) -> Result<String, SessionError> {
        if matches!(self.state, SessionState::Open(_)) {
            return Err(SessionError::AlreadyOpen);
        }
        let open = OpenSession {
            id: uuid::Uuid::new_v4().to_string(),
            ledger: ActivityLedger::new(at),
        };
        let id = open.id.clone();
        self.state = SessionState::Open(open);
        Ok(id)
    }

    /// Close the open session at `at`: closes any open activity, finalizes
    /// the total duration, and returns the immutable session.
    pub fn end_program(&mut self, at: DateTime<Utc>) -> Result<Session, SessionError> {
        let open = match std::mem::replace(&mut self.state, SessionState::NoSession) {
            SessionState::Open(open) => open,
            other => {
                self.state = other;
                return Err(SessionError::NoSession);
            }
        };

        let OpenSession { id, mut ledger } = open;
        let started_at = ledger.started_at();
        // No open activity is fine here.
        let _ = ledger.end_activity(at);

        let session = Session {
            id,
            started_at,
            ended_at: Some(at),
            activities: ledger.into_history(),
            total_ms: elapsed_ms(started_at, at),
        };
        self.state = SessionState::Closed(session.clone());
        Ok(session)
    }

    /// Switch the current activity, implicitly closing the previous one at
    /// `at`.
    ///
    /// With no open session this auto-opens one when recovery is enabled,
    /// otherwise surfaces `InvalidState`.
    pub fn set_activity(
        &mut self,
        category: ActivityCategory,
        at: DateTime<Utc>,
    ) -> Result<Transition, SessionError> {
        let mut auto_started = false;
        if self.open_session().is_none() {
            if !self.auto_start {
                return Err(SessionError::InvalidState(
                    "no open session for activity change".to_string(),
                ));
            }
            self.start_program(at)?;
            auto_started = true;
        }

        match self.state {
            SessionState::Open(ref mut open) => {
                let closed = open.ledger.start_activity(category, at);
                Ok(Transition {
                    session_id: open.id.clone(),
                    category,
                    closed,
                    auto_started,
                })
            }
            _ => Err(SessionError::InvalidState(
                "no open session for activity change".to_string(),
            )),
        }
    }

    /// Parse-and-set for callers holding a raw category string. Unknown
    /// categories are rejected here, before the ledger is touched.
    pub fn set_activity_named(
        &mut self,
        category: &str,
        at: DateTime<Utc>,
    ) -> Result<Transition, SessionError> {
        let category: ActivityCategory = category.parse()?;
        self.set_activity(category, at)
    }

    /// Totals for the open session projected to `now`.
    pub fn totals(&self, now: DateTime<Utc>) -> Option<DailyTotals> {
        self.open_session().map(|open| open.ledger.totals(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    #[test]
    fn start_twice_fails() {
        let mut mgr = SessionManager::new(false);
        mgr.start_program(t0()).unwrap();
        assert_eq!(mgr.start_program(t0()).unwrap_err(), SessionError::AlreadyOpen);
    }

    #[test]
    fn end_without_open_fails() {
        let mut mgr = SessionManager::new(false);
        assert_eq!(mgr.end_program(t0()).unwrap_err(), SessionError::NoSession);

        mgr.start_program(t0()).unwrap();
        mgr.end_program(t0() + Duration::hours(1)).unwrap();
        // Closed is terminal for this session.
        assert_eq!(mgr.end_program(t0()).unwrap_err(), SessionError::NoSession);
        assert_eq!(mgr.phase(), SessionPhase::Closed);
    }

    #[test]
    fn restart_after_close_opens_fresh_session() {
        let mut mgr = SessionManager::new(false);
        let first = mgr.start_program(t0()).unwrap();
        mgr.end_program(t0() + Duration::hours(1)).unwrap();

        let second = mgr.start_program(t0() + Duration::hours(12)).unwrap();
        assert_ne!(first, second);
        assert_eq!(mgr.phase(), SessionPhase::Open);
        assert_eq!(mgr.totals(t0() + Duration::hours(12)).unwrap(), DailyTotals::default());
    }

    #[test]
    fn set_activity_without_session_surfaces_invalid_state() {
        let mut mgr = SessionManager::new(false);
        let err = mgr.set_activity(ActivityCategory::Driving, t0()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));
    }

    #[test]
    fn set_activity_auto_opens_when_enabled() {
        let mut mgr = SessionManager::new(true);
        let transition = mgr.set_activity(ActivityCategory::Driving, t0()).unwrap();
        assert!(transition.auto_started);
        assert!(transition.closed.is_none());
        assert_eq!(mgr.phase(), SessionPhase::Open);
        assert_eq!(mgr.open_session().unwrap().started_at(), t0());
    }

    #[test]
    fn unknown_category_rejected_before_ledger() {
        let mut mgr = SessionManager::new(true);
        let err = mgr.set_activity_named("nap", t0()).unwrap_err();
        assert_eq!(err, SessionError::UnknownCategory("nap".to_string()));
        // Boundary rejection: nothing was opened.
        assert_eq!(mgr.phase(), SessionPhase::NoSession);
    }

    #[test]
    fn end_program_closes_open_activity() {
        let mut mgr = SessionManager::new(false);
        mgr.start_program(t0()).unwrap();
        mgr.set_activity(ActivityCategory::Driving, t0()).unwrap();

        let session = mgr.end_program(t0() + Duration::hours(2)).unwrap();
        assert_eq!(session.activities.len(), 1);
        assert_eq!(session.activities[0].duration_ms, 2 * 60 * 60 * 1000);
        assert_eq!(session.total_ms, 2 * 60 * 60 * 1000);
        assert_eq!(session.ended_at, Some(t0() + Duration::hours(2)));
    }

    #[test]
    fn empty_session_has_zero_totals() {
        let mut mgr = SessionManager::new(false);
        mgr.start_program(t0()).unwrap();
        let session = mgr.end_program(t0() + Duration::minutes(1)).unwrap();
        assert!(session.activities.is_empty());
        assert_eq!(session.total_ms, 60 * 1000);
    }
}
