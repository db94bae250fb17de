//! Append-only record of activity intervals within a session.
//!
//! The ledger keeps closed activities in chronological order plus at most
//! one open activity. Starting a new activity closes the open one at the
//! new start time, so the intervals always form a contiguous,
//! non-overlapping partition of the session's elapsed time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::{elapsed_ms, Activity, ActivityCategory};
use crate::error::SessionError;

/// Per-category elapsed time, including the open activity projected to
/// "now". Derived on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub driving_ms: u64,
    pub break_ms: u64,
    pub work_ms: u64,
    pub other_ms: u64,
    /// Elapsed program time since the session opened.
    pub total_ms: u64,
}

impl DailyTotals {
    pub fn of(&self, category: ActivityCategory) -> u64 {
        match category {
            ActivityCategory::Driving => self.driving_ms,
            ActivityCategory::Break => self.break_ms,
            ActivityCategory::Work => self.work_ms,
            ActivityCategory::Other => self.other_ms,
        }
    }

    fn add(&mut self, category: ActivityCategory, ms: u64) {
        let slot = match category {
            ActivityCategory::Driving => &mut self.driving_ms,
            ActivityCategory::Break => &mut self.break_ms,
            ActivityCategory::Work => &mut self.work_ms,
            ActivityCategory::Other => &mut self.other_ms,
        };
        *slot = slot.saturating_add(ms);
    }
}

/// Activity intervals for one open session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLedger {
    started_at: DateTime<Utc>,
    closed: Vec<Activity>,
    current: Option<Activity>,
}

impl ActivityLedger {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            closed: Vec::new(),
            current: None,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn current(&self) -> Option<&Activity> {
        self.current.as_ref()
    }

    pub fn closed(&self) -> &[Activity] {
        &self.closed
    }

    /// Open a new activity of `category` at `at`, closing the previous open
    /// activity (if any) at the same instant. Returns the closed record.
    pub fn start_activity(
        &mut self,
        category: ActivityCategory,
        at: DateTime<Utc>,
    ) -> Option<Activity> {
        let previous = self.close_current(at);
        self.current = Some(Activity::open(category, at));
        previous
    }

    /// Close the open activity at `at` and return it.
    pub fn end_activity(&mut self, at: DateTime<Utc>) -> Result<Activity, SessionError> {
        self.close_current(at).ok_or(SessionError::NoActiveActivity)
    }

    /// Per-category totals with the open activity projected to `now`.
    ///
    /// Pure with respect to the ledger: safe to call at arbitrary frequency.
    pub fn totals(&self, now: DateTime<Utc>) -> DailyTotals {
        let mut totals = DailyTotals {
            total_ms: elapsed_ms(self.started_at, now),
            ..DailyTotals::default()
        };
        for act in &self.closed {
            totals.add(act.category, act.duration_ms);
        }
        if let Some(ref current) = self.current {
            totals.add(current.category, current.elapsed_ms(now));
        }
        totals
    }

    /// Most recent closed activity of `category`, if any.
    pub fn last_closed_of_category(&self, category: ActivityCategory) -> Option<&Activity> {
        self.closed.iter().rev().find(|a| a.category == category)
    }

    /// Reference instant for the mandatory-break clock.
    ///
    /// A break starting resets the clock, so an open break references its
    /// own start; otherwise the end of the most recent closed break, or the
    /// session start when no break has been taken yet.
    pub fn break_reference(&self) -> DateTime<Utc> {
        if let Some(ref current) = self.current {
            if current.category == ActivityCategory::Break {
                return current.started_at;
            }
        }
        self.last_closed_of_category(ActivityCategory::Break)
            .and_then(|a| a.ended_at)
            .unwrap_or(self.started_at)
    }

    /// Consume the ledger, yielding the closed history.
    pub fn into_history(self) -> Vec<Activity> {
        debug_assert!(self.current.is_none(), "open activity left in ledger");
        self.closed
    }

    fn close_current(&mut self, at: DateTime<Utc>) -> Option<Activity> {
        let mut previous = self.current.take()?;
        previous.close(at);
        self.closed.push(previous.clone());
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    fn min(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn start_closes_previous_at_new_start() {
        let mut ledger = ActivityLedger::new(t0());
        assert!(ledger.start_activity(ActivityCategory::Driving, t0()).is_none());

        let closed = ledger
            .start_activity(ActivityCategory::Break, t0() + min(60))
            .unwrap();
        assert_eq!(closed.category, ActivityCategory::Driving);
        assert_eq!(closed.ended_at, Some(t0() + min(60)));
        assert_eq!(closed.duration_ms, 60 * 60 * 1000);
        assert_eq!(ledger.current().unwrap().category, ActivityCategory::Break);
    }

    #[test]
    fn end_activity_without_open_signals() {
        let mut ledger = ActivityLedger::new(t0());
        assert_eq!(
            ledger.end_activity(t0()).unwrap_err(),
            SessionError::NoActiveActivity
        );
    }

    #[test]
    fn totals_project_open_activity() {
        let mut ledger = ActivityLedger::new(t0());
        ledger.start_activity(ActivityCategory::Driving, t0());
        ledger.start_activity(ActivityCategory::Work, t0() + min(30));

        let totals = ledger.totals(t0() + min(45));
        assert_eq!(totals.driving_ms, 30 * 60 * 1000);
        assert_eq!(totals.work_ms, 15 * 60 * 1000);
        assert_eq!(totals.total_ms, 45 * 60 * 1000);
    }

    #[test]
    fn totals_do_not_mutate() {
        let mut ledger = ActivityLedger::new(t0());
        ledger.start_activity(ActivityCategory::Driving, t0());

        let a = ledger.totals(t0() + min(10));
        let b = ledger.totals(t0() + min(10));
        assert_eq!(a, b);
        assert_eq!(ledger.closed().len(), 0);
    }

    #[test]
    fn totals_monotonic_as_now_advances() {
        let mut ledger = ActivityLedger::new(t0());
        ledger.start_activity(ActivityCategory::Driving, t0());
        ledger.start_activity(ActivityCategory::Break, t0() + min(10));

        let mut previous = ledger.totals(t0() + min(10));
        for m in 11..30 {
            let next = ledger.totals(t0() + min(m));
            for cat in ActivityCategory::ALL {
                assert!(next.of(cat) >= previous.of(cat));
            }
            assert!(next.total_ms >= previous.total_ms);
            previous = next;
        }
    }

    #[test]
    fn last_closed_of_category_finds_most_recent() {
        let mut ledger = ActivityLedger::new(t0());
        ledger.start_activity(ActivityCategory::Break, t0());
        ledger.start_activity(ActivityCategory::Driving, t0() + min(15));
        ledger.start_activity(ActivityCategory::Break, t0() + min(75));
        ledger.start_activity(ActivityCategory::Driving, t0() + min(90));

        let last_break = ledger
            .last_closed_of_category(ActivityCategory::Break)
            .unwrap();
        assert_eq!(last_break.started_at, t0() + min(75));
        assert!(ledger.last_closed_of_category(ActivityCategory::Work).is_none());
    }

    #[test]
    fn break_reference_defaults_to_session_start() {
        let mut ledger = ActivityLedger::new(t0());
        assert_eq!(ledger.break_reference(), t0());

        ledger.start_activity(ActivityCategory::Driving, t0());
        assert_eq!(ledger.break_reference(), t0());

        ledger.start_activity(ActivityCategory::Break, t0() + min(180));
        // An open break resets the clock to its own start.
        assert_eq!(ledger.break_reference(), t0() + min(180));

        ledger.start_activity(ActivityCategory::Driving, t0() + min(186));
        assert_eq!(ledger.break_reference(), t0() + min(186));
    }

    #[test]
    fn zero_duration_activity_contributes_zero() {
        let mut ledger = ActivityLedger::new(t0());
        ledger.start_activity(ActivityCategory::Work, t0());
        ledger.start_activity(ActivityCategory::Driving, t0());

        let totals = ledger.totals(t0());
        assert_eq!(totals.work_ms, 0);
        assert_eq!(ledger.closed().len(), 1);
    }

    #[test]
    fn closed_intervals_are_contiguous() {
        let mut ledger = ActivityLedger::new(t0());
        ledger.start_activity(ActivityCategory::Driving, t0());
        ledger.start_activity(ActivityCategory::Work, t0() + min(20));
        ledger.start_activity(ActivityCategory::Break, t0() + min(50));
        ledger.end_activity(t0() + min(60)).unwrap();

        let closed = ledger.closed();
        assert_eq!(closed[0].started_at, t0());
        for pair in closed.windows(2) {
            assert_eq!(pair[0].ended_at, Some(pair[1].started_at));
        }
        assert_eq!(closed.last().unwrap().ended_at, Some(t0() + min(60)));
    }
}
