//! Transactional facade over the session manager, compliance engine and
//! alert scheduler.
//!
//! Every public operation is one "mutate ledger, then re-project" step.
//! The async service layer serializes all calls (commands, timer firings,
//! periodic tick) behind a single lock, so arming decisions never read
//! totals that a concurrent transition could invalidate mid-computation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::{
    Alert, AlertCenter, AlertScheduler, ArmedTimer, EpisodeRefs, NotificationSink, SignalFeed,
};
use crate::clock::Clock;
use crate::compliance::{ComplianceEngine, ComplianceReport, ComplianceRules, RuleKind};
use crate::error::{Result, SessionError};
use crate::events::Event;
use crate::session::{
    ActivityCategory, DailyTotals, Session, SessionManager, SessionPhase,
};
use crate::storage::store::session_key;
use crate::storage::{Config, PersistenceStore, RULES_KEY};

/// Finalized session plus its last totals and compliance verdict, handed to
/// persistence and returned to the caller at program end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: Session,
    pub totals: DailyTotals,
    pub report: ComplianceReport,
}

/// The live tracking core. Not thread-safe by itself; wrap it in
/// [`crate::service::TrackerService`] (or your own lock) for concurrent
/// drivers.
pub struct Tracker {
    manager: SessionManager,
    engine: ComplianceEngine,
    scheduler: AlertScheduler,
    clock: Arc<dyn Clock>,
    store: Arc<dyn PersistenceStore>,
    feed: Option<Arc<dyn SignalFeed>>,
    events: Vec<Event>,
}

impl Tracker {
    pub fn new(
        config: &Config,
        clock: Arc<dyn Clock>,
        store: Arc<dyn PersistenceStore>,
        sink: Arc<dyn NotificationSink>,
        feed: Option<Arc<dyn SignalFeed>>,
    ) -> Self {
        let center = AlertCenter::new(sink, config.alerts.auto_dismiss_ms());
        Self {
            manager: SessionManager::new(config.auto_start_session),
            engine: ComplianceEngine::new(config.rules.clone()),
            scheduler: AlertScheduler::new(config.alerts.lead_times(), config.safety, center),
            clock,
            store,
            feed,
            events: Vec::new(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Open a fresh work program. Re-reads the rule override from the
    /// store first; rules stay fixed until the session ends.
    pub fn start_program(&mut self) -> Result<String> {
        let now = self.clock.now();
        let id = self.manager.start_program(now)?;
        self.reload_rules();
        self.events.push(Event::ProgramStarted {
            session_id: id.clone(),
            auto_started: false,
            at: now,
        });
        self.reproject(now);
        Ok(id)
    }

    /// Switch the current activity, closing the previous one.
    pub fn set_activity(&mut self, category: ActivityCategory) -> Result<()> {
        let now = self.clock.now();
        let transition = self.manager.set_activity(category, now)?;
        if transition.auto_started {
            self.reload_rules();
            self.events.push(Event::ProgramStarted {
                session_id: transition.session_id.clone(),
                auto_started: true,
                at: now,
            });
        }
        self.events.push(Event::ActivityChanged {
            session_id: transition.session_id,
            category,
            previous: transition.closed.as_ref().map(|a| a.category),
            at: now,
        });
        self.reproject(now);
        Ok(())
    }

    /// Boundary variant taking a raw category string; unknown categories
    /// are rejected before any state changes.
    pub fn set_activity_named(&mut self, category: &str) -> Result<()> {
        let category = category.parse::<ActivityCategory>()?;
        self.set_activity(category)
    }

    /// Close the program: finalize the session, snapshot totals and the
    /// compliance verdict, tear down all timers and alerts, and hand the
    /// summary to persistence.
    pub fn end_program(&mut self) -> Result<SessionSummary> {
        let now = self.clock.now();
        let totals = self
            .manager
            .totals(now)
            .ok_or(SessionError::NoSession)?;
        let break_reference = self
            .manager
            .open_session()
            .map(|open| open.ledger.break_reference())
            .ok_or(SessionError::NoSession)?;
        let report = self.engine.evaluate(&totals, break_reference, now);
        let session = self.manager.end_program(now)?;

        let cleared = self.scheduler.clear_all(now);
        self.events.extend(cleared);
        self.events.push(Event::ProgramEnded {
            session_id: session.id.clone(),
            total_ms: session.total_ms,
            at: now,
        });

        let summary = SessionSummary {
            session,
            totals,
            report,
        };
        // Persistence is fire-and-forget: a storage failure must never
        // invalidate the in-memory state machine.
        match serde_json::to_string(&summary) {
            Ok(json) => {
                if let Err(err) = self.store.put(&session_key(&summary.session.id), &json) {
                    log::warn!("failed to persist session {}: {err}", summary.session.id);
                }
            }
            Err(err) => log::warn!("failed to serialize session summary: {err}"),
        }
        Ok(summary)
    }

    /// Periodic re-evaluation (default every 60 s): purges expired alerts,
    /// re-projects, fires overdue timers, runs safety checks, and emits a
    /// totals snapshot. No-op without an open session.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let Some((refs, report)) = self.refs_and_report(now) else {
            return;
        };
        let signals = self.feed.as_ref().map(|feed| feed.snapshot());
        let events = self
            .scheduler
            .on_periodic_tick(&refs, &report, signals.as_ref(), now);
        self.events.extend(events);

        if let Some(totals) = self.manager.totals(now) {
            self.events.push(Event::TotalsSnapshot {
                session_id: refs.session_id,
                totals,
                at: now,
            });
        }
    }

    /// Resolve a runtime timer firing. Stale generations are inert.
    pub fn timer_fired(&mut self, rule: RuleKind, generation: u64) {
        let now = self.clock.now();
        let Some((refs, report)) = self.refs_and_report(now) else {
            return;
        };
        let events = self
            .scheduler
            .on_timer_fire(rule, generation, &refs, &report, now);
        self.events.extend(events);
    }

    /// Operator dismissed an alert.
    pub fn dismiss_alert(&mut self, key: &str) {
        let now = self.clock.now();
        if let Some(event) = self.scheduler.dismiss(key, now) {
            self.events.push(event);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.manager.phase()
    }

    pub fn totals(&self) -> Option<DailyTotals> {
        self.manager.totals(self.clock.now())
    }

    pub fn report(&self) -> Option<ComplianceReport> {
        self.refs_and_report(self.clock.now()).map(|(_, r)| r)
    }

    pub fn rules(&self) -> &ComplianceRules {
        self.engine.rules()
    }

    pub fn armed_timers(&self) -> Vec<ArmedTimer> {
        self.scheduler.armed_timers()
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.scheduler.center().active().cloned().collect()
    }

    /// Drain accumulated events in order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn refs_and_report(&self, now: DateTime<Utc>) -> Option<(EpisodeRefs, ComplianceReport)> {
        let open = self.manager.open_session()?;
        let refs = EpisodeRefs {
            session_id: open.id.clone(),
            session_started_at: open.started_at(),
            break_reference: open.ledger.break_reference(),
        };
        let totals = open.ledger.totals(now);
        let report = self.engine.evaluate(&totals, refs.break_reference, now);
        Some((refs, report))
    }

    fn reproject(&mut self, now: DateTime<Utc>) {
        if let Some((refs, report)) = self.refs_and_report(now) {
            let events = self.scheduler.on_topology_change(&refs, &report, now);
            self.events.extend(events);
        }
    }

    fn reload_rules(&mut self) {
        match self.store.get(RULES_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<ComplianceRules>(&json) {
                Ok(rules) => self.engine = ComplianceEngine::new(rules),
                Err(err) => log::warn!("ignoring malformed rules override: {err}"),
            },
            Ok(None) => {}
            Err(err) => log::warn!("failed to read rules override: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::NullSink;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    fn tracker_with(store: Arc<MemoryStore>) -> (Tracker, ManualClock) {
        let clock = ManualClock::new(t0());
        let tracker = Tracker::new(
            &Config::default(),
            Arc::new(clock.clone()),
            store,
            Arc::new(NullSink),
            None,
        );
        (tracker, clock)
    }

    fn tracker() -> (Tracker, ManualClock) {
        tracker_with(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn start_program_arms_timers_and_emits_event() {
        let (mut tracker, _clock) = tracker();
        tracker.start_program().unwrap();

        assert_eq!(tracker.armed_timers().len(), 3);
        let events = tracker.drain_events();
        assert!(matches!(events[0], Event::ProgramStarted { auto_started: false, .. }));
    }

    #[test]
    fn set_activity_auto_starts_session() {
        let (mut tracker, _clock) = tracker();
        tracker.set_activity(ActivityCategory::Driving).unwrap();

        assert_eq!(tracker.phase(), SessionPhase::Open);
        let events = tracker.drain_events();
        assert!(matches!(events[0], Event::ProgramStarted { auto_started: true, .. }));
        assert!(matches!(events[1], Event::ActivityChanged { previous: None, .. }));
    }

    #[test]
    fn unknown_category_is_rejected_at_boundary() {
        let (mut tracker, _clock) = tracker();
        let err = tracker.set_activity_named("nap").unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Session(SessionError::UnknownCategory(_))
        ));
        assert_eq!(tracker.phase(), SessionPhase::NoSession);
    }

    #[test]
    fn rules_override_loaded_at_program_start() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(RULES_KEY, r#"{"max_driving_min": 480}"#)
            .unwrap();
        let (mut tracker, _clock) = tracker_with(store);

        tracker.start_program().unwrap();
        assert_eq!(tracker.rules().max_driving_min, 480);
        // Unspecified fields fall back to defaults.
        assert_eq!(tracker.rules().mandatory_break_after_min, 270);
    }

    #[test]
    fn end_program_persists_summary() {
        let store = Arc::new(MemoryStore::new());
        let (mut tracker, clock) = tracker_with(store.clone());

        tracker.start_program().unwrap();
        tracker.set_activity(ActivityCategory::Driving).unwrap();
        clock.advance_mins(120);
        let summary = tracker.end_program().unwrap();

        assert_eq!(summary.totals.driving_ms, 2 * 60 * 60 * 1000);
        assert!(summary.report.is_compliant());
        assert_eq!(tracker.phase(), SessionPhase::Closed);
        assert!(tracker.armed_timers().is_empty());

        let stored = store
            .get(&session_key(&summary.session.id))
            .unwrap()
            .expect("summary persisted");
        let parsed: SessionSummary = serde_json::from_str(&stored).unwrap();
        assert_eq!(parsed.session.id, summary.session.id);
        assert_eq!(parsed.totals, summary.totals);
    }

    #[test]
    fn end_program_without_session_fails() {
        let (mut tracker, _clock) = tracker();
        let err = tracker.end_program().unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Session(SessionError::NoSession)
        ));
    }

    #[test]
    fn timer_firing_with_current_generation_raises_alert() {
        let (mut tracker, clock) = tracker();
        tracker.start_program().unwrap();
        tracker.set_activity(ActivityCategory::Driving).unwrap();
        tracker.drain_events();

        let timer = tracker
            .armed_timers()
            .into_iter()
            .find(|t| t.rule == RuleKind::MandatoryBreak)
            .unwrap();
        clock.set(timer.fire_at);
        tracker.timer_fired(RuleKind::MandatoryBreak, timer.generation);

        let events = tracker.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::AlertRaised { .. })));
        assert_eq!(tracker.active_alerts().len(), 1);
    }

    #[test]
    fn tick_emits_totals_snapshot() {
        let (mut tracker, clock) = tracker();
        tracker.start_program().unwrap();
        tracker.set_activity(ActivityCategory::Work).unwrap();
        tracker.drain_events();

        clock.advance_mins(5);
        tracker.tick();
        let events = tracker.drain_events();
        let snapshot = events
            .iter()
            .find_map(|e| match e {
                Event::TotalsSnapshot { totals, .. } => Some(*totals),
                _ => None,
            })
            .expect("snapshot emitted");
        assert_eq!(snapshot.work_ms, 5 * 60 * 1000);
    }

    #[test]
    fn tick_without_session_is_noop() {
        let (mut tracker, _clock) = tracker();
        tracker.tick();
        assert!(tracker.drain_events().is_empty());
    }
}
