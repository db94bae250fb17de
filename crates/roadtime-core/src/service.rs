//! Async driver for the tracker.
//!
//! Wraps a [`Tracker`] in a shared lock and supplies the two asynchronous
//! callbacks the core expects: a periodic tick and one sleep task per armed
//! timer. Every callback acquires the same lock as the commands, so at most
//! one projection computation proceeds at a time.
//!
//! Aborting a superseded sleep task is best-effort; a task that fires
//! anyway is made inert by the generation check in `Tracker::timer_fired`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

use crate::alerts::{Alert, ArmedTimer};
use crate::compliance::{ComplianceReport, RuleKind};
use crate::error::Result;
use crate::events::Event;
use crate::session::{ActivityCategory, DailyTotals, SessionPhase};
use crate::tracker::{SessionSummary, Tracker};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

struct SpawnedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Shared-state driver around the tracking core.
#[derive(Clone)]
pub struct TrackerService {
    tracker: Arc<Mutex<Tracker>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    timers: Arc<Mutex<HashMap<RuleKind, SpawnedTimer>>>,
    tick_interval: Duration,
}

impl TrackerService {
    pub fn new(tracker: Tracker, tick_interval: Duration) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            ticker: Arc::new(Mutex::new(None)),
            timers: Arc::new(Mutex::new(HashMap::new())),
            tick_interval,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn start_program(&self) -> Result<String> {
        let id = self.tracker.lock().await.start_program()?;
        self.ensure_ticker().await;
        self.reconcile_timers().await;
        Ok(id)
    }

    pub async fn set_activity(&self, category: ActivityCategory) -> Result<()> {
        self.tracker.lock().await.set_activity(category)?;
        self.ensure_ticker().await;
        self.reconcile_timers().await;
        Ok(())
    }

    pub async fn end_program(&self) -> Result<SessionSummary> {
        let summary = self.tracker.lock().await.end_program()?;
        self.cancel_ticker().await;
        // The armed set is empty now, so this aborts every sleep task.
        self.reconcile_timers().await;
        Ok(summary)
    }

    pub async fn dismiss_alert(&self, key: &str) {
        self.tracker.lock().await.dismiss_alert(key);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn phase(&self) -> SessionPhase {
        self.tracker.lock().await.phase()
    }

    pub async fn totals(&self) -> Option<DailyTotals> {
        self.tracker.lock().await.totals()
    }

    pub async fn report(&self) -> Option<ComplianceReport> {
        self.tracker.lock().await.report()
    }

    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.tracker.lock().await.active_alerts()
    }

    pub async fn armed_timers(&self) -> Vec<ArmedTimer> {
        self.tracker.lock().await.armed_timers()
    }

    pub async fn drain_events(&self) -> Vec<Event> {
        self.tracker.lock().await.drain_events()
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn ensure_ticker(&self) {
        let mut guard = self.ticker.lock().await;
        if guard.is_some() {
            return;
        }
        let service = self.clone();
        let interval_dur = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(interval_dur);
            // The first tick of a tokio interval completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                service.tracker.lock().await.tick();
                service.reconcile_timers().await;
            }
        });
        *guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    /// Align spawned sleep tasks with the scheduler's armed set.
    async fn reconcile_timers(&self) {
        let armed = self.tracker.lock().await.armed_timers();
        let mut timers = self.timers.lock().await;

        timers.retain(|rule, spawned| {
            let keep = armed
                .iter()
                .any(|t| t.rule == *rule && t.generation == spawned.generation);
            if !keep {
                spawned.handle.abort();
            }
            keep
        });

        for timer in armed {
            if timers.contains_key(&timer.rule) {
                continue;
            }
            let service = self.clone();
            let rule = timer.rule;
            let generation = timer.generation;
            let fire_at = timer.fire_at;
            let handle = tokio::spawn(async move {
                let delay_ms = (fire_at - Utc::now()).num_milliseconds().max(0) as u64;
                time::sleep(Duration::from_millis(delay_ms)).await;
                service.tracker.lock().await.timer_fired(rule, generation);
                let mut timers = service.timers.lock().await;
                if matches!(timers.get(&rule), Some(t) if t.generation == generation) {
                    timers.remove(&rule);
                }
            });
            timers.insert(
                timer.rule,
                SpawnedTimer {
                    generation,
                    handle,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::NullSink;
    use crate::clock::ManualClock;
    use crate::storage::{Config, MemoryStore};
    use chrono::TimeZone;

    fn service() -> (TrackerService, ManualClock) {
        // Far-future instant: spawned sleep tasks must not fire mid-test.
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2050, 3, 2, 6, 0, 0).unwrap());
        let tracker = Tracker::new(
            &Config::default(),
            Arc::new(clock.clone()),
            Arc::new(MemoryStore::new()),
            Arc::new(NullSink),
            None,
        );
        (TrackerService::new(tracker, DEFAULT_TICK_INTERVAL), clock)
    }

    #[tokio::test]
    async fn lifecycle_spawns_and_clears_timers() {
        let (service, _clock) = service();
        service.start_program().await.unwrap();
        assert_eq!(service.armed_timers().await.len(), 3);
        assert_eq!(service.timers.lock().await.len(), 3);

        service.end_program().await.unwrap();
        assert!(service.armed_timers().await.is_empty());
        assert!(service.timers.lock().await.is_empty());
        assert!(service.ticker.lock().await.is_none());
    }

    #[tokio::test]
    async fn set_activity_reconciles_after_auto_start() {
        let (service, _clock) = service();
        service.set_activity(ActivityCategory::Driving).await.unwrap();
        assert_eq!(service.phase().await, SessionPhase::Open);
        assert_eq!(service.timers.lock().await.len(), 3);
        service.end_program().await.unwrap();
    }

    #[tokio::test]
    async fn commands_are_serialized_under_one_lock() {
        let (service, _clock) = service();
        service.start_program().await.unwrap();

        let mut handles = Vec::new();
        for category in [
            ActivityCategory::Driving,
            ActivityCategory::Work,
            ActivityCategory::Other,
        ] {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.set_activity(category).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // All three transitions landed; exactly one activity open.
        let totals = service.totals().await.unwrap();
        assert_eq!(
            totals.driving_ms + totals.work_ms + totals.other_ms + totals.break_ms,
            totals.total_ms
        );
        service.end_program().await.unwrap();
    }
}
