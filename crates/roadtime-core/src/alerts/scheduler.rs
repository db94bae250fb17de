//! Forward-looking alert scheduling.
//!
//! Translates compliance time-remaining projections into exactly-once,
//! lead-time-shifted notifications. One timer slot per rule kind, armed as
//! insert-or-replace and keyed by threshold-episode so re-projection is
//! idempotent. Cancellation is best-effort at the runtime layer; a
//! generation check at fire time makes superseded timers inert.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::center::{Alert, AlertCenter};
use super::safety::{self, SafetyLimits, SignalSnapshot};
use crate::compliance::{ComplianceReport, RuleCheck, RuleKind, Severity};
use crate::events::Event;

/// How far ahead of a violation threshold the lead warning fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTimes {
    pub driving_ms: u64,
    pub mandatory_break_ms: u64,
    pub daily_rest_ms: u64,
}

const DEFAULT_LEAD_MS: u64 = 30 * 60 * 1000;

impl Default for LeadTimes {
    fn default() -> Self {
        Self {
            driving_ms: DEFAULT_LEAD_MS,
            mandatory_break_ms: DEFAULT_LEAD_MS,
            daily_rest_ms: DEFAULT_LEAD_MS,
        }
    }
}

impl LeadTimes {
    pub fn for_rule(&self, rule: RuleKind) -> u64 {
        match rule {
            RuleKind::Driving => self.driving_ms,
            RuleKind::MandatoryBreak => self.mandatory_break_ms,
            RuleKind::DailyRest => self.daily_rest_ms,
        }
    }
}

/// Episode reference points for the current session, used to key timers
/// and alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRefs {
    pub session_id: String,
    pub session_started_at: DateTime<Utc>,
    /// End of the last closed break, else session start.
    pub break_reference: DateTime<Utc>,
}

impl EpisodeRefs {
    fn reference(&self, rule: RuleKind) -> DateTime<Utc> {
        match rule {
            RuleKind::Driving | RuleKind::DailyRest => self.session_started_at,
            RuleKind::MandatoryBreak => self.break_reference,
        }
    }
}

/// A pending lead-time warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedTimer {
    pub rule: RuleKind,
    /// Threshold-episode key; equal keys mean the same episode.
    pub key: String,
    pub reference: DateTime<Utc>,
    pub armed_at: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
    /// Monotonic arm counter; a fired timer must match to take effect.
    pub generation: u64,
}

/// Arms and resolves forward timers from compliance projections.
pub struct AlertScheduler {
    lead: LeadTimes,
    safety: SafetyLimits,
    center: AlertCenter,
    armed: HashMap<RuleKind, ArmedTimer>,
    next_generation: u64,
}

impl AlertScheduler {
    pub fn new(lead: LeadTimes, safety: SafetyLimits, center: AlertCenter) -> Self {
        Self {
            lead,
            safety,
            center,
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Armed timers sorted by rule, for runtime reconciliation and tests.
    pub fn armed_timers(&self) -> Vec<ArmedTimer> {
        let mut timers: Vec<ArmedTimer> = self.armed.values().cloned().collect();
        timers.sort_by_key(|t| t.rule);
        timers
    }

    pub fn center(&self) -> &AlertCenter {
        &self.center
    }

    /// Dismiss one alert key on operator action.
    pub fn dismiss(&mut self, key: &str, now: DateTime<Utc>) -> Option<Event> {
        self.center.dismiss(key).then(|| Event::AlertDismissed {
            key: key.to_string(),
            at: now,
        })
    }

    /// Recompute all projections after a session topology change.
    ///
    /// Idempotent: with no intervening mutation the armed set is unchanged.
    pub fn on_topology_change(
        &mut self,
        refs: &EpisodeRefs,
        report: &ComplianceReport,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for check in report.checks() {
            self.project(refs, &check, now, &mut events);
        }
        events
    }

    /// Resolve a fired timer. The report must be freshly evaluated: state
    /// may have progressed (or a break started) since arming.
    pub fn on_timer_fire(
        &mut self,
        rule: RuleKind,
        generation: u64,
        refs: &EpisodeRefs,
        report: &ComplianceReport,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        match self.armed.get(&rule) {
            Some(timer) if timer.generation == generation => {}
            // Superseded or cancelled timer firing late.
            _ => return Vec::new(),
        }
        self.armed.remove(&rule);

        let mut events = Vec::new();
        let check = report.check(rule);
        let lead = self.lead.for_rule(rule);
        if check.remaining_ms == 0 {
            self.raise(violation_alert(rule, refs, now), &mut events);
        } else if check.remaining_ms <= lead {
            self.raise(warning_alert(rule, &check, refs, now), &mut events);
        } else {
            // Projection moved past the lead window, e.g. a break reset
            // the mandatory-break clock between arming and firing.
            log::debug!("suppressing stale lead-time alert for {rule}");
        }
        events
    }

    /// Periodic re-evaluation: purge expired alerts, re-project, fire
    /// overdue timers (backstop for missed or drifted runtime timers), and
    /// run the safety checks.
    pub fn on_periodic_tick(
        &mut self,
        refs: &EpisodeRefs,
        report: &ComplianceReport,
        signals: Option<&SignalSnapshot>,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for key in self.center.purge_expired(now) {
            events.push(Event::AlertDismissed { key, at: now });
        }

        for check in report.checks() {
            self.project(refs, &check, now, &mut events);
        }

        let due: Vec<(RuleKind, u64)> = self
            .armed
            .values()
            .filter(|t| t.fire_at <= now)
            .map(|t| (t.rule, t.generation))
            .collect();
        for (rule, generation) in due {
            events.extend(self.on_timer_fire(rule, generation, refs, report, now));
        }

        if let Some(signals) = signals {
            for alert in safety::evaluate(signals, &self.safety, now) {
                self.raise(alert, &mut events);
            }
        }
        events
    }

    /// Cancel all armed timers and dismiss all alerts (session end).
    pub fn clear_all(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        let mut rules: Vec<RuleKind> = self.armed.keys().copied().collect();
        rules.sort();
        for rule in rules {
            self.armed.remove(&rule);
            events.push(Event::TimerCancelled { rule, at: now });
        }
        for key in self.center.dismiss_all() {
            events.push(Event::AlertDismissed { key, at: now });
        }
        events
    }

    fn project(
        &mut self,
        refs: &EpisodeRefs,
        check: &RuleCheck,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) {
        let rule = check.rule;
        if check.remaining_ms == 0 {
            // Already past the threshold: no forward timer, raise now.
            if self.armed.remove(&rule).is_some() {
                events.push(Event::TimerCancelled { rule, at: now });
            }
            self.raise(violation_alert(rule, refs, now), events);
            return;
        }

        let key = episode_key(rule, refs);
        if matches!(self.armed.get(&rule), Some(t) if t.key == key) {
            // Same episode already armed; fire_at is stable because the
            // threshold instant is.
            return;
        }
        if self.armed.remove(&rule).is_some() {
            // Reference point changed: the old projection is stale.
            events.push(Event::TimerCancelled { rule, at: now });
        }

        let lead = self.lead.for_rule(rule);
        let delay_ms = check.remaining_ms.saturating_sub(lead);
        let fire_at = now + Duration::milliseconds(delay_ms as i64);
        self.next_generation += 1;
        self.armed.insert(
            rule,
            ArmedTimer {
                rule,
                key,
                reference: refs.reference(rule),
                armed_at: now,
                fire_at,
                generation: self.next_generation,
            },
        );
        events.push(Event::TimerArmed {
            rule,
            fire_at,
            at: now,
        });
    }

    fn raise(&mut self, alert: Alert, events: &mut Vec<Event>) {
        let (key, severity, message, at) = (
            alert.key.clone(),
            alert.severity,
            alert.message.clone(),
            alert.raised_at,
        );
        if self.center.show(alert) {
            events.push(Event::AlertRaised {
                key,
                severity,
                message,
                at,
            });
        }
    }
}

fn episode_key(rule: RuleKind, refs: &EpisodeRefs) -> String {
    format!(
        "{}:{}:{}",
        rule.as_str(),
        refs.session_id,
        refs.reference(rule).timestamp_millis()
    )
}

fn violation_alert(rule: RuleKind, refs: &EpisodeRefs, now: DateTime<Utc>) -> Alert {
    let message = match rule {
        RuleKind::Driving => "Maximum daily driving time exceeded. Stop driving and rest.",
        RuleKind::MandatoryBreak => "Mandatory break is overdue. Stop for a break now.",
        RuleKind::DailyRest => "Daily rest period is required. End the work program.",
    };
    Alert {
        key: format!("{}:violation", episode_key(rule, refs)),
        severity: Severity::Violation,
        message: message.to_string(),
        persistent: true,
        urgent: true,
        raised_at: now,
    }
}

fn warning_alert(
    rule: RuleKind,
    check: &RuleCheck,
    refs: &EpisodeRefs,
    now: DateTime<Utc>,
) -> Alert {
    let mins = check.remaining_ms / 60_000;
    let message = match rule {
        RuleKind::Driving => format!("Driving time limit in {mins} min. Plan a stop."),
        RuleKind::MandatoryBreak => format!("Mandatory break due in {mins} min."),
        RuleKind::DailyRest => format!("Daily rest required in {mins} min."),
    };
    Alert {
        key: format!("{}:warning", episode_key(rule, refs)),
        severity: Severity::Warning,
        message,
        persistent: false,
        urgent: false,
        raised_at: now,
    }
}
