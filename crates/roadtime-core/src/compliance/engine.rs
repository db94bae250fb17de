//! Pure compliance evaluation.
//!
//! The engine is stateless: every check is a function of the current
//! totals, the break reference instant, the configured rules, and `now`.
//! All three checks run on every evaluation; one violation never
//! short-circuits the others.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rules::{min_to_ms, ComplianceRules};
use crate::session::{elapsed_ms, DailyTotals};

/// Program time after which a daily rest period is required.
///
/// A fixed trigger, deliberately independent of the configured
/// `daily_rest_period_min`, which names the required rest *length*.
pub const DAILY_REST_TRIGGER_MIN: u64 = 13 * 60;

/// The three regulatory thresholds tracked during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Driving,
    MandatoryBreak,
    DailyRest,
}

impl RuleKind {
    pub const ALL: [RuleKind; 3] = [RuleKind::Driving, RuleKind::MandatoryBreak, RuleKind::DailyRest];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Driving => "driving",
            RuleKind::MandatoryBreak => "mandatory-break",
            RuleKind::DailyRest => "daily-rest",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Violation,
}

/// A concrete threshold finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Finding {
    MaxDrivingExceeded,
    ApproachingMaxDriving,
    MandatoryBreakRequired,
    ApproachingMandatoryBreak,
    RestPeriodRequired,
}

impl Finding {
    pub fn severity(self) -> Severity {
        match self {
            Finding::MaxDrivingExceeded
            | Finding::MandatoryBreakRequired
            | Finding::RestPeriodRequired => Severity::Violation,
            Finding::ApproachingMaxDriving | Finding::ApproachingMandatoryBreak => {
                Severity::Warning
            }
        }
    }

    pub fn rule(self) -> RuleKind {
        match self {
            Finding::MaxDrivingExceeded | Finding::ApproachingMaxDriving => RuleKind::Driving,
            Finding::MandatoryBreakRequired | Finding::ApproachingMandatoryBreak => {
                RuleKind::MandatoryBreak
            }
            Finding::RestPeriodRequired => RuleKind::DailyRest,
        }
    }
}

/// Verdict for one rule: the finding (if any) and the time remaining until
/// the violation threshold, zero once crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub rule: RuleKind,
    pub finding: Option<Finding>,
    pub remaining_ms: u64,
}

impl RuleCheck {
    pub fn is_violation(&self) -> bool {
        matches!(self.finding, Some(f) if f.severity() == Severity::Violation)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.finding, Some(f) if f.severity() == Severity::Warning)
    }
}

/// Full compliance verdict at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub driving: RuleCheck,
    pub mandatory_break: RuleCheck,
    pub daily_rest: RuleCheck,
    /// True once program time has reached the daily-rest trigger.
    pub needs_rest: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl ComplianceReport {
    pub fn check(&self, rule: RuleKind) -> RuleCheck {
        match rule {
            RuleKind::Driving => self.driving,
            RuleKind::MandatoryBreak => self.mandatory_break,
            RuleKind::DailyRest => self.daily_rest,
        }
    }

    pub fn checks(&self) -> [RuleCheck; 3] {
        [self.driving, self.mandatory_break, self.daily_rest]
    }

    pub fn violations(&self) -> Vec<Finding> {
        self.checks()
            .iter()
            .filter_map(|c| c.finding)
            .filter(|f| f.severity() == Severity::Violation)
            .collect()
    }

    pub fn warnings(&self) -> Vec<Finding> {
        self.checks()
            .iter()
            .filter_map(|c| c.finding)
            .filter(|f| f.severity() == Severity::Warning)
            .collect()
    }

    pub fn is_compliant(&self) -> bool {
        self.violations().is_empty()
    }
}

/// Stateless evaluator over totals, break reference, and rules.
#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    rules: ComplianceRules,
}

impl ComplianceEngine {
    pub fn new(rules: ComplianceRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ComplianceRules {
        &self.rules
    }

    /// Daily driving time against `max_driving_min`.
    ///
    /// Violation at the limit; warning from 90% of it. The two are mutually
    /// exclusive per evaluation, violation takes precedence.
    pub fn check_driving(&self, totals: &DailyTotals) -> RuleCheck {
        let limit = self.rules.max_driving_ms();
        let warn_at = limit.saturating_mul(9) / 10;
        let driven = totals.driving_ms;

        let finding = if driven >= limit {
            Some(Finding::MaxDrivingExceeded)
        } else if driven >= warn_at {
            Some(Finding::ApproachingMaxDriving)
        } else {
            None
        };
        RuleCheck {
            rule: RuleKind::Driving,
            finding,
            remaining_ms: limit.saturating_sub(driven),
        }
    }

    /// Time since the break reference (last closed break, else session
    /// start) against `mandatory_break_after_min`. Warning from 80%.
    pub fn check_mandatory_break(
        &self,
        break_reference: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RuleCheck {
        let limit = self.rules.mandatory_break_after_ms();
        let warn_at = limit.saturating_mul(4) / 5;
        let since_reference = elapsed_ms(break_reference, now);

        let finding = if since_reference >= limit {
            Some(Finding::MandatoryBreakRequired)
        } else if since_reference >= warn_at {
            Some(Finding::ApproachingMandatoryBreak)
        } else {
            None
        };
        RuleCheck {
            rule: RuleKind::MandatoryBreak,
            finding,
            remaining_ms: limit.saturating_sub(since_reference),
        }
    }

    /// Total program time against the fixed daily-rest trigger.
    pub fn check_daily_rest(&self, totals: &DailyTotals) -> RuleCheck {
        let trigger = min_to_ms(DAILY_REST_TRIGGER_MIN);
        let finding = if totals.total_ms >= trigger {
            Some(Finding::RestPeriodRequired)
        } else {
            None
        };
        RuleCheck {
            rule: RuleKind::DailyRest,
            finding,
            remaining_ms: trigger.saturating_sub(totals.total_ms),
        }
    }

    /// Run all three checks. Never short-circuits.
    pub fn evaluate(
        &self,
        totals: &DailyTotals,
        break_reference: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ComplianceReport {
        let daily_rest = self.check_daily_rest(totals);
        ComplianceReport {
            driving: self.check_driving(totals),
            mandatory_break: self.check_mandatory_break(break_reference, now),
            needs_rest: daily_rest.finding.is_some(),
            daily_rest,
            evaluated_at: now,
        }
    }
}
