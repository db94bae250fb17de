mod engine;
mod rules;

pub use engine::{
    ComplianceEngine, ComplianceReport, Finding, RuleCheck, RuleKind, Severity,
    DAILY_REST_TRIGGER_MIN,
};
pub use rules::ComplianceRules;
