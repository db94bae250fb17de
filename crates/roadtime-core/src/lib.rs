//! # Roadtime Core Library
//!
//! This library provides the core business logic for Roadtime, a
//! driving-time compliance tracker for vehicle operators. It records work
//! activities across a session and evaluates regulatory driving-time and
//! rest-time rules in real time, emitting advance warnings before a
//! threshold is breached. UI, notification presentation and location
//! acquisition are external collaborators behind narrow traits.
//!
//! ## Architecture
//!
//! - **Session**: activity ledger and session lifecycle -- a wall-clock
//!   state machine where per-category totals project the open activity
//!   to "now"
//! - **Compliance**: pure, stateless threshold evaluation over totals and
//!   the configured rule profile
//! - **Alerts**: forward timers armed a lead time ahead of each projected
//!   violation, with at-most-once delivery per threshold-episode
//! - **Service**: tokio driver supplying the periodic tick and timer
//!   callbacks, serialized behind one lock
//! - **Storage**: TOML configuration and a key-value store touched only at
//!   session boundaries
//!
//! ## Key Components
//!
//! - [`Tracker`]: transactional facade over the whole core
//! - [`SessionManager`] / [`ActivityLedger`]: session and activity state
//! - [`ComplianceEngine`]: rule checks and time-remaining projections
//! - [`AlertScheduler`]: timer arming, cancellation and alert delivery
//! - [`TrackerService`]: async runtime wrapper

pub mod alerts;
pub mod clock;
pub mod compliance;
pub mod error;
pub mod events;
pub mod service;
pub mod session;
pub mod storage;
pub mod tracker;

pub use alerts::{
    Alert, AlertCenter, AlertScheduler, ArmedTimer, EpisodeRefs, LeadTimes, NotificationSink,
    NullSink, SafetyLimits, SignalFeed, SignalSnapshot, WeatherCondition,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compliance::{
    ComplianceEngine, ComplianceReport, ComplianceRules, Finding, RuleCheck, RuleKind, Severity,
};
pub use error::{ConfigError, CoreError, Result, SessionError, StorageError};
pub use events::Event;
pub use service::TrackerService;
pub use session::{
    Activity, ActivityCategory, ActivityLedger, DailyTotals, Session, SessionManager, SessionPhase,
};
pub use storage::{Config, MemoryStore, PersistenceStore, SqliteStore};
pub use tracker::{SessionSummary, Tracker};
