mod center;
mod safety;
mod scheduler;

pub use center::{Alert, AlertCenter, NotificationSink, NullSink, DEFAULT_AUTO_DISMISS_MS};
pub use safety::{
    SafetyLimits, SignalFeed, SignalSnapshot, WeatherCondition, FUEL_ALERT_KEY, SPEED_ALERT_KEY,
    WEATHER_ALERT_KEY,
};
pub use scheduler::{AlertScheduler, ArmedTimer, EpisodeRefs, LeadTimes};
