//! Threshold rule engine: readings in, deduplicated alerts out.

pub mod cooldown;
pub mod policy;
pub mod rules;
pub mod service;

pub use cooldown::CooldownState;
pub use policy::{FirstCriticalWins, SelectionPolicy};
pub use rules::{AlertCandidate, Rule};
pub use service::{
    Clock, Evaluation, MonitorError, MonitorSettings, SuppressReason, SystemClock,
    ThresholdMonitor,
};
