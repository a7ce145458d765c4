use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::{
    cooldown::CooldownState,
    policy::{FirstCriticalWins, SelectionPolicy},
    rules::{evaluate_rules, AlertCandidate},
};
use crate::{
    db::models::{Alert, SensorReading},
    ports::{AlertSink, ConfigStore, RecipientResolver},
};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Result of evaluating one reading.
#[derive(Debug)]
pub enum Evaluation {
    /// An alert was written to the sink and the device's cooldown restarted.
    Emitted(Alert),
    /// Nothing to emit. Not an error.
    Suppressed(SuppressReason),
    /// A lookup or the sink write failed; the cooldown was left untouched so
    /// the next qualifying reading tries again.
    Failed(MonitorError),
}

impl Evaluation {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Evaluation::Emitted(alert) => Some(alert),
            _ => None,
        }
    }

    pub fn into_alert(self) -> Option<Alert> {
        match self {
            Evaluation::Emitted(alert) => Some(alert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// No threshold configuration exists for the device.
    NoConfig,
    /// The device alerted too recently.
    Cooldown { remaining_ms: i64 },
    /// No rule fired, or the selection policy declined every candidate.
    NothingFired,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressReason::NoConfig => f.write_str("no_config"),
            SuppressReason::Cooldown { .. } => f.write_str("cooldown"),
            SuppressReason::NothingFired => f.write_str("nothing_fired"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("reading has an empty device_id")]
    EmptyDeviceId,

    #[error("threshold config lookup failed: {0:#}")]
    ConfigLookup(anyhow::Error),

    #[error("alert sink rejected the alert: {0:#}")]
    Sink(anyhow::Error),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of evaluation time. Cooldowns are measured on this clock, never on
/// reading timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// ThresholdMonitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Bound on the config lookup.
    pub config_timeout: Duration,
    /// Bound on the recipient lookup and on the sink write, each.
    pub sink_timeout: Duration,
    /// Recipient stamped on alerts when resolution fails or finds nobody.
    pub fallback_email: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            config_timeout: Duration::from_secs(2),
            sink_timeout: Duration::from_secs(5),
            fallback_email: "admin@fireguard.com".to_owned(),
        }
    }
}

/// Turns sensor readings into at most one alert each, subject to a
/// per-device cooldown.
pub struct ThresholdMonitor {
    configs: Arc<dyn ConfigStore>,
    sink: Arc<dyn AlertSink>,
    recipients: Arc<dyn RecipientResolver>,
    policy: Arc<dyn SelectionPolicy>,
    clock: Arc<dyn Clock>,
    cooldowns: CooldownState,
    settings: MonitorSettings,
}

impl ThresholdMonitor {
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        sink: Arc<dyn AlertSink>,
        recipients: Arc<dyn RecipientResolver>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            configs,
            sink,
            recipients,
            policy: Arc::new(FirstCriticalWins),
            clock: Arc::new(SystemClock),
            cooldowns: CooldownState::new(),
            settings,
        }
    }

    pub fn with_policy(mut self, policy: impl SelectionPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cooldowns(mut self, cooldowns: CooldownState) -> Self {
        self.cooldowns = cooldowns;
        self
    }

    pub fn cooldowns(&self) -> &CooldownState {
        &self.cooldowns
    }

    /// Evaluate one reading against its device's thresholds.
    ///
    /// Evaluations for the same device are serialised; the per-device lock is
    /// held from the config lookup until the cooldown is updated.
    pub async fn evaluate(&self, reading: &SensorReading) -> Evaluation {
        let device_id = reading.device_id.as_str();
        if device_id.is_empty() {
            return Evaluation::Failed(MonitorError::EmptyDeviceId);
        }

        let mut cooldown = self.cooldowns.lock(device_id).await;
        let now = self.clock.now();

        let config = match time::timeout(
            self.settings.config_timeout,
            self.configs.get_config(device_id),
        )
        .await
        {
            Ok(Ok(Some(config))) => config,
            Ok(Ok(None)) => {
                warn!(device_id = %device_id, "No threshold settings found for device");
                return Evaluation::Suppressed(SuppressReason::NoConfig);
            }
            Ok(Err(e)) => {
                error!(device_id = %device_id, error = %e, "Threshold settings lookup failed");
                return Evaluation::Failed(MonitorError::ConfigLookup(e));
            }
            Err(_) => {
                error!(device_id = %device_id, "Threshold settings lookup timed out");
                return Evaluation::Failed(MonitorError::Timeout {
                    operation: "config lookup",
                    timeout: self.settings.config_timeout,
                });
            }
        };

        if let Some(remaining_ms) = cooldown.remaining_ms(now, config.cooldown_ms()) {
            debug!(device_id = %device_id, remaining_ms, "Alert suppressed by cooldown");
            return Evaluation::Suppressed(SuppressReason::Cooldown { remaining_ms });
        }

        let candidates = evaluate_rules(reading, &config);
        let fired = candidates.len();
        let Some(selected) = self.policy.select(candidates) else {
            debug!(device_id = %device_id, fired, "No alert to emit");
            return Evaluation::Suppressed(SuppressReason::NothingFired);
        };

        let email = self.resolve_email(device_id).await;
        let alert = build_alert(reading, selected, now, config.location, email);

        match time::timeout(self.settings.sink_timeout, self.sink.insert(&alert)).await {
            Ok(Ok(())) => {
                cooldown.mark_emitted(now);
                info!(
                    device_id = %device_id,
                    severity = %alert.severity,
                    fired,
                    message = %alert.message,
                    "Alert created"
                );
                Evaluation::Emitted(alert)
            }
            Ok(Err(e)) => {
                error!(device_id = %device_id, error = %e, "Failed to create alert");
                Evaluation::Failed(MonitorError::Sink(e))
            }
            Err(_) => {
                error!(device_id = %device_id, "Alert insert timed out");
                Evaluation::Failed(MonitorError::Timeout {
                    operation: "alert insert",
                    timeout: self.settings.sink_timeout,
                })
            }
        }
    }

    /// Never fails: falls back to the configured address.
    async fn resolve_email(&self, device_id: &str) -> String {
        match time::timeout(
            self.settings.sink_timeout,
            self.recipients.resolve_email(device_id),
        )
        .await
        {
            Ok(Ok(Some(email))) => email,
            Ok(Ok(None)) => self.settings.fallback_email.clone(),
            Ok(Err(e)) => {
                warn!(device_id = %device_id, error = %e, "Recipient lookup failed; using fallback");
                self.settings.fallback_email.clone()
            }
            Err(_) => {
                warn!(device_id = %device_id, "Recipient lookup timed out; using fallback");
                self.settings.fallback_email.clone()
            }
        }
    }
}

fn build_alert(
    reading: &SensorReading,
    candidate: AlertCandidate,
    now: DateTime<Utc>,
    location: Option<String>,
    email: String,
) -> Alert {
    Alert {
        device_id: reading.device_id.clone(),
        message: candidate.message,
        severity: candidate.severity,
        gas: candidate.gas,
        temp: candidate.temp,
        humidity: candidate.humidity,
        flame: candidate.flame,
        time: now,
        location,
        email,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
