use std::time::Duration;

use anyhow::{ensure, Context, Result};

use crate::monitor::MonitorSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Bound on the threshold settings lookup, in milliseconds.
    pub config_timeout_ms: u64,
    /// Bound on the alert insert and recipient lookup, in milliseconds.
    pub sink_timeout_ms: u64,
    /// Recipient used when no subscriber can be resolved.
    pub fallback_alert_email: String,
    /// Offline detector interval in seconds.
    pub offline_check_secs: u64,
    /// Silence after which a device counts as offline, in seconds.
    pub offline_after_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).with_context(|| format!("missing required env var: {key}"))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let positive_secs = |key: &str, default: &str| -> Result<u64> {
            let secs: u64 = optional(key, default)
                .parse()
                .with_context(|| format!("{key} must be a positive integer"))?;
            ensure!(secs > 0, "{key} must be a positive integer");
            Ok(secs)
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            config_timeout_ms: optional("CONFIG_TIMEOUT_MS", "2000")
                .parse()
                .context("CONFIG_TIMEOUT_MS must be a positive integer")?,
            sink_timeout_ms: optional("SINK_TIMEOUT_MS", "5000")
                .parse()
                .context("SINK_TIMEOUT_MS must be a positive integer")?,
            fallback_alert_email: optional("FALLBACK_ALERT_EMAIL", "admin@fireguard.com"),
            offline_check_secs: positive_secs("OFFLINE_CHECK_SECS", "10")?,
            offline_after_secs: positive_secs("OFFLINE_AFTER_SECS", "60")?,
        })
    }

    /// Silence after which a device counts as offline, saturating at the
    /// largest representable span.
    pub fn offline_after(&self) -> chrono::Duration {
        i64::try_from(self.offline_after_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            config_timeout: Duration::from_millis(self.config_timeout_ms),
            sink_timeout: Duration::from_millis(self.sink_timeout_ms),
            fallback_email: self.fallback_alert_email.clone(),
        }
    }
}
