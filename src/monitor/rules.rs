//! Threshold rules and their alert messages.
//!
//! Every rule in [`Rule::ALL`] is checked against a reading, in that order.
//! A rule yields at most one [`AlertCandidate`]; choosing between candidates
//! is the selection policy's job.

use crate::db::models::{DeviceThresholdConfig, SensorReading, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Flame,
    GasDanger,
    GasWarning,
    TempDanger,
    TempWarning,
    HumidityDanger,
    HumidityWarning,
    CombinedExtreme,
}

impl Rule {
    /// Evaluation order. Selection policies rely on it.
    pub const ALL: [Rule; 8] = [
        Rule::Flame,
        Rule::GasDanger,
        Rule::GasWarning,
        Rule::TempDanger,
        Rule::TempWarning,
        Rule::HumidityDanger,
        Rule::HumidityWarning,
        Rule::CombinedExtreme,
    ];

    pub fn severity(self) -> Severity {
        match self {
            Rule::Flame | Rule::GasDanger | Rule::TempDanger | Rule::CombinedExtreme => {
                Severity::Critical
            }
            Rule::HumidityDanger => Severity::High,
            Rule::GasWarning | Rule::TempWarning | Rule::HumidityWarning => Severity::Medium,
        }
    }

    /// Returns a candidate if this rule fires for `reading` under `config`.
    pub fn check(
        self,
        reading: &SensorReading,
        config: &DeviceThresholdConfig,
    ) -> Option<AlertCandidate> {
        let fired = match self {
            Rule::Flame => config.enable_flame_alerts && reading.flame_detected(),
            Rule::GasDanger => {
                config.enable_gas_alerts && at_or_above(reading.gas, config.gas_danger_threshold)
            }
            Rule::GasWarning => {
                config.enable_gas_alerts
                    && in_band(
                        reading.gas,
                        config.gas_warning_threshold,
                        config.gas_danger_threshold,
                    )
            }
            Rule::TempDanger => {
                config.enable_temp_alerts
                    && at_or_above(reading.temp, config.temp_danger_threshold)
            }
            Rule::TempWarning => {
                config.enable_temp_alerts
                    && in_band(
                        reading.temp,
                        config.temp_warning_threshold,
                        config.temp_danger_threshold,
                    )
            }
            // Humidity has no enable flag.
            Rule::HumidityDanger => at_or_above(reading.humidity, config.humidity_danger_threshold),
            Rule::HumidityWarning => in_band(
                reading.humidity,
                config.humidity_warning_threshold,
                config.humidity_danger_threshold,
            ),
            Rule::CombinedExtreme => {
                config.enable_gas_alerts
                    && config.enable_temp_alerts
                    && at_or_above(reading.gas, config.gas_danger_threshold)
                    && at_or_above(reading.temp, config.temp_danger_threshold)
            }
        };

        fired.then(|| AlertCandidate {
            rule: self,
            severity: self.severity(),
            message: self.message(reading),
            gas: reading.gas,
            temp: reading.temp,
            humidity: reading.humidity,
            // Only the flame rule reports the flame value.
            flame: if self == Rule::Flame { reading.flame } else { None },
        })
    }

    fn message(self, reading: &SensorReading) -> String {
        let snapshot = snapshot(reading);
        match self {
            Rule::Flame => format!("🔥 FLAME DETECTED! [{snapshot}]"),
            Rule::GasDanger => format!(
                "🚨 CRITICAL: Gas level at {} PPM [{snapshot}]",
                reading.gas.unwrap_or_default()
            ),
            Rule::GasWarning => format!("⚠️ WARNING: Gas level elevated [{snapshot}]"),
            Rule::TempDanger => format!("🚨 CRITICAL: High temperature detected [{snapshot}]"),
            Rule::TempWarning => format!("⚠️ WARNING: Temperature elevated [{snapshot}]"),
            Rule::HumidityDanger => format!("🚨 CRITICAL: High humidity [{snapshot}]"),
            Rule::HumidityWarning => format!("⚠️ WARNING: Humidity elevated [{snapshot}]"),
            Rule::CombinedExtreme => format!(
                "🔥 EXTREME DANGER: High gas ({} PPM) AND high temperature ({}°C) detected! [{snapshot}]",
                reading.gas.unwrap_or_default(),
                reading.temp.unwrap_or_default()
            ),
        }
    }
}

/// One rule's proposed alert, before selection and recipient lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub rule: Rule,
    pub severity: Severity,
    pub message: String,
    pub gas: Option<f64>,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub flame: Option<i32>,
}

/// Run every rule in evaluation order and collect those that fired.
pub fn evaluate_rules(
    reading: &SensorReading,
    config: &DeviceThresholdConfig,
) -> Vec<AlertCandidate> {
    Rule::ALL
        .iter()
        .filter_map(|rule| rule.check(reading, config))
        .collect()
}

/// `"Gas: 550 PPM, Temp: 60°C, Humidity: 40%"`, skipping absent sensors.
/// Flame is never part of the snapshot.
pub fn snapshot(reading: &SensorReading) -> String {
    [
        reading.gas.map(|v| format!("Gas: {v} PPM")),
        reading.temp.map(|v| format!("Temp: {v}°C")),
        reading.humidity.map(|v| format!("Humidity: {v}%")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

fn at_or_above(value: Option<f64>, threshold: f64) -> bool {
    value.is_some_and(|v| v >= threshold)
}

/// `warning <= value < danger`
fn in_band(value: Option<f64>, warning: f64, danger: f64) -> bool {
    value.is_some_and(|v| v >= warning && v < danger)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn reading() -> SensorReading {
        SensorReading {
            device_id: "esp32-1".into(),
            gas: None,
            temp: None,
            humidity: None,
            flame: None,
            time: Utc::now(),
        }
    }

    fn fired(r: &SensorReading, cfg: &DeviceThresholdConfig) -> Vec<Rule> {
        evaluate_rules(r, cfg).into_iter().map(|c| c.rule).collect()
    }

    #[test]
    fn snapshot_omits_absent_fields() {
        let r = SensorReading { gas: Some(550.0), humidity: Some(40.5), ..reading() };
        assert_eq!(snapshot(&r), "Gas: 550 PPM, Humidity: 40.5%");
        assert_eq!(snapshot(&reading()), "");
    }

    #[test]
    fn snapshot_never_includes_flame() {
        let r = SensorReading { temp: Some(21.0), flame: Some(0), ..reading() };
        assert_eq!(snapshot(&r), "Temp: 21°C");
    }

    #[test]
    fn gas_danger_and_warning_are_exclusive() {
        let cfg = DeviceThresholdConfig::default();

        let danger = SensorReading { gas: Some(500.0), ..reading() };
        assert_eq!(fired(&danger, &cfg), vec![Rule::GasDanger]);

        let warning = SensorReading { gas: Some(300.0), ..reading() };
        assert_eq!(fired(&warning, &cfg), vec![Rule::GasWarning]);

        let clear = SensorReading { gas: Some(299.9), ..reading() };
        assert!(fired(&clear, &cfg).is_empty());
    }

    #[test]
    fn temp_danger_and_warning_split_on_temperature_alone() {
        let cfg = DeviceThresholdConfig::default();

        let warm = SensorReading { temp: Some(40.0), ..reading() };
        assert_eq!(fired(&warm, &cfg), vec![Rule::TempWarning]);
        let c = Rule::TempWarning.check(&warm, &cfg).unwrap();
        assert_eq!(c.severity, Severity::Medium);
        assert_eq!(c.temp, Some(40.0));
        assert_eq!(c.message, "⚠️ WARNING: Temperature elevated [Temp: 40°C]");

        let hot = SensorReading { temp: Some(45.0), ..reading() };
        assert_eq!(fired(&hot, &cfg), vec![Rule::TempDanger]);
        let c = Rule::TempDanger.check(&hot, &cfg).unwrap();
        assert_eq!(c.severity, Severity::Critical);
        assert!(Rule::TempWarning.check(&hot, &cfg).is_none());

        let edge = SensorReading { temp: Some(35.0), ..reading() };
        assert_eq!(fired(&edge, &cfg), vec![Rule::TempWarning]);

        let cool = SensorReading { temp: Some(34.9), ..reading() };
        assert!(fired(&cool, &cfg).is_empty());

        let disabled = DeviceThresholdConfig { enable_temp_alerts: false, ..Default::default() };
        assert!(fired(&hot, &disabled).is_empty());
    }

    #[test]
    fn danger_thresholds_are_inclusive_for_every_sensor() {
        let cfg = DeviceThresholdConfig::default();

        let gas = SensorReading { gas: Some(500.0), ..reading() };
        assert_eq!(fired(&gas, &cfg), vec![Rule::GasDanger]);

        let temp = SensorReading { temp: Some(45.0), ..reading() };
        assert_eq!(fired(&temp, &cfg), vec![Rule::TempDanger]);

        let humid = SensorReading { humidity: Some(85.0), ..reading() };
        assert_eq!(fired(&humid, &cfg), vec![Rule::HumidityDanger]);
        assert_eq!(
            Rule::HumidityDanger.check(&humid, &cfg).unwrap().severity,
            Severity::High
        );

        let below = SensorReading { humidity: Some(84.9), ..reading() };
        assert_eq!(fired(&below, &cfg), vec![Rule::HumidityWarning]);
    }

    #[test]
    fn flame_requires_zero_and_enable_flag() {
        let mut cfg = DeviceThresholdConfig::default();
        let lit = SensorReading { flame: Some(0), ..reading() };
        let clear = SensorReading { flame: Some(1), ..reading() };

        assert_eq!(fired(&lit, &cfg), vec![Rule::Flame]);
        assert!(fired(&clear, &cfg).is_empty());

        cfg.enable_flame_alerts = false;
        assert!(fired(&lit, &cfg).is_empty());
    }

    #[test]
    fn flame_candidate_carries_flame_value_others_do_not() {
        let cfg = DeviceThresholdConfig::default();
        let r = SensorReading { flame: Some(0), gas: Some(600.0), ..reading() };

        let candidates = evaluate_rules(&r, &cfg);
        assert_eq!(candidates[0].rule, Rule::Flame);
        assert_eq!(candidates[0].flame, Some(0));
        assert_eq!(candidates[0].message, "🔥 FLAME DETECTED! [Gas: 600 PPM]");
        assert_eq!(candidates[1].rule, Rule::GasDanger);
        assert_eq!(candidates[1].flame, None);
        assert_eq!(candidates[1].gas, Some(600.0));
    }

    #[test]
    fn humidity_ignores_enable_flags() {
        let cfg = DeviceThresholdConfig {
            enable_gas_alerts: false,
            enable_temp_alerts: false,
            enable_flame_alerts: false,
            ..Default::default()
        };

        let high = SensorReading { humidity: Some(90.0), ..reading() };
        let c = evaluate_rules(&high, &cfg);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].rule, Rule::HumidityDanger);
        assert_eq!(c[0].severity, Severity::High);

        let elevated = SensorReading { humidity: Some(75.0), ..reading() };
        assert_eq!(fired(&elevated, &cfg), vec![Rule::HumidityWarning]);
    }

    #[test]
    fn disabled_gas_and_temp_rules_do_not_fire() {
        let cfg = DeviceThresholdConfig {
            enable_gas_alerts: false,
            enable_temp_alerts: false,
            ..Default::default()
        };
        let r = SensorReading { gas: Some(900.0), temp: Some(90.0), ..reading() };
        assert!(fired(&r, &cfg).is_empty());
    }

    #[test]
    fn combined_rule_fires_alongside_individual_dangers() {
        let cfg = DeviceThresholdConfig { temp_danger_threshold: 50.0, ..Default::default() };
        let r = SensorReading { gas: Some(550.0), temp: Some(60.0), ..reading() };

        assert_eq!(
            fired(&r, &cfg),
            vec![Rule::GasDanger, Rule::TempDanger, Rule::CombinedExtreme]
        );
        let combined = evaluate_rules(&r, &cfg).pop().unwrap();
        assert_eq!(
            combined.message,
            "🔥 EXTREME DANGER: High gas (550 PPM) AND high temperature (60°C) detected! \
             [Gas: 550 PPM, Temp: 60°C]"
        );
    }

    #[test]
    fn inverted_thresholds_follow_the_comparison_chain() {
        // warning above danger: anything at or above danger is danger, the
        // warning band is empty.
        let cfg = DeviceThresholdConfig {
            gas_warning_threshold: 600.0,
            gas_danger_threshold: 400.0,
            ..Default::default()
        };
        let r = SensorReading { gas: Some(650.0), ..reading() };
        assert_eq!(fired(&r, &cfg), vec![Rule::GasDanger]);

        let r = SensorReading { gas: Some(500.0), ..reading() };
        assert_eq!(fired(&r, &cfg), vec![Rule::GasDanger]);

        let r = SensorReading { gas: Some(350.0), ..reading() };
        assert!(fired(&r, &cfg).is_empty());
    }

    #[test]
    fn gas_warning_message_and_severity() {
        let cfg = DeviceThresholdConfig::default();
        let r = SensorReading { gas: Some(350.0), temp: Some(22.5), ..reading() };
        let c = evaluate_rules(&r, &cfg);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].severity, Severity::Medium);
        assert_eq!(
            c[0].message,
            "⚠️ WARNING: Gas level elevated [Gas: 350 PPM, Temp: 22.5°C]"
        );
    }
}
