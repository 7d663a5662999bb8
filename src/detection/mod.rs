// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Detection module - threshold alerts derived from the state stream

mod thresholds;

pub use thresholds::{AirQualityStatus, BinStatus, LevelStatus, ThresholdConfig};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AlertConfig;
use crate::core::{SmartBinHub, Unsubscribe};
use crate::sensors::SensorState;

/// User-facing alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Danger,
}

/// Alert record shown in the dashboard and persisted under `alerts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub value: Option<f64>,
    pub timestamp: i64,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(level: AlertLevel, title: &str, message: String, value: Option<f64>, timestamp: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level,
            title: title.to_string(),
            message,
            value,
            timestamp,
            acknowledged: false,
        }
    }
}

/// The four independently rate-limited alert kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    GasDanger,
    GasWarning,
    LevelCritical,
    LevelWarning,
}

impl AlertKind {
    fn index(&self) -> usize {
        match self {
            AlertKind::GasDanger => 0,
            AlertKind::GasWarning => 1,
            AlertKind::LevelCritical => 2,
            AlertKind::LevelWarning => 3,
        }
    }

    pub fn level(&self) -> AlertLevel {
        match self {
            AlertKind::GasDanger | AlertKind::LevelCritical => AlertLevel::Danger,
            AlertKind::GasWarning => AlertLevel::Warning,
            AlertKind::LevelWarning => AlertLevel::Info,
        }
    }
}

/// Level-triggered threshold checks with per-kind cooldowns.
///
/// Gas danger shadows gas warning: while `ppm` is above the danger threshold
/// only the danger kind is considered, even if it is cooling down. The level
/// tiers differ: while critical is cooling down the warning tier may fire on
/// its own cooldown.
pub struct AlertEvaluator {
    thresholds: ThresholdConfig,
    cooldown_ms: i64,
    level_warning_cooldown_ms: i64,
    last_fired: [Option<i64>; 4],
}

impl AlertEvaluator {
    pub fn new(thresholds: ThresholdConfig, cooldown_ms: i64) -> Self {
        Self {
            thresholds,
            cooldown_ms,
            level_warning_cooldown_ms: cooldown_ms * 2,
            last_fired: [None; 4],
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        let mut evaluator = Self::new(config.thresholds, config.cooldown_ms);
        evaluator.level_warning_cooldown_ms = config.cooldown_ms * config.level_warning_cooldown_factor;
        evaluator
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: ThresholdConfig) {
        self.thresholds = thresholds;
    }

    pub fn cooldown(&self, kind: AlertKind) -> i64 {
        match kind {
            AlertKind::LevelWarning => self.level_warning_cooldown_ms,
            _ => self.cooldown_ms,
        }
    }

    /// Evaluate one snapshot, using its timestamp as the clock. Returns at
    /// most one gas alert and one level alert.
    pub fn evaluate(&mut self, state: &SensorState) -> Vec<Alert> {
        let now = state.timestamp;
        let t = self.thresholds;
        let mut fired = Vec::new();

        let gas = if state.ppm > t.gas_danger {
            Some(AlertKind::GasDanger)
        } else if state.ppm > t.gas_warning {
            Some(AlertKind::GasWarning)
        } else {
            None
        };
        if let Some(kind) = gas.filter(|k| self.ready(*k, now)) {
            fired.push(self.fire(kind, state));
        }

        // A cooling critical tier hands over to the warning tier
        let level = if state.level >= t.level_critical && self.ready(AlertKind::LevelCritical, now) {
            Some(AlertKind::LevelCritical)
        } else if state.level >= t.level_warning && self.ready(AlertKind::LevelWarning, now) {
            Some(AlertKind::LevelWarning)
        } else {
            None
        };
        if let Some(kind) = level {
            fired.push(self.fire(kind, state));
        }

        fired
    }

    fn ready(&self, kind: AlertKind, now: i64) -> bool {
        self.last_fired[kind.index()].map_or(true, |last| now - last > self.cooldown(kind))
    }

    fn fire(&mut self, kind: AlertKind, state: &SensorState) -> Alert {
        let now = state.timestamp;
        self.last_fired[kind.index()] = Some(now);
        let t = &self.thresholds;

        match kind {
            AlertKind::GasDanger => Alert::new(
                kind.level(),
                "Dangerous gas levels detected",
                format!("Air quality at {:.0} PPM, above the danger threshold of {:.0} PPM", state.ppm, t.gas_danger),
                Some(state.ppm),
                now,
            ),
            AlertKind::GasWarning => Alert::new(
                kind.level(),
                "Poor air quality",
                format!("Air quality at {:.0} PPM, above the warning threshold of {:.0} PPM", state.ppm, t.gas_warning),
                Some(state.ppm),
                now,
            ),
            AlertKind::LevelCritical => Alert::new(
                kind.level(),
                "Bin full",
                format!("Fill level at {:.1}%, collection required", state.level),
                Some(state.level),
                now,
            ),
            AlertKind::LevelWarning => Alert::new(
                kind.level(),
                "High fill level",
                format!("Fill level at {:.1}% of capacity", state.level),
                Some(state.level),
                now,
            ),
        }
    }
}

/// Runs an [`AlertEvaluator`] against a hub's output stream, publishing each
/// fired alert on the hub's event bus and persisting it.
pub struct AlertMonitor {
    evaluator: Arc<Mutex<AlertEvaluator>>,
    subscription: Unsubscribe<SensorState>,
}

impl AlertMonitor {
    pub fn attach(hub: &SmartBinHub, evaluator: AlertEvaluator) -> Self {
        let evaluator = Arc::new(Mutex::new(evaluator));
        let shared = evaluator.clone();
        let bus = hub.event_bus();
        let records = hub.records();

        let subscription = hub.subscribe(move |state: &SensorState| {
            let alerts = shared.lock().evaluate(state);
            for alert in alerts {
                warn!("{}: {}", alert.title, alert.message);
                bus.publish_alert(alert.clone());

                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        let records = records.clone();
                        handle.spawn(async move {
                            records.save_alert(&alert).await;
                        });
                    }
                    Err(_) => debug!("No runtime, alert '{}' not persisted", alert.title),
                }
            }
        });

        Self {
            evaluator,
            subscription,
        }
    }

    /// Replace the thresholds used for subsequent updates.
    pub fn set_thresholds(&self, thresholds: ThresholdConfig) {
        self.evaluator.lock().set_thresholds(thresholds);
    }

    pub fn detach(&self) -> bool {
        self.subscription.unsubscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::History;

    fn state(ppm: f64, level: f64, timestamp: i64) -> SensorState {
        SensorState {
            level,
            ppm,
            lid_open: false,
            fan_on: false,
            temperature: 22.0,
            humidity: 45.0,
            timestamp,
            ppm_history: History::default(),
            level_history: History::default(),
        }
    }

    fn evaluator() -> AlertEvaluator {
        AlertEvaluator::new(ThresholdConfig::default(), 10_000)
    }

    #[test]
    fn test_gas_danger_cooldown() {
        let mut eval = evaluator();
        let t0 = 1_000_000;

        let fired: Vec<_> = (0..3)
            .flat_map(|i| eval.evaluate(&state(450.0, 10.0, t0 + i * 1000)))
            .collect();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].level, AlertLevel::Danger);
        assert_eq!(fired[0].value, Some(450.0));

        let again = eval.evaluate(&state(450.0, 10.0, t0 + 11_000));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].level, AlertLevel::Danger);
    }

    #[test]
    fn test_danger_shadows_warning() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate(&state(450.0, 10.0, 0)).len(), 1);
        // Still above danger and cooling down: no warning-tier fallback
        assert!(eval.evaluate(&state(450.0, 10.0, 2000)).is_empty());
        // Dropping into the warning band uses the independent warning cooldown
        let warning = eval.evaluate(&state(350.0, 10.0, 3000));
        assert_eq!(warning.len(), 1);
        assert_eq!(warning[0].level, AlertLevel::Warning);
    }

    #[test]
    fn test_thresholds_are_strict_for_gas_inclusive_for_level() {
        let mut eval = evaluator();
        assert!(eval.evaluate(&state(300.0, 79.9, 0)).is_empty());
        let fired = eval.evaluate(&state(50.0, 80.0, 1));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].level, AlertLevel::Info);
    }

    #[test]
    fn test_level_warning_uses_double_cooldown() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate(&state(50.0, 85.0, 0)).len(), 1);
        assert!(eval.evaluate(&state(50.0, 85.0, 15_000)).is_empty());
        assert_eq!(eval.evaluate(&state(50.0, 85.0, 20_001)).len(), 1);
    }

    #[test]
    fn test_gas_and_level_fire_together() {
        let mut eval = evaluator();
        let fired = eval.evaluate(&state(500.0, 97.0, 0));
        assert_eq!(fired.len(), 2);
        assert!(fired.iter().all(|a| a.level == AlertLevel::Danger));
        assert!(fired.iter().all(|a| !a.acknowledged));
    }

    #[test]
    fn test_level_warning_fills_critical_cooldown() {
        let mut eval = evaluator();
        let fired: Vec<(i64, AlertLevel)> = (0..=60)
            .flat_map(|s| {
                eval.evaluate(&state(50.0, 99.0, s * 1000))
                    .into_iter()
                    .map(move |a| (s, a.level))
            })
            .collect();

        use AlertLevel::{Danger, Info};
        assert_eq!(
            fired,
            vec![
                (0, Danger),
                (1, Info),
                (11, Danger),
                (22, Danger),
                (23, Info),
                (33, Danger),
                (44, Danger),
                (45, Info),
                (55, Danger),
            ]
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let mut eval = evaluator();
        eval.set_thresholds(ThresholdConfig {
            gas_warning: 100.0,
            gas_danger: 200.0,
            ..Default::default()
        });
        let fired = eval.evaluate(&state(150.0, 10.0, 0));
        assert_eq!(fired[0].level, AlertLevel::Warning);
    }

    #[tokio::test]
    async fn test_monitor_publishes_from_hub_stream() {
        let mut config = crate::config::Config::default();
        config.simulator.seed = Some(3);
        let hub = SmartBinHub::new(config, None);
        let mut alerts = hub.event_bus().subscribe_alerts();
        let monitor = AlertMonitor::attach(&hub, evaluator());

        hub.gas_spike().await;
        assert!(alerts.try_recv().is_err());
        hub.gas_spike().await;

        let alert = alerts.try_recv().unwrap();
        assert_eq!(alert.level, AlertLevel::Danger);
        assert_eq!(alert.value, Some(450.0));

        assert!(monitor.detach());
        assert!(!monitor.detach());
        hub.gas_spike().await;
        assert!(alerts.try_recv().is_err());
    }

    #[test]
    fn test_alert_wire_format() {
        let alert = Alert::new(AlertLevel::Warning, "t", "m".to_string(), Some(85.0), 5);
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["acknowledged"], false);
    }
}
