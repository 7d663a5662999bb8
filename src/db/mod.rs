// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Persistence module - event log, alert list and threshold configuration
//!
//! Everything goes through the same remote store as telemetry. While the hub
//! runs on the simulator, reads return fixed mock datasets and writes are
//! logged and skipped, so the dashboard always has something to render.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::core::{now_millis, FallbackArbiter};
use crate::detection::{Alert, AlertLevel, ThresholdConfig};
use crate::error::StoreError;
use crate::store::{paths, RemoteStore};

/// Event categories shown in the history view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Warning,
    Danger,
    Command,
    System,
    Maintenance,
    Info,
}

impl Default for EventKind {
    fn default() -> Self {
        EventKind::Info
    }
}

/// Entry of the append-only event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub event: String,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Event, alert and configuration records
#[derive(Clone)]
pub struct Persistence {
    store: Option<Arc<dyn RemoteStore>>,
    arbiter: Arc<FallbackArbiter>,
    history_limit: usize,
}

impl Persistence {
    pub fn new(
        store: Option<Arc<dyn RemoteStore>>,
        arbiter: Arc<FallbackArbiter>,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            arbiter,
            history_limit,
        }
    }

    /// Store to use, or `None` while the simulator is the active source
    fn live_store(&self) -> Option<&Arc<dyn RemoteStore>> {
        if self.arbiter.is_fallback() {
            None
        } else {
            self.store.as_ref()
        }
    }

    /// Append an event. Returns whether it reached the store.
    pub async fn log_event(&self, event: &str, kind: EventKind, value: Option<f64>) -> bool {
        let Some(store) = self.live_store() else {
            debug!("Event (simulated): {:?} - {}", kind, event);
            return false;
        };

        let record = json!({
            "event": event,
            "type": kind,
            "value": value,
            "timestamp": now_millis(),
        });
        match store.push(paths::EVENTS, record).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to log event '{}': {}", event, e);
                false
            }
        }
    }

    /// Newest first, capped at the configured history limit.
    pub async fn get_event_history(&self) -> Vec<Event> {
        let Some(store) = self.live_store() else {
            return mock_event_history(now_millis());
        };

        match store.get(paths::EVENTS).await {
            Ok(data) => {
                let mut events: Vec<Event> = collect_children(data)
                    .into_iter()
                    .filter_map(|(id, record)| parse_child::<Event>(id, record, |e, id| e.id = id))
                    .collect();
                events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                events.truncate(self.history_limit);
                events
            }
            Err(e) => {
                error!("Failed to read event history: {}", e);
                mock_event_history(now_millis())
            }
        }
    }

    /// Push `alert` with a fresh timestamp, unacknowledged.
    pub async fn save_alert(&self, alert: &Alert) -> bool {
        let Some(store) = self.live_store() else {
            debug!("Alert (simulated): {}", alert.title);
            return false;
        };

        let mut record = alert.clone();
        record.timestamp = now_millis();
        record.acknowledged = false;

        let result = match serde_json::to_value(&record) {
            Ok(value) => store.push(paths::ALERTS, value).await.map(|_| ()),
            Err(e) => Err(StoreError::from(e)),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save alert '{}': {}", alert.title, e);
                false
            }
        }
    }

    /// Newest first.
    pub async fn get_alerts(&self) -> Vec<Alert> {
        let Some(store) = self.live_store() else {
            return mock_alerts(now_millis());
        };

        match store.get(paths::ALERTS).await {
            Ok(data) => {
                let mut alerts: Vec<Alert> = collect_children(data)
                    .into_iter()
                    .filter_map(|(id, record)| parse_child::<Alert>(id, record, |a, id| a.id = id))
                    .collect();
                alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                alerts
            }
            Err(e) => {
                error!("Failed to read alerts: {}", e);
                mock_alerts(now_millis())
            }
        }
    }

    pub async fn clear_alerts(&self) -> bool {
        let Some(store) = self.live_store() else {
            debug!("Alerts cleared (simulated)");
            return true;
        };

        match store.set(paths::ALERTS, Value::Null).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to clear alerts: {}", e);
                false
            }
        }
    }

    /// Stored thresholds, or the defaults when none are stored. `None` when
    /// the read itself failed.
    pub async fn get_thresholds(&self) -> Option<ThresholdConfig> {
        let Some(store) = self.live_store() else {
            return Some(ThresholdConfig::default());
        };

        match store.get(paths::THRESHOLDS).await {
            Ok(None) => Some(ThresholdConfig::default()),
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(thresholds) => Some(thresholds),
                Err(e) => {
                    warn!("Stored thresholds unreadable, using defaults: {}", e);
                    Some(ThresholdConfig::default())
                }
            },
            Err(e) => {
                error!("Failed to read thresholds: {}", e);
                None
            }
        }
    }

    /// Validate and store `thresholds`. Invalid configs are never written.
    pub async fn save_thresholds(&self, thresholds: &ThresholdConfig) -> bool {
        if let Err(e) = thresholds.validate() {
            warn!("Rejected threshold config: {}", e);
            return false;
        }
        let Some(store) = self.live_store() else {
            debug!("Thresholds saved (simulated): {:?}", thresholds);
            return true;
        };

        match store.set(paths::THRESHOLDS, thresholds_record(thresholds)).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save thresholds: {}", e);
                false
            }
        }
    }

    /// Write default values into every path of an empty deployment.
    ///
    /// Runs against the configured store regardless of the active source.
    pub async fn seed_database(&self) -> bool {
        let Some(store) = self.store.as_ref() else {
            warn!("No remote store configured, nothing to seed");
            return false;
        };

        info!("Seeding remote store");
        match seed(store.as_ref()).await {
            Ok(()) => {
                info!("Remote store seeded");
                true
            }
            Err(e) => {
                error!("Failed to seed remote store: {}", e);
                false
            }
        }
    }
}

async fn seed(store: &dyn RemoteStore) -> Result<(), StoreError> {
    let sensors = [
        (paths::FILL_LEVEL, 25.0),
        (paths::AIR_QUALITY, 75.0),
        (paths::TEMPERATURE, 22.0),
        (paths::HUMIDITY, 45.0),
    ];
    for (path, value) in sensors {
        store
            .set(path, json!({ "value": value, "timestamp": now_millis() }))
            .await?;
    }

    for path in [paths::LID_OPEN, paths::FAN_STATUS] {
        store
            .set(path, json!({ "status": false, "timestamp": now_millis() }))
            .await?;
    }

    store
        .set(paths::THRESHOLDS, thresholds_record(&ThresholdConfig::default()))
        .await?;

    store
        .push(
            paths::EVENTS,
            json!({
                "event": "System initialized",
                "type": EventKind::System,
                "timestamp": now_millis(),
            }),
        )
        .await?;
    Ok(())
}

fn thresholds_record(thresholds: &ThresholdConfig) -> Value {
    let mut record = match serde_json::to_value(thresholds) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    record.insert("updatedAt".to_string(), json!(now_millis()));
    Value::Object(record)
}

fn collect_children(data: Option<Value>) -> Vec<(String, Value)> {
    match data {
        Some(Value::Object(children)) => children.into_iter().collect(),
        _ => Vec::new(),
    }
}

fn parse_child<T>(id: String, record: Value, set_id: impl Fn(&mut T, String)) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    match serde_json::from_value::<T>(record) {
        Ok(mut item) => {
            set_id(&mut item, id);
            Some(item)
        }
        Err(e) => {
            debug!("Skipping malformed record {}: {}", id, e);
            None
        }
    }
}

const HOUR_MS: i64 = 3_600_000;

/// Demo event log, one entry per hour going back from `now`
pub fn mock_event_history(now: i64) -> Vec<Event> {
    let events = [
        ("Fan turned on", EventKind::Command, None),
        ("Gas detected > 350 PPM", EventKind::Warning, Some(352.0)),
        ("Lid opened", EventKind::Command, None),
        ("High fill level", EventKind::Warning, Some(82.0)),
        ("System started", EventKind::System, None),
        ("Configuration updated", EventKind::System, None),
        ("Lid closed", EventKind::Command, None),
        ("Fan turned off", EventKind::Command, None),
        ("Bin emptied", EventKind::Maintenance, Some(15.0)),
        ("Gas levels normal", EventKind::Info, Some(85.0)),
    ];

    events
        .into_iter()
        .enumerate()
        .map(|(index, (event, kind, value))| Event {
            id: format!("mock-{index}"),
            event: event.to_string(),
            kind,
            value,
            timestamp: now - index as i64 * HOUR_MS,
        })
        .collect()
}

/// Demo alert list
pub fn mock_alerts(now: i64) -> Vec<Alert> {
    vec![
        Alert {
            id: "alert-1".to_string(),
            level: AlertLevel::Danger,
            title: "Dangerous gas levels detected".to_string(),
            message: "Gas levels above 400 PPM were detected".to_string(),
            value: Some(423.0),
            timestamp: now - HOUR_MS / 2,
            acknowledged: false,
        },
        Alert {
            id: "alert-2".to_string(),
            level: AlertLevel::Warning,
            title: "High fill level".to_string(),
            message: "The bin is at 85% of its capacity".to_string(),
            value: Some(85.0),
            timestamp: now - HOUR_MS,
            acknowledged: false,
        },
        Alert {
            id: "alert-3".to_string(),
            level: AlertLevel::Warning,
            title: "Poor air quality".to_string(),
            message: "PPM levels above the warning threshold".to_string(),
            value: Some(315.0),
            timestamp: now - 2 * HOUR_MS,
            acknowledged: true,
        },
    ]
}
