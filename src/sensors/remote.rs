// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Remote sync adapter
//!
//! Watches one store path per sensor/actuator and folds every accepted value
//! into a cached [`SensorState`]. Each accepted update produces a full
//! snapshot; history windows only move on real remote updates.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, error, info, trace};

use super::{History, SensorState};
use crate::core::{now_millis, Actuator, Command};
use crate::error::StoreError;
use crate::store::{paths, RemoteStore, Subscription};

/// Store-backed field the adapter watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Level,
    Ppm,
    Temperature,
    Humidity,
    LidSensor,
    /// Legacy manual lid command path, honoured only until the lid sensor reports
    LidActuator,
    Fan,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Level,
        Field::Ppm,
        Field::LidSensor,
        Field::LidActuator,
        Field::Fan,
        Field::Temperature,
        Field::Humidity,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Field::Level => paths::FILL_LEVEL,
            Field::Ppm => paths::AIR_QUALITY,
            Field::Temperature => paths::TEMPERATURE,
            Field::Humidity => paths::HUMIDITY,
            Field::LidSensor => paths::LID_STATUS,
            Field::LidActuator => paths::LID_OPEN,
            Field::Fan => paths::FAN_STATUS,
        }
    }

    fn is_flag(&self) -> bool {
        matches!(self, Field::LidSensor | Field::LidActuator | Field::Fan)
    }

    // Used when a wrapper record carries no usable payload
    fn default_scalar(&self) -> Scalar {
        match self {
            Field::Level | Field::Ppm => Scalar::Number(0.0),
            Field::Temperature => Scalar::Number(22.0),
            Field::Humidity => Scalar::Number(45.0),
            Field::LidSensor | Field::LidActuator | Field::Fan => Scalar::Flag(false),
        }
    }
}

/// Typed value extracted from a raw store payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Number(f64),
    Flag(bool),
}

/// Reduce a raw payload to the scalar `field` expects.
///
/// Accepts a bare scalar or a wrapper record carrying `status` or `value`
/// (with `timestamp` / `source` ignored). Numeric strings are parsed.
/// Payloads that cannot be read for the field return `None`.
pub fn normalize(field: Field, raw: &Value) -> Option<Scalar> {
    let inner = match raw {
        Value::Object(record) => {
            let payload = if field.is_flag() {
                record.get("status").or_else(|| record.get("value"))
            } else {
                record.get("value")
            };
            match payload {
                Some(Value::Null) | None => return Some(field.default_scalar()),
                Some(payload) => payload,
            }
        }
        other => other,
    };

    if field.is_flag() {
        let flag = match inner {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
            Value::String(s) => match s.trim() {
                "true" | "1" | "on" => true,
                "false" | "0" | "off" => false,
                _ => return None,
            },
            _ => return None,
        };
        Some(Scalar::Flag(flag))
    } else {
        let number = match inner {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        number.is_finite().then_some(Scalar::Number(number))
    }
}

/// Cached state assembled from remote notifications
#[derive(Debug, Clone)]
pub struct RemoteState {
    level: f64,
    ppm: f64,
    lid_open: bool,
    fan_on: bool,
    temperature: f64,
    humidity: f64,
    timestamp: i64,
    ppm_history: History,
    level_history: History,
    lid_sensor_reported: bool,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            level: 0.0,
            ppm: 0.0,
            lid_open: false,
            fan_on: false,
            temperature: 22.0,
            humidity: 45.0,
            timestamp: now_millis(),
            ppm_history: History::filled(0.0),
            level_history: History::filled(0.0),
            lid_sensor_reported: false,
        }
    }
}

impl RemoteState {
    /// Fold one value in. Returns `false` when the value was not accepted.
    pub fn apply(&mut self, field: Field, scalar: Scalar, now: i64) -> bool {
        match (field, scalar) {
            (Field::Level, Scalar::Number(n)) => {
                self.level = n.clamp(0.0, 100.0);
                self.level_history.push(self.level);
            }
            (Field::Ppm, Scalar::Number(n)) => {
                self.ppm = n.clamp(0.0, 600.0);
                self.ppm_history.push(self.ppm);
            }
            (Field::Temperature, Scalar::Number(n)) => self.temperature = n,
            (Field::Humidity, Scalar::Number(n)) => self.humidity = n,
            (Field::LidSensor, Scalar::Flag(b)) => {
                self.lid_open = b;
                self.lid_sensor_reported = true;
            }
            (Field::LidActuator, Scalar::Flag(b)) => {
                if self.lid_sensor_reported {
                    return false;
                }
                self.lid_open = b;
            }
            (Field::Fan, Scalar::Flag(b)) => self.fan_on = b,
            _ => return false,
        }
        self.timestamp = self.timestamp.max(now);
        true
    }

    pub fn snapshot(&self) -> SensorState {
        SensorState {
            level: self.level,
            ppm: self.ppm,
            lid_open: self.lid_open,
            fan_on: self.fan_on,
            temperature: self.temperature,
            humidity: self.humidity,
            timestamp: self.timestamp,
            ppm_history: self.ppm_history.clone(),
            level_history: self.level_history.clone(),
        }
    }
}

/// Receiver of adapter output, implemented by the hub
pub trait SyncSink: Send + Sync {
    /// Run `update` and fan its snapshot out, if it produced one.
    fn publish_remote(&self, update: &dyn Fn() -> Option<SensorState>);

    /// A subscription on `path` failed.
    fn remote_failed(&self, path: &str, error: StoreError);
}

/// Bridges store paths and the canonical state record
pub struct RemoteSyncAdapter {
    store: Arc<dyn RemoteStore>,
    state: Mutex<RemoteState>,
}

impl RemoteSyncAdapter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            state: Mutex::new(RemoteState::default()),
        })
    }

    /// Open one subscription per field. Failures are reported to `sink`;
    /// broken subscriptions are not retried.
    pub fn attach(self: &Arc<Self>, sink: Weak<dyn SyncSink>) -> Vec<Subscription> {
        let mut subscriptions = Vec::with_capacity(Field::ALL.len());

        for field in Field::ALL {
            let adapter = Arc::downgrade(self);
            let value_sink = sink.clone();
            let on_value = Arc::new(move |raw: Value| {
                let (Some(adapter), Some(sink)) = (adapter.upgrade(), value_sink.upgrade()) else {
                    return;
                };
                sink.publish_remote(&|| adapter.ingest(field, &raw));
            });

            let error_sink = sink.clone();
            let on_error = Arc::new(move |err: StoreError| {
                error!("Subscription error on {}: {}", field.path(), err);
                if let Some(sink) = error_sink.upgrade() {
                    sink.remote_failed(field.path(), err);
                }
            });

            match self.store.subscribe(field.path(), on_value, on_error) {
                Ok(subscription) => subscriptions.push(subscription),
                Err(err) => {
                    error!("Failed to subscribe to {}: {}", field.path(), err);
                    if let Some(sink) = sink.upgrade() {
                        sink.remote_failed(field.path(), err);
                    }
                }
            }
        }

        info!("Remote listeners attached ({} paths)", subscriptions.len());
        subscriptions
    }

    /// Normalize and apply a raw payload. Returns the new snapshot when the
    /// value was accepted; the history push and the snapshot happen under one
    /// lock.
    pub fn ingest(&self, field: Field, raw: &Value) -> Option<SensorState> {
        let Some(scalar) = normalize(field, raw) else {
            debug!("Ignoring malformed value on {}: {}", field.path(), raw);
            return None;
        };
        let mut state = self.state.lock();
        if !state.apply(field, scalar, now_millis()) {
            trace!("Value on {} not applied", field.path());
            return None;
        }
        Some(state.snapshot())
    }

    pub fn snapshot(&self) -> SensorState {
        self.state.lock().snapshot()
    }

    /// Write the command's target value to its actuator path. Toggles are
    /// computed from the cached value, not re-read from the store.
    pub async fn send_command(&self, command: Command) -> Result<bool, StoreError> {
        let (path, target) = {
            let state = self.state.lock();
            match command.actuator() {
                Actuator::Lid => (paths::LID_OPEN, command.resolve(state.lid_open)),
                Actuator::Fan => (paths::FAN_STATUS, command.resolve(state.fan_on)),
            }
        };
        self.store
            .set(path, json!({ "status": target, "timestamp": now_millis() }))
            .await?;
        Ok(target)
    }

    pub async fn fill_quickly(&self) -> Result<(), StoreError> {
        let level = (self.state.lock().level + 30.0).min(100.0);
        self.store
            .set(paths::FILL_LEVEL, json!({ "value": level, "timestamp": now_millis() }))
            .await
    }

    pub async fn gas_spike(&self) -> Result<(), StoreError> {
        let ppm = (self.state.lock().ppm + 200.0).min(600.0);
        self.store
            .set(paths::AIR_QUALITY, json!({ "value": ppm, "timestamp": now_millis() }))
            .await
    }
}
