// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Remote realtime store contract
//!
//! The sync layer only needs four things from a push-based store: a
//! per-path subscription, a value write, an append under a generated key and
//! a one-shot read. Values are JSON; a path holds either a raw scalar or a
//! small wrapper record such as `{value, timestamp}` / `{status, timestamp}`.

mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;

/// Logical path layout
pub mod paths {
    pub const FILL_LEVEL: &str = "sensors/fill_level";
    pub const AIR_QUALITY: &str = "sensors/air_quality";
    pub const TEMPERATURE: &str = "sensors/temperature";
    pub const HUMIDITY: &str = "sensors/humidity";
    /// Physical lid sensor report (authoritative)
    pub const LID_STATUS: &str = "sensors/lid_status";
    /// Written by the serial bridge alongside each update
    pub const LAST_UPDATE: &str = "sensors/last_update";
    /// Legacy manual lid command path
    pub const LID_OPEN: &str = "actuators/lid_open";
    pub const FAN_STATUS: &str = "actuators/fan_status";
    pub const EVENTS: &str = "events";
    pub const ALERTS: &str = "alerts";
    pub const THRESHOLDS: &str = "config/thresholds";
}

pub type ValueCallback = Arc<dyn Fn(Value) + Send + Sync + 'static>;
pub type ErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync + 'static>;

/// Live subscription to one path. Detaches on [`Subscription::cancel`] or drop.
pub struct Subscription {
    path: String,
    detach: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
}

impl Subscription {
    pub fn new<F>(path: &str, detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            path: path.to_string(),
            detach: Mutex::new(Some(Box::new(detach))),
        }
    }

    /// Subscription with nothing to detach, for paths that failed to attach
    pub fn inert(path: &str) -> Self {
        Self {
            path: path.to_string(),
            detach: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.detach.lock().is_some()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        let detach = self.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Push-based realtime store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Watch `path`. `on_value` receives the current value (if any) and every
    /// later non-null write; `on_error` receives connectivity or permission
    /// failures for this path.
    fn subscribe(
        &self,
        path: &str,
        on_value: ValueCallback,
        on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError>;

    /// Write `value` at `path`; `Value::Null` deletes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Append `value` under a generated child key and return the key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// One-shot read.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;
}
