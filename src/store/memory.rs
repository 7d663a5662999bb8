// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! In-process realtime store with fault injection

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{ErrorCallback, RemoteStore, Subscription, ValueCallback};
use crate::error::StoreError;

struct Watcher {
    id: u64,
    on_value: ValueCallback,
    on_error: ErrorCallback,
}

#[derive(Default)]
struct MemoryInner {
    values: BTreeMap<String, Value>,
    watchers: HashMap<String, Vec<Watcher>>,
    denied: HashSet<String>,
    writes_failing: bool,
    next_watcher: u64,
}

/// Realtime store kept in memory.
///
/// Callbacks are invoked synchronously on the writer's task, after the
/// store's own lock is released, so they may call back into the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Future subscriptions to `path` fail with `PermissionDenied`.
    pub fn deny(&self, path: &str) {
        self.inner.lock().denied.insert(path.to_string());
    }

    /// Deliver `error` to every current subscriber of `path`.
    pub fn fail_path(&self, path: &str, error: StoreError) {
        let callbacks: Vec<ErrorCallback> = {
            let inner = self.inner.lock();
            inner
                .watchers
                .get(path)
                .map(|ws| ws.iter().map(|w| w.on_error.clone()).collect())
                .unwrap_or_default()
        };
        debug!("Injecting error on {} for {} watcher(s)", path, callbacks.len());
        for callback in callbacks {
            callback(error.clone());
        }
    }

    /// Make every `set` / `push` fail with a transport error.
    pub fn set_writes_failing(&self, failing: bool) {
        self.inner.lock().writes_failing = failing;
    }

    pub fn watcher_count(&self, path: &str) -> usize {
        self.inner.lock().watchers.get(path).map_or(0, Vec::len)
    }

    /// Synchronous read, for tests and tooling.
    pub fn value(&self, path: &str) -> Option<Value> {
        self.inner.lock().values.get(path).cloned()
    }

    fn notify(&self, path: &str, value: Value) {
        if value.is_null() {
            return;
        }
        let callbacks: Vec<ValueCallback> = {
            let inner = self.inner.lock();
            inner
                .watchers
                .get(path)
                .map(|ws| ws.iter().map(|w| w.on_value.clone()).collect())
                .unwrap_or_default()
        };
        for callback in callbacks {
            callback(value.clone());
        }
    }

    fn detach(inner: &Weak<Mutex<MemoryInner>>, path: &str, id: u64) {
        if let Some(inner) = inner.upgrade() {
            let mut inner = inner.lock();
            if let Some(watchers) = inner.watchers.get_mut(path) {
                watchers.retain(|w| w.id != id);
                if watchers.is_empty() {
                    inner.watchers.remove(path);
                }
            }
            trace!("Detached watcher {} from {}", id, path);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe(
        &self,
        path: &str,
        on_value: ValueCallback,
        on_error: ErrorCallback,
    ) -> Result<Subscription, StoreError> {
        let registered = {
            let mut inner = self.inner.lock();
            if inner.denied.contains(path) {
                None
            } else {
                inner.next_watcher += 1;
                let id = inner.next_watcher;
                inner.watchers.entry(path.to_string()).or_default().push(Watcher {
                    id,
                    on_value: on_value.clone(),
                    on_error: on_error.clone(),
                });
                Some((id, inner.values.get(path).cloned()))
            }
        };

        let Some((id, current)) = registered else {
            on_error(StoreError::PermissionDenied {
                path: path.to_string(),
            });
            return Ok(Subscription::inert(path));
        };

        if let Some(current) = current.filter(|v| !v.is_null()) {
            on_value(current);
        }

        let weak = Arc::downgrade(&self.inner);
        let owned_path = path.to_string();
        Ok(Subscription::new(path, move || {
            MemoryStore::detach(&weak, &owned_path, id)
        }))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock();
            if inner.writes_failing {
                return Err(StoreError::Transport(format!("write to {path} rejected")));
            }
            if value.is_null() {
                inner.values.remove(path);
            } else {
                inner.values.insert(path.to_string(), value.clone());
            }
        }
        trace!("set {} = {}", path, value);
        self.notify(path, value);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let key = Uuid::new_v4().simple().to_string();
        let collection = {
            let mut inner = self.inner.lock();
            if inner.writes_failing {
                return Err(StoreError::Transport(format!("push to {path} rejected")));
            }
            let entry = inner
                .values
                .entry(path.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(children) = entry {
                children.insert(key.clone(), value);
            }
            entry.clone()
        };
        trace!("push {}/{}", path, key);
        self.notify(path, collection);
        Ok(key)
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.value(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, ValueCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Arc::new(move |v: Value| sink.lock().push(v)))
    }

    fn no_errors() -> ErrorCallback {
        Arc::new(|e: StoreError| panic!("unexpected store error: {e}"))
    }

    #[tokio::test]
    async fn test_subscribe_replays_current_value() {
        let store = MemoryStore::new();
        store.set("sensors/fill_level", json!(42)).await.unwrap();

        let (seen, on_value) = recorder();
        let _sub = store.subscribe("sensors/fill_level", on_value, no_errors()).unwrap();
        store.set("sensors/fill_level", json!({"value": 43})).await.unwrap();

        assert_eq!(*seen.lock(), vec![json!(42), json!({"value": 43})]);
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let store = MemoryStore::new();
        let (seen, on_value) = recorder();
        let sub = store.subscribe("actuators/fan_status", on_value, no_errors()).unwrap();
        assert_eq!(store.watcher_count("actuators/fan_status"), 1);

        sub.cancel();
        store.set("actuators/fan_status", json!(true)).await.unwrap();

        assert!(seen.lock().is_empty());
        assert_eq!(store.watcher_count("actuators/fan_status"), 0);
    }

    #[tokio::test]
    async fn test_set_null_deletes() {
        let store = MemoryStore::new();
        store.set("alerts", json!({"a": 1})).await.unwrap();
        store.set("alerts", Value::Null).await.unwrap();
        assert_eq!(store.get("alerts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_appends_children() {
        let store = MemoryStore::new();
        let first = store.push("events", json!({"event": "a"})).await.unwrap();
        let second = store.push("events", json!({"event": "b"})).await.unwrap();
        assert_ne!(first, second);

        let events = store.get("events").await.unwrap().unwrap();
        let children = events.as_object().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[&first]["event"], "a");
    }

    #[tokio::test]
    async fn test_denied_path_reports_error() {
        let store = MemoryStore::new();
        store.deny("sensors/humidity");

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let (_, on_value) = recorder();
        let sub = store
            .subscribe(
                "sensors/humidity",
                on_value,
                Arc::new(move |e: StoreError| sink.lock().push(e.to_string())),
            )
            .unwrap();

        assert!(!sub.is_active());
        assert_eq!(errors.lock().len(), 1);
        assert!(errors.lock()[0].contains("sensors/humidity"));
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryStore::new();
        store.set_writes_failing(true);
        assert!(store.set("a", json!(1)).await.is_err());
        assert!(store.push("events", json!({})).await.is_err());
        assert_eq!(store.value("a"), None);

        store.set_writes_failing(false);
        assert!(store.set("a", json!(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_path_reaches_subscribers() {
        let store = MemoryStore::new();
        let errors = Arc::new(Mutex::new(0));
        let sink = errors.clone();
        let (_, on_value) = recorder();
        let _sub = store
            .subscribe("sensors/air_quality", on_value, Arc::new(move |_: StoreError| *sink.lock() += 1))
            .unwrap();

        store.fail_path("sensors/air_quality", StoreError::Unavailable);
        assert_eq!(*errors.lock(), 1);
    }

    #[tokio::test]
    async fn test_callback_may_reenter_store() {
        let store = MemoryStore::new();
        let reentrant = store.clone();
        let _sub = store
            .subscribe(
                "sensors/fill_level",
                Arc::new(move |_: Value| {
                    let _ = reentrant.value("sensors/fill_level");
                    let _ = reentrant.watcher_count("sensors/fill_level");
                }),
                no_errors(),
            )
            .unwrap();
        store.set("sensors/fill_level", json!(10)).await.unwrap();
    }
}
