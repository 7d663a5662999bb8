// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Reactive state hub - the single entry point the dashboard talks to

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use super::arbiter::{FallbackArbiter, SourceMode};
use super::command::Command;
use super::event_bus::{EventBus, NoticePayload};
use super::now_millis;
use super::observers::{Listener, ObserverRegistry, Unsubscribe};
use crate::config::Config;
use crate::db::{EventKind, Persistence};
use crate::error::StoreError;
use crate::sensors::{PhysicsSimulator, RemoteSyncAdapter, SensorState, SyncSink};
use crate::store::{RemoteStore, Subscription};

/// Reactive state hub.
///
/// Owns both backing sources and routes every operation to whichever one the
/// [`FallbackArbiter`] designates. Listeners always see one ordered stream of
/// full snapshots. Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct SmartBinHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    self_ref: Weak<HubInner>,
    config: Config,
    arbiter: Arc<FallbackArbiter>,
    simulator: Mutex<PhysicsSimulator>,
    remote: Option<Arc<RemoteSyncAdapter>>,
    listeners: Arc<ObserverRegistry<SensorState>>,
    // Held while producing and delivering a snapshot. Re-entrant so listeners
    // may subscribe or read the snapshot from inside a callback.
    delivery: ReentrantMutex<()>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    initialized: AtomicBool,
    records: Persistence,
    bus: Arc<EventBus>,
}

impl SmartBinHub {
    /// Build a hub. `store` is `None` when no remote store could be
    /// constructed, which starts the hub on the simulator.
    pub fn new(config: Config, store: Option<Arc<dyn RemoteStore>>) -> Self {
        let remote_available = store.is_some() && !config.simulation_only;
        let arbiter = Arc::new(FallbackArbiter::new(remote_available));
        let simulator = PhysicsSimulator::new(config.simulator.level_increment, config.simulator.seed);
        let remote = store.clone().map(RemoteSyncAdapter::new);
        let records = Persistence::new(store, arbiter.clone(), config.store.history_limit);

        let inner = Arc::new_cyclic(|self_ref| HubInner {
            self_ref: self_ref.clone(),
            config,
            arbiter,
            simulator: Mutex::new(simulator),
            remote,
            listeners: Arc::new(ObserverRegistry::new()),
            delivery: ReentrantMutex::new(()),
            ticker: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            records,
            bus: Arc::new(EventBus::default()),
        });

        Self { inner }
    }

    /// Start the active source. Repeated calls are no-ops until [`cleanup`].
    ///
    /// [`cleanup`]: SmartBinHub::cleanup
    pub fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            debug!("Hub already initialized");
            return;
        }

        match self.inner.active_remote() {
            Some(adapter) => {
                info!("Initializing on the remote store");
                let sink: Weak<dyn SyncSink> = self.inner.self_ref.clone();
                let attached = adapter.attach(sink);
                self.inner.subscriptions.lock().extend(attached);
            }
            None => {
                info!("Initializing on the physics simulator");
                self.inner.start_ticker();
            }
        }
    }

    /// Stop the ticker, release remote subscriptions and drop all listeners.
    ///
    /// No listener registered before this call is notified afterwards.
    pub fn cleanup(&self) {
        let _delivery = self.inner.delivery.lock();

        self.inner.listeners.clear();
        self.inner.stop_ticker();

        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        if !subscriptions.is_empty() {
            info!("Releasing {} remote subscriptions", subscriptions.len());
        }
        for subscription in &subscriptions {
            subscription.cancel();
        }

        self.inner.initialized.store(false, Ordering::Release);
    }

    /// Register `callback` and invoke it once with the current snapshot
    /// before any later update.
    pub fn subscribe<F>(&self, callback: F) -> Unsubscribe<SensorState>
    where
        F: Fn(&SensorState) + Send + Sync + 'static,
    {
        let _delivery = self.inner.delivery.lock();
        let listener: Listener<SensorState> = Arc::new(callback);
        let id = self.inner.listeners.register(listener.clone());
        listener(&self.inner.snapshot());
        Unsubscribe::new(&self.inner.listeners, id)
    }

    pub fn snapshot(&self) -> SensorState {
        self.inner.snapshot()
    }

    /// Apply a command given by its wire tag. Unknown tags return `false`
    /// without side effects.
    pub async fn send_command(&self, tag: &str) -> bool {
        match Command::parse(tag) {
            Some(command) => self.send(command).await,
            None => {
                warn!("Unrecognized command: {}", tag);
                false
            }
        }
    }

    /// Apply `command` against the active source.
    pub async fn send(&self, command: Command) -> bool {
        let Some(adapter) = self.inner.active_remote() else {
            self.inner.perturb_simulator(|sim| sim.apply(command));
            debug!("Applied {} to the simulator", command);
            self.inner.bus.publish_notice(NoticePayload::CommandApplied {
                command,
                mode: SourceMode::Fallback,
            });
            return true;
        };

        match adapter.send_command(command).await {
            Ok(target) => {
                info!("Sent {} (target {})", command, target);
                self.inner
                    .records
                    .log_event(command.tag(), EventKind::Command, None)
                    .await;
                self.inner.bus.publish_notice(NoticePayload::CommandApplied {
                    command,
                    mode: SourceMode::Live,
                });
                true
            }
            Err(e) => {
                error!("Failed to send {}: {}", command, e);
                self.inner.bus.publish_notice(NoticePayload::CommandFailed {
                    command,
                    message: e.to_string(),
                });
                false
            }
        }
    }

    /// Add 30 to the fill level, capped at 100.
    pub async fn fill_quickly(&self) -> bool {
        match self.inner.active_remote() {
            Some(adapter) => log_write("fill_quickly", adapter.fill_quickly().await),
            None => {
                self.inner.perturb_simulator(PhysicsSimulator::fill_quickly);
                true
            }
        }
    }

    /// Add 200 to the gas reading, capped at 600.
    pub async fn gas_spike(&self) -> bool {
        match self.inner.active_remote() {
            Some(adapter) => log_write("gas_spike", adapter.gas_spike().await),
            None => {
                self.inner.perturb_simulator(PhysicsSimulator::gas_spike);
                true
            }
        }
    }

    /// Restore baseline values on the simulator, or re-seed the remote store.
    pub async fn reset(&self) -> bool {
        if self.inner.active_remote().is_some() {
            return self.inner.records.seed_database().await;
        }
        self.inner.perturb_simulator(|sim| sim.reset(now_millis()));
        info!("Simulator reset to baseline");
        self.inner.bus.publish_notice(NoticePayload::SimulationReset);
        true
    }

    pub async fn seed_database(&self) -> bool {
        self.inner.records.seed_database().await
    }

    pub fn is_simulation_mode(&self) -> bool {
        self.inner.arbiter.is_fallback()
    }

    pub fn mode(&self) -> SourceMode {
        self.inner.arbiter.mode()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Event, alert and threshold records, routed like telemetry
    pub fn records(&self) -> Persistence {
        self.inner.records.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.inner.bus.clone()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

fn log_write(operation: &str, result: Result<(), StoreError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            error!("{} failed: {}", operation, e);
            false
        }
    }
}

impl HubInner {
    fn active_remote(&self) -> Option<Arc<RemoteSyncAdapter>> {
        match self.arbiter.mode() {
            SourceMode::Live => self.remote.clone(),
            SourceMode::Fallback => None,
        }
    }

    fn snapshot(&self) -> SensorState {
        match self.active_remote() {
            Some(adapter) => adapter.snapshot(),
            None => self.simulator.lock().snapshot(),
        }
    }

    fn fan_out(&self, snapshot: &SensorState) {
        self.listeners.notify(snapshot);
    }

    /// Mutate the simulator and publish the result as one step.
    fn perturb_simulator(&self, change: impl FnOnce(&mut PhysicsSimulator)) {
        let _delivery = self.delivery.lock();
        let snapshot = {
            let mut simulator = self.simulator.lock();
            change(&mut simulator);
            simulator.snapshot()
        };
        self.fan_out(&snapshot);
    }

    fn tick(&self) {
        self.perturb_simulator(|sim| sim.tick(now_millis()));
    }

    fn start_ticker(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                error!("No tokio runtime available, simulator ticker not started");
                return;
            }
        };

        let period = Duration::from_millis(self.config.simulator.tick_ms.max(1));
        let hub = self.self_ref.clone();
        *ticker = Some(handle.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(hub) = hub.upgrade() else {
                    break;
                };
                hub.tick();
            }
        }));

        info!("Simulator started ({} ms period)", period.as_millis());
    }

    fn stop_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
            info!("Simulator stopped");
        }
    }
}

impl SyncSink for HubInner {
    fn publish_remote(&self, update: &dyn Fn() -> Option<SensorState>) {
        let _delivery = self.delivery.lock();
        if self.arbiter.is_fallback() {
            return;
        }
        if let Some(snapshot) = update() {
            self.fan_out(&snapshot);
        }
    }

    fn remote_failed(&self, path: &str, error: StoreError) {
        let reason = format!("{path}: {error}");
        if !self.arbiter.trip(&reason) {
            return;
        }

        self.bus.publish_notice(NoticePayload::SourceSwitched {
            from: SourceMode::Live,
            to: SourceMode::Fallback,
            reason,
        });
        self.start_ticker();

        // Listeners move to the simulator's stream right away
        let _delivery = self.delivery.lock();
        let snapshot = self.simulator.lock().snapshot();
        self.fan_out(&snapshot);
    }
}

impl Drop for HubInner {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Notice;
    use crate::sensors::{BASELINE_LEVEL, BASELINE_PPM};
    use crate::store::{paths, MemoryStore};
    use serde_json::json;

    fn sim_config() -> Config {
        let mut config = Config::default();
        config.simulator.seed = Some(7);
        config
    }

    fn sim_hub() -> SmartBinHub {
        SmartBinHub::new(sim_config(), None)
    }

    fn live_hub() -> (Arc<MemoryStore>, SmartBinHub) {
        let store = Arc::new(MemoryStore::new());
        let hub = SmartBinHub::new(sim_config(), Some(store.clone()));
        (store, hub)
    }

    fn recorder(hub: &SmartBinHub) -> (Arc<Mutex<Vec<SensorState>>>, Unsubscribe<SensorState>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = hub.subscribe(move |s: &SensorState| sink.lock().push(s.clone()));
        (seen, handle)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Notice>) -> Vec<NoticePayload> {
        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice.payload);
        }
        notices
    }

    #[tokio::test]
    async fn test_cold_start_without_store() {
        let hub = sim_hub();
        assert!(hub.is_simulation_mode());
        hub.initialize();

        let (seen, _handle) = recorder(&hub);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let first = &seen[0];
        assert_eq!(first.level, BASELINE_LEVEL);
        assert_eq!(first.ppm, BASELINE_PPM);
        assert!(!first.lid_open);
        assert!(!first.fan_on);
        assert_eq!(first.temperature, 22.0);
        assert_eq!(first.humidity, 45.0);
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_simulation_only_ignores_store() {
        let store = Arc::new(MemoryStore::new());
        let mut config = sim_config();
        config.simulation_only = true;
        let hub = SmartBinHub::new(config, Some(store.clone()));
        hub.initialize();

        assert_eq!(hub.mode(), SourceMode::Fallback);
        assert_eq!(store.watcher_count(paths::FILL_LEVEL), 0);
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_toggle_lid_twice() {
        let hub = sim_hub();
        let (seen, _handle) = recorder(&hub);

        assert!(hub.send_command("toggleLid").await);
        assert!(hub.snapshot().lid_open);
        assert!(hub.send_command("toggleLid").await);
        assert!(!hub.snapshot().lid_open);

        let lids: Vec<bool> = seen.lock().iter().map(|s| s.lid_open).collect();
        assert_eq!(lids, vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_unknown_command_has_no_effect() {
        let hub = sim_hub();
        let (seen, _handle) = recorder(&hub);
        let before = hub.snapshot();

        assert!(!hub.send_command("doBarrelRoll").await);
        assert_eq!(hub.snapshot(), before);
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_cleanup_are_idempotent() {
        let hub = sim_hub();
        hub.initialize();
        let (seen, handle) = recorder(&hub);
        let (_other, _other_handle) = recorder(&hub);
        assert_eq!(hub.listener_count(), 2);

        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());
        assert_eq!(hub.listener_count(), 1);

        hub.send_command("fanOn").await;
        assert_eq!(seen.lock().len(), 1);

        hub.cleanup();
        hub.cleanup();
        assert_eq!(hub.listener_count(), 0);
        assert!(!hub.is_initialized());
    }

    #[tokio::test]
    async fn test_no_delivery_after_cleanup() {
        let hub = sim_hub();
        hub.initialize();
        let (seen, _handle) = recorder(&hub);
        hub.cleanup();

        hub.gas_spike().await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_debug_operations_on_simulator() {
        let hub = sim_hub();
        assert!(hub.fill_quickly().await);
        assert!(hub.fill_quickly().await);
        assert!(hub.fill_quickly().await);
        assert_eq!(hub.snapshot().level, 100.0);

        assert!(hub.gas_spike().await);
        assert!(hub.gas_spike().await);
        assert!(hub.gas_spike().await);
        assert_eq!(hub.snapshot().ppm, 600.0);

        let mut notices = hub.event_bus().subscribe_notices();
        assert!(hub.reset().await);
        let state = hub.snapshot();
        assert_eq!(state.level, BASELINE_LEVEL);
        assert_eq!(state.ppm, BASELINE_PPM);
        assert!(matches!(drain(&mut notices)[..], [NoticePayload::SimulationReset]));
    }

    #[tokio::test]
    async fn test_listener_may_reenter_hub() {
        let hub = sim_hub();
        let reentrant = hub.clone();
        let reads = Arc::new(Mutex::new(0));
        let counter = reads.clone();
        let _handle = hub.subscribe(move |_: &SensorState| {
            let _ = reentrant.snapshot();
            *counter.lock() += 1;
        });
        hub.send_command("fanOn").await;
        assert_eq!(*reads.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_publishes_on_period() {
        let hub = sim_hub();
        hub.initialize();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _handle = hub.subscribe(move |s: &SensorState| {
            let _ = tx.send(s.level);
        });

        assert_eq!(rx.recv().await, Some(BASELINE_LEVEL));
        let before = tokio::time::Instant::now();
        let ticked = rx.recv().await.unwrap();
        assert!(before.elapsed() >= Duration::from_millis(2000));
        assert!(ticked > BASELINE_LEVEL);

        hub.initialize();
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_live_updates_from_store() {
        let (store, hub) = live_hub();
        store.set(paths::FILL_LEVEL, json!(10)).await.unwrap();
        hub.initialize();
        assert_eq!(hub.mode(), SourceMode::Live);

        let (seen, _handle) = recorder(&hub);
        assert_eq!(seen.lock()[0].level, 10.0);

        store
            .set(paths::AIR_QUALITY, json!({"value": 120, "timestamp": 1}))
            .await
            .unwrap();
        store.set(paths::LID_STATUS, json!(true)).await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].ppm, 120.0);
        assert_eq!(seen[1].ppm_history.latest(), Some(120.0));
        assert!(seen[2].lid_open);
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_live_command_writes_and_logs() {
        let (store, hub) = live_hub();
        hub.initialize();
        let (seen, _handle) = recorder(&hub);

        assert!(hub.send_command("toggleFan").await);
        assert_eq!(store.value(paths::FAN_STATUS).unwrap()["status"], true);
        assert!(hub.snapshot().fan_on);
        assert!(seen.lock().last().unwrap().fan_on);

        let events = hub.records().get_event_history().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "toggleFan");
        assert_eq!(events[0].kind, EventKind::Command);
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_live_write_failure_returns_false() {
        let (store, hub) = live_hub();
        hub.initialize();
        let mut notices = hub.event_bus().subscribe_notices();
        store.set_writes_failing(true);

        assert!(!hub.send_command("openLid").await);
        assert!(!hub.snapshot().lid_open);
        assert!(!hub.fill_quickly().await);
        assert_eq!(hub.mode(), SourceMode::Live);
        assert!(matches!(drain(&mut notices)[..], [NoticePayload::CommandFailed { .. }]));
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_subscription_error_switches_to_fallback() {
        let (store, hub) = live_hub();
        store.set(paths::FILL_LEVEL, json!(70)).await.unwrap();
        hub.initialize();
        let mut notices = hub.event_bus().subscribe_notices();
        let (seen, _handle) = recorder(&hub);

        store.fail_path(paths::AIR_QUALITY, StoreError::Unavailable);
        assert!(hub.is_simulation_mode());

        // Replay from the remote cache, then the simulator's snapshot
        {
            let seen = seen.lock();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0].level, 70.0);
            assert_eq!(seen[1].level, BASELINE_LEVEL);
        }
        assert!(matches!(
            drain(&mut notices)[..],
            [NoticePayload::SourceSwitched { to: SourceMode::Fallback, .. }]
        ));

        // Remote writes no longer reach listeners
        store.set(paths::FILL_LEVEL, json!(90)).await.unwrap();
        assert_eq!(seen.lock().len(), 2);

        // A second failure does not switch again
        store.fail_path(paths::FILL_LEVEL, StoreError::Unavailable);
        assert!(drain(&mut notices).is_empty());

        assert!(hub.send_command("openLid").await);
        assert!(hub.snapshot().lid_open);
        assert_eq!(store.value(paths::LID_OPEN), None);
        hub.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_starts_ticker() {
        let (store, hub) = live_hub();
        hub.initialize();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _handle = hub.subscribe(move |s: &SensorState| {
            let _ = tx.send(s.level);
        });
        assert_eq!(rx.recv().await, Some(0.0));

        store.fail_path(paths::FILL_LEVEL, StoreError::Unavailable);
        assert_eq!(rx.recv().await, Some(BASELINE_LEVEL));

        let ticked = rx.recv().await.unwrap();
        assert!(ticked > BASELINE_LEVEL);
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_cleanup_inside_listener_stops_round() {
        let hub = sim_hub();
        let inner = hub.clone();
        let _first = hub.subscribe(move |s: &SensorState| {
            if s.fan_on {
                inner.cleanup();
            }
        });
        let (seen, _second) = recorder(&hub);

        hub.send_command("fanOn").await;
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_denied_path_at_initialize() {
        let (store, hub) = live_hub();
        store.deny(paths::HUMIDITY);
        hub.initialize();

        assert!(hub.is_simulation_mode());
        let (seen, _handle) = recorder(&hub);
        assert_eq!(seen.lock()[0].ppm, BASELINE_PPM);

        hub.cleanup();
        assert_eq!(store.watcher_count(paths::FILL_LEVEL), 0);
    }

    #[tokio::test]
    async fn test_cleanup_releases_subscriptions() {
        let (store, hub) = live_hub();
        hub.initialize();
        hub.initialize();
        assert_eq!(store.watcher_count(paths::FILL_LEVEL), 1);

        hub.cleanup();
        assert_eq!(store.watcher_count(paths::FILL_LEVEL), 0);
        assert_eq!(store.watcher_count(paths::FAN_STATUS), 0);

        hub.initialize();
        assert_eq!(store.watcher_count(paths::FILL_LEVEL), 1);
        hub.cleanup();
    }

    #[tokio::test]
    async fn test_remote_reset_seeds() {
        let (store, hub) = live_hub();
        hub.initialize();
        assert!(hub.reset().await);
        assert_eq!(hub.snapshot().level, 25.0);
        assert_eq!(store.value(paths::AIR_QUALITY).unwrap()["value"], 75.0);
        hub.cleanup();
    }
}
