// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Demo hardware feeder
//!
//! Stands in for the microcontroller during presentations: writes a slowly
//! filling bin into the remote store so the live path has data to show.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::prelude::*;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use crate::config::DemoConfig;
use crate::core::now_millis;
use crate::error::StoreError;
use crate::store::{paths, RemoteStore};

const SOURCE_TAG: &str = "demo_simulator";

/// Values the feeder writes on each step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoState {
    pub level: f64,
    pub ppm: f64,
}

impl Default for DemoState {
    fn default() -> Self {
        Self { level: 0.0, ppm: 50.0 }
    }
}

impl DemoState {
    /// Advance one step: the bin fills by `level_step`, wraps back to empty
    /// past 100%, and gas builds up once it is more than 80% full.
    pub fn step(&mut self, level_step: f64, rng: &mut impl Rng) {
        self.level += level_step;

        if self.level > 100.0 {
            self.level = 0.0;
            self.ppm = 50.0;
            info!("Demo cycle restarted");
        }

        if self.level > 80.0 {
            let increase = rng.gen_range(20..70) as f64;
            self.ppm = (self.ppm + increase).min(500.0);
        } else {
            let drift = rng.gen_range(-3..7) as f64;
            self.ppm = (self.ppm + drift).clamp(40.0, 150.0);
        }
    }
}

/// Periodic writer of demo sensor values
pub struct DemoFeeder {
    store: Option<Arc<dyn RemoteStore>>,
    config: DemoConfig,
    state: Arc<Mutex<DemoState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DemoFeeder {
    pub fn new(store: Option<Arc<dyn RemoteStore>>, config: DemoConfig) -> Self {
        Self {
            store,
            config,
            state: Arc::new(Mutex::new(DemoState::default())),
            task: Mutex::new(None),
        }
    }

    /// Start writing. Returns `false` when no store is configured or the
    /// feeder is already running. Must be called inside a tokio runtime.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("Demo feeder already running");
            return false;
        }
        let Some(store) = self.store.clone() else {
            error!("Cannot start demo feeder: no remote store");
            return false;
        };
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                error!("Cannot start demo feeder outside a tokio runtime");
                return false;
            }
        };

        let period = Duration::from_millis(self.config.interval_ms.max(1));
        let level_step = self.config.level_step;
        let state = self.state.clone();

        *task = Some(handle.spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let current = {
                    let mut state = state.lock();
                    state.step(level_step, &mut rng);
                    *state
                };
                match write_state(store.as_ref(), &current).await {
                    Ok(()) => debug!("Demo: level={}%, ppm={}", current.level, current.ppm),
                    Err(e) => warn!("Demo write failed: {}", e),
                }
            }
        }));

        info!("Demo feeder started ({} ms period)", period.as_millis());
        true
    }

    /// Returns whether the feeder was running.
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(task) => {
                task.abort();
                info!("Demo feeder stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    pub fn state(&self) -> DemoState {
        *self.state.lock()
    }
}

impl Drop for DemoFeeder {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn write_state(store: &dyn RemoteStore, state: &DemoState) -> Result<(), StoreError> {
    store
        .set(
            paths::FILL_LEVEL,
            json!({ "value": state.level, "timestamp": now_millis(), "source": SOURCE_TAG }),
        )
        .await?;
    store
        .set(
            paths::AIR_QUALITY,
            json!({ "value": state.ppm, "timestamp": now_millis(), "source": SOURCE_TAG }),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_step_fills_and_wraps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = DemoState::default();

        for _ in 0..16 {
            state.step(5.0, &mut rng);
            assert!((40.0..=150.0).contains(&state.ppm));
        }
        assert_eq!(state.level, 80.0);

        for _ in 0..4 {
            state.step(5.0, &mut rng);
        }
        assert_eq!(state.level, 100.0);
        assert!(state.ppm <= 500.0);
        assert!(state.ppm > 40.0 + 4.0 * 20.0 - 1.0);

        state.step(5.0, &mut rng);
        assert_eq!(state.level, 0.0);
        assert!((47.0..=56.0).contains(&state.ppm));
    }

    #[test]
    fn test_gas_capped_when_full() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = DemoState { level: 85.0, ppm: 490.0 };
        state.step(1.0, &mut rng);
        assert_eq!(state.ppm, 500.0);
    }

    #[tokio::test]
    async fn test_start_requires_store() {
        let feeder = DemoFeeder::new(None, DemoConfig::default());
        assert!(!feeder.start());
        assert!(!feeder.is_running());
        assert!(!feeder.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feeder_writes_tagged_values() {
        let store = Arc::new(MemoryStore::new());
        let feeder = DemoFeeder::new(Some(store.clone()), DemoConfig::default());

        assert!(feeder.start());
        assert!(!feeder.start());
        assert!(feeder.is_running());

        tokio::time::sleep(Duration::from_millis(6500)).await;

        let level = store.value(paths::FILL_LEVEL).unwrap();
        assert_eq!(level["value"], 5.0);
        assert_eq!(level["source"], SOURCE_TAG);
        assert!(store.value(paths::AIR_QUALITY).is_some());

        assert!(feeder.stop());
        assert!(!feeder.stop());
        assert!(!feeder.is_running());
    }
}
