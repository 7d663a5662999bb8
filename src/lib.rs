// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! SmartBin - IoT bin telemetry sync
//!
//! Client-side state layer for a smart waste bin: fill level, air quality,
//! lid and fan state, fed either by a realtime remote store or by a local
//! physics simulator when the store is unreachable.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SmartBinHub                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ Remote Sync  │   │  Fallback    │   │ Physics          │  │
//! │  │ Adapter      │ ← │  Arbiter     │ → │ Simulator        │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────┘  │
//! │         ↓                                      ↓             │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │        Observer registry (full snapshots, in order)    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │         ↓                    ↓                    ↓          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ Alert        │   │  Event Bus   │   │ Persistence      │  │
//! │  │ Evaluator    │ → │              │   │ (events/alerts)  │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod error;
pub mod sensors;
pub mod store;
pub mod streaming;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{Command, EventBus, SmartBinHub, SourceMode};
pub use db::{Event, EventKind, Persistence};
pub use detection::{Alert, AlertEvaluator, AlertLevel, AlertMonitor, ThresholdConfig};
pub use error::{ConfigError, StoreError};
pub use sensors::{History, SensorState};
pub use store::{MemoryStore, RemoteStore};
pub use streaming::{DemoFeeder, SerialBridge};

/// SmartBin version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SmartBin name
pub const NAME: &str = "SmartBin";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        features: enabled_features(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
    /// Enabled features
    pub features: Vec<String>,
}

fn enabled_features() -> Vec<String> {
    let mut features = vec![];

    #[cfg(feature = "serial")]
    features.push("serial".to_string());

    features
}
