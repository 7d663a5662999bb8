// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::detection::ThresholdConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level
    pub log_level: String,

    /// Never touch the remote store; run on the physics simulator only
    pub simulation_only: bool,

    /// Physics simulator configuration
    pub simulator: SimulatorConfig,

    /// Alert evaluation configuration
    pub alerts: AlertConfig,

    /// Remote store configuration
    pub store: StoreConfig,

    /// Demo hardware simulator configuration
    pub demo: DemoConfig,

    /// Serial bridge configuration
    pub bridge: BridgeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "SmartBin".to_string(),
            log_level: "info".to_string(),
            simulation_only: false,
            simulator: SimulatorConfig::default(),
            alerts: AlertConfig::default(),
            store: StoreConfig::default(),
            demo: DemoConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("smartbin"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Physics simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Tick period in milliseconds
    pub tick_ms: u64,

    /// Fill percentage added per tick
    pub level_increment: f64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 2000,
            level_increment: 0.3,
            seed: None,
        }
    }
}

/// Alert evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum time between two alerts of the same kind
    pub cooldown_ms: i64,

    /// Multiplier applied to the cooldown of the level-warning alert
    pub level_warning_cooldown_factor: i64,

    /// Thresholds used until the persisted ones are loaded
    pub thresholds: ThresholdConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 10_000,
            level_warning_cooldown_factor: 2,
            thresholds: ThresholdConfig::default(),
        }
    }
}

/// Remote store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of entries returned by the event history query
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { history_limit: 50 }
    }
}

/// Demo hardware simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Write period in milliseconds
    pub interval_ms: u64,

    /// Fill percentage added per write
    pub level_step: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            interval_ms: 6000,
            level_step: 5.0,
        }
    }
}

/// Serial bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial port the microcontroller is attached to
    pub serial_port: String,

    /// Baud rate
    pub baud_rate: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: "COM3".to_string(),
            baud_rate: 9600,
        }
    }
}
