// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Alert thresholds and reading categorization

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Gas and fill thresholds, persisted at `config/thresholds`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub gas_warning: f64,
    pub gas_danger: f64,
    pub level_warning: f64,
    pub level_critical: f64,
    /// Ultrasonic range of an empty bin, in centimetres
    pub max_distance: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            gas_warning: 300.0,
            gas_danger: 400.0,
            level_warning: 80.0,
            level_critical: 95.0,
            max_distance: 100.0,
        }
    }
}

impl ThresholdConfig {
    /// Check the ordering the dashboard relies on before the config is persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("gasWarning", self.gas_warning),
            ("gasDanger", self.gas_danger),
            ("levelWarning", self.level_warning),
            ("levelCritical", self.level_critical),
            ("maxDistance", self.max_distance),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite(name));
            }
        }

        if self.gas_warning >= self.gas_danger {
            return Err(ConfigError::GasOrder {
                warning: self.gas_warning,
                danger: self.gas_danger,
            });
        }
        if self.level_warning >= self.level_critical {
            return Err(ConfigError::LevelOrder {
                warning: self.level_warning,
                critical: self.level_critical,
            });
        }
        Ok(())
    }
}

/// Fill level category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelStatus {
    Good,
    Medium,
    Warning,
    Critical,
}

impl LevelStatus {
    pub fn from_level(level: f64) -> Self {
        if level >= 95.0 {
            LevelStatus::Critical
        } else if level >= 80.0 {
            LevelStatus::Warning
        } else if level >= 50.0 {
            LevelStatus::Medium
        } else {
            LevelStatus::Good
        }
    }
}

/// Air quality category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirQualityStatus {
    Good,
    Medium,
    Warning,
    Danger,
}

impl AirQualityStatus {
    pub fn from_ppm(ppm: f64) -> Self {
        if ppm >= 400.0 {
            AirQualityStatus::Danger
        } else if ppm >= 300.0 {
            AirQualityStatus::Warning
        } else if ppm >= 150.0 {
            AirQualityStatus::Medium
        } else {
            AirQualityStatus::Good
        }
    }
}

/// Flags the dashboard derives from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinStatus {
    pub is_overflowing: bool,
    pub is_almost_full: bool,
    pub has_gas_warning: bool,
    pub has_gas_danger: bool,
    pub level_status: LevelStatus,
    pub air_quality_status: AirQualityStatus,
}
