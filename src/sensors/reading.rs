// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Canonical sensor state and chart histories

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::detection::{AirQualityStatus, BinStatus, LevelStatus, ThresholdConfig};

/// Number of samples kept per chart history
pub const HISTORY_LEN: usize = 20;

/// Fixed-length sample window, most recent last.
///
/// Always holds exactly [`HISTORY_LEN`] samples; [`History::push`] appends and
/// evicts the oldest in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct History(VecDeque<f64>);

impl History {
    /// Window where every slot holds `value`
    pub fn filled(value: f64) -> Self {
        Self(std::iter::repeat(value).take(HISTORY_LEN).collect())
    }

    pub fn push(&mut self, value: f64) {
        self.0.pop_front();
        self.0.push_back(value);
    }

    pub fn latest(&self) -> Option<f64> {
        self.0.back().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.iter().copied().collect()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::filled(0.0)
    }
}

// Pads with the oldest sample (or zero) and keeps only the newest samples so
// deserialized windows hold the same invariant.
impl From<Vec<f64>> for History {
    fn from(mut samples: Vec<f64>) -> Self {
        if samples.len() > HISTORY_LEN {
            samples.drain(..samples.len() - HISTORY_LEN);
        }
        let pad = samples.first().copied().unwrap_or(0.0);
        let mut window: VecDeque<f64> = std::iter::repeat(pad)
            .take(HISTORY_LEN - samples.len())
            .collect();
        window.extend(samples);
        Self(window)
    }
}

impl From<History> for Vec<f64> {
    fn from(history: History) -> Self {
        history.0.into_iter().collect()
    }
}

/// Snapshot of the bin's telemetry handed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorState {
    /// Fill percentage, 0-100
    pub level: f64,
    /// Air quality in parts per million, 0-600
    pub ppm: f64,
    pub lid_open: bool,
    pub fan_on: bool,
    pub temperature: f64,
    pub humidity: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub ppm_history: History,
    pub level_history: History,
}

impl SensorState {
    /// Derive the dashboard flags for this snapshot.
    pub fn status(&self, thresholds: &ThresholdConfig) -> BinStatus {
        BinStatus {
            is_overflowing: self.level >= thresholds.level_critical,
            is_almost_full: self.level >= thresholds.level_warning,
            has_gas_warning: self.ppm >= thresholds.gas_warning,
            has_gas_danger: self.ppm >= thresholds.gas_danger,
            level_status: LevelStatus::from_level(self.level),
            air_quality_status: AirQualityStatus::from_ppm(self.ppm),
        }
    }
}
