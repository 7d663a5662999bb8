// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Physics simulator for demo/offline use

use rand::prelude::*;

use super::{History, SensorState};
use crate::core::Command;

/// Default fill percentage at start or after a reset
pub const BASELINE_LEVEL: f64 = 15.0;
/// Default air quality at start or after a reset
pub const BASELINE_PPM: f64 = 50.0;
pub const BASELINE_TEMPERATURE: f64 = 22.0;
pub const BASELINE_HUMIDITY: f64 = 45.0;

const PPM_MIN: f64 = 20.0;
const PPM_MAX: f64 = 600.0;
const TEMPERATURE_RANGE: (f64, f64) = (18.0, 35.0);
const HUMIDITY_RANGE: (f64, f64) = (30.0, 80.0);

/// Discrete-time model of a filling bin
pub struct PhysicsSimulator {
    level: f64,
    ppm: f64,
    lid_open: bool,
    fan_on: bool,
    temperature: f64,
    humidity: f64,
    timestamp: i64,

    // Lid state seen by the previous tick, to detect an opening
    lid_open_at_last_tick: bool,
    level_increment: f64,
    rng: StdRng,

    ppm_history: History,
    level_history: History,
}

impl PhysicsSimulator {
    pub fn new(level_increment: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(level_increment, rng)
    }

    pub fn with_rng(level_increment: f64, rng: StdRng) -> Self {
        Self {
            level: BASELINE_LEVEL,
            ppm: BASELINE_PPM,
            lid_open: false,
            fan_on: false,
            temperature: BASELINE_TEMPERATURE,
            humidity: BASELINE_HUMIDITY,
            timestamp: crate::core::now_millis(),
            lid_open_at_last_tick: false,
            level_increment,
            rng,
            ppm_history: History::filled(BASELINE_PPM),
            level_history: History::filled(BASELINE_LEVEL),
        }
    }

    /// Gas concentration the bin settles at for a given fill level.
    pub fn base_ppm(level: f64) -> f64 {
        let mut base = 50.0;
        if level > 80.0 {
            base += (level - 80.0) * 5.0;
        }
        if level > 90.0 {
            base += (level - 90.0) * 10.0;
        }
        base
    }

    /// Advance the model by one tick.
    pub fn tick(&mut self, now: i64) {
        self.level = (self.level + self.level_increment).min(100.0);
        let base_ppm = Self::base_ppm(self.level);

        if self.lid_open && !self.lid_open_at_last_tick {
            let spike = self.rng.gen_range(80.0..=180.0);
            self.ppm = (self.ppm + spike).min(PPM_MAX);
        }
        self.lid_open_at_last_tick = self.lid_open;

        if self.fan_on {
            if self.ppm > 60.0 {
                self.ppm = (self.ppm - 25.0).max(40.0);
            }
        } else if self.ppm < base_ppm {
            self.ppm = (self.ppm + 3.0).min(base_ppm);
        } else if self.ppm > base_ppm + 20.0 {
            self.ppm = (self.ppm - 2.0).max(base_ppm);
        }

        self.ppm += self.rng.gen_range(-4.0..=4.0);
        self.ppm = self.ppm.clamp(PPM_MIN, PPM_MAX);

        self.temperature += self.rng.gen_range(-0.15..=0.15);
        self.temperature = self.temperature.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);

        self.humidity += self.rng.gen_range(-0.5..=0.5);
        self.humidity = self.humidity.clamp(HUMIDITY_RANGE.0, HUMIDITY_RANGE.1);

        self.timestamp = self.timestamp.max(now);

        self.ppm_history.push(self.ppm.round());
        self.level_history.push(self.level.round());
    }

    /// Apply an actuator command directly to the model.
    pub fn apply(&mut self, command: Command) {
        match command.actuator() {
            crate::core::Actuator::Lid => self.lid_open = command.resolve(self.lid_open),
            crate::core::Actuator::Fan => self.fan_on = command.resolve(self.fan_on),
        }
    }

    pub fn fill_quickly(&mut self) {
        self.level = (self.level + 30.0).min(100.0);
    }

    pub fn gas_spike(&mut self) {
        self.ppm = (self.ppm + 200.0).min(PPM_MAX);
    }

    /// Restore the baseline values and histories.
    pub fn reset(&mut self, now: i64) {
        self.level = BASELINE_LEVEL;
        self.ppm = BASELINE_PPM;
        self.lid_open = false;
        self.fan_on = false;
        self.temperature = BASELINE_TEMPERATURE;
        self.humidity = BASELINE_HUMIDITY;
        self.timestamp = self.timestamp.max(now);
        self.lid_open_at_last_tick = false;
        self.ppm_history = History::filled(BASELINE_PPM);
        self.level_history = History::filled(BASELINE_LEVEL);
    }

    /// Formatted snapshot: level and temperature to one decimal, ppm and
    /// humidity to integers.
    pub fn snapshot(&self) -> SensorState {
        SensorState {
            level: round_tenth(self.level),
            ppm: self.ppm.round(),
            lid_open: self.lid_open,
            fan_on: self.fan_on,
            temperature: round_tenth(self.temperature),
            humidity: self.humidity.round(),
            timestamp: self.timestamp,
            ppm_history: self.ppm_history.clone(),
            level_history: self.level_history.clone(),
        }
    }

    pub fn raw_level(&self) -> f64 {
        self.level
    }

    pub fn raw_ppm(&self) -> f64 {
        self.ppm
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
