// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Live/fallback source arbitration

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which upstream feeds the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Remote store subscriptions
    Live,
    /// Local physics simulator
    Fallback,
}

/// Single writer of the live/fallback decision.
///
/// `Live -> Fallback` is one-way for the arbiter's lifetime; nothing promotes
/// the remote source back automatically.
#[derive(Debug)]
pub struct FallbackArbiter {
    fallback: AtomicBool,
}

impl FallbackArbiter {
    /// Starts in `Fallback` when no remote store could be constructed.
    pub fn new(remote_available: bool) -> Self {
        if !remote_available {
            warn!("Remote store unavailable, starting on the simulator");
        }
        Self {
            fallback: AtomicBool::new(!remote_available),
        }
    }

    pub fn mode(&self) -> SourceMode {
        if self.fallback.load(Ordering::Acquire) {
            SourceMode::Fallback
        } else {
            SourceMode::Live
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.mode() == SourceMode::Fallback
    }

    /// Switch to `Fallback`. Returns `true` only for the call that performed
    /// the transition.
    pub fn trip(&self, reason: &str) -> bool {
        let switched = self
            .fallback
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if switched {
            warn!("Switching to simulator fallback: {}", reason);
        }
        switched
    }
}
