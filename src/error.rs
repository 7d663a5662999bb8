// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Error types

/// Failures reported by a [`RemoteStore`](crate::store::RemoteStore)
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("remote store unavailable")]
    Unavailable,

    #[error("permission denied on path: {path}")]
    PermissionDenied { path: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Threshold configuration rejected before persisting
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("gas warning threshold ({warning}) must be below gas danger threshold ({danger})")]
    GasOrder { warning: f64, danger: f64 },

    #[error("level warning threshold ({warning}) must be below level critical threshold ({critical})")]
    LevelOrder { warning: f64, critical: f64 },

    #[error("threshold '{0}' is not a finite number")]
    NotFinite(&'static str),
}
