//! Streaming module - feeds that write into the remote store

mod bridge;
mod demo;

pub use bridge::{parse_line, BridgeUpdate, LineOutcome, SerialBridge};
pub use demo::{DemoFeeder, DemoState};
