//! Core module - the sync hub and the pieces it coordinates

mod arbiter;
mod command;
mod event_bus;
mod hub;
mod observers;

pub use arbiter::{FallbackArbiter, SourceMode};
pub use command::{Actuator, Command};
pub use event_bus::{EventBus, Notice, NoticePayload};
pub use hub::SmartBinHub;
pub use observers::{Listener, ListenerId, ObserverRegistry, Unsubscribe};

use chrono::Utc;

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
