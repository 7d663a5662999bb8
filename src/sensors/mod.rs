//! Sensor module - telemetry sources and the canonical state record

mod reading;
mod remote;
mod simulator;

pub use reading::{History, SensorState, HISTORY_LEN};
pub use remote::{normalize, Field, RemoteState, RemoteSyncAdapter, Scalar, SyncSink};
pub use simulator::{
    PhysicsSimulator, BASELINE_HUMIDITY, BASELINE_LEVEL, BASELINE_PPM, BASELINE_TEMPERATURE,
};
