// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Serial gateway bridge
//!
//! The microcontroller prints one JSON object per line, e.g.
//! `{"fill_level": 42, "air_quality": 180}`. Each usable line becomes a
//! write of the present fields into `sensors/*`.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

use crate::core::now_millis;
use crate::error::StoreError;
use crate::store::{paths, RemoteStore};

/// Fields extracted from one device line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeUpdate {
    pub fill_level: Option<f64>,
    pub air_quality: Option<f64>,
}

/// What the bridge made of one line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Empty or not a JSON object
    Ignored,
    /// Valid JSON without any expected field
    MissingFields,
    Update(BridgeUpdate),
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Classify one device line.
pub fn parse_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Ignored;
    }
    let Ok(Value::Object(data)) = serde_json::from_str::<Value>(line) else {
        return LineOutcome::Ignored;
    };

    let update = BridgeUpdate {
        fill_level: data.get("fill_level").and_then(numeric),
        air_quality: data.get("air_quality").and_then(numeric),
    };
    if update.fill_level.is_none() && update.air_quality.is_none() {
        return LineOutcome::MissingFields;
    }
    LineOutcome::Update(update)
}

/// Forwards device lines into the remote store
pub struct SerialBridge {
    store: Arc<dyn RemoteStore>,
}

impl SerialBridge {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Parse `line` and write whatever it carries. Write failures are logged.
    pub async fn handle_line(&self, line: &str) -> LineOutcome {
        let outcome = parse_line(line);
        match &outcome {
            LineOutcome::Ignored => {
                if !line.trim().is_empty() {
                    debug!("Ignoring non-JSON line: {}", line.trim());
                }
            }
            LineOutcome::MissingFields => {
                warn!("Line has neither fill_level nor air_quality: {}", line.trim());
            }
            LineOutcome::Update(update) => match self.write(update).await {
                Ok(()) => debug!("Synced {:?}", update),
                Err(e) => error!("Failed to sync line: {}", e),
            },
        }
        outcome
    }

    async fn write(&self, update: &BridgeUpdate) -> Result<(), StoreError> {
        if let Some(level) = update.fill_level {
            self.store.set(paths::FILL_LEVEL, json!(level)).await?;
        }
        if let Some(ppm) = update.air_quality {
            self.store.set(paths::AIR_QUALITY, json!(ppm)).await?;
        }
        self.store.set(paths::LAST_UPDATE, json!(now_millis())).await
    }

    /// Consume `reader` line by line until it ends. Returns the number of
    /// lines that produced an update.
    pub async fn run<R>(&self, reader: R) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut updates = 0;
        while let Some(line) = lines.next_line().await? {
            if let LineOutcome::Update(_) = self.handle_line(line.trim_end_matches('\r')).await {
                updates += 1;
            }
        }
        info!("Line source closed after {} updates", updates);
        Ok(updates)
    }

    /// Read lines from a serial port until it closes or fails.
    #[cfg(feature = "serial")]
    pub async fn run_serial(&self, port: &str, baud_rate: u32) -> Result<usize> {
        use std::io::{BufRead, BufReader, ErrorKind};
        use std::time::Duration;

        let serial = serialport::new(port, baud_rate)
            .timeout(Duration::from_millis(500))
            .open()?;
        info!("Serial port {} open at {} baud", port, baud_rate);

        let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(64);
        let reader = tokio::task::spawn_blocking(move || {
            let mut reader = BufReader::new(serial);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.blocking_send(line.clone()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                    Err(e) => {
                        error!("Serial read failed: {}", e);
                        break;
                    }
                }
            }
        });

        let mut updates = 0;
        while let Some(line) = rx.recv().await {
            if let LineOutcome::Update(_) = self.handle_line(line.trim_end()).await {
                updates += 1;
            }
        }
        reader.await?;
        warn!("Serial connection closed");
        Ok(updates)
    }
}
