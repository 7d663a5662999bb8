// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event bus for alerts and system notices

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::arbiter::SourceMode;
use super::command::Command;
use crate::detection::Alert;

/// System notice kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NoticePayload {
    SourceSwitched { from: SourceMode, to: SourceMode, reason: String },
    CommandApplied { command: Command, mode: SourceMode },
    CommandFailed { command: Command, message: String },
    SimulationReset,
}

/// Notice wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub id: u64,
    pub timestamp: i64,
    pub payload: NoticePayload,
}

/// Broadcast bus the UI layer listens on for toasts and banners
pub struct EventBus {
    alert_tx: broadcast::Sender<Alert>,
    notice_tx: broadcast::Sender<Notice>,
    notice_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (alert_tx, _) = broadcast::channel(capacity);
        let (notice_tx, _) = broadcast::channel(capacity);

        Self {
            alert_tx,
            notice_tx,
            notice_counter: AtomicU64::new(0),
        }
    }

    pub fn publish_alert(&self, alert: Alert) {
        let _ = self.alert_tx.send(alert);
    }

    pub fn publish_notice(&self, payload: NoticePayload) {
        let id = self.notice_counter.fetch_add(1, Ordering::Relaxed);
        let notice = Notice {
            id,
            timestamp: super::now_millis(),
            payload,
        };
        let _ = self.notice_tx.send(notice);
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alert_tx.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_are_numbered() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe_notices();

        bus.publish_notice(NoticePayload::SimulationReset);
        bus.publish_notice(NoticePayload::CommandApplied {
            command: Command::FanOn,
            mode: SourceMode::Fallback,
        });

        assert_eq!(rx.try_recv().unwrap().id, 0);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.id, 1);
        assert!(matches!(second.payload, NoticePayload::CommandApplied { command: Command::FanOn, .. }));
    }

    #[test]
    fn test_publish_without_receivers() {
        let bus = EventBus::default();
        bus.publish_notice(NoticePayload::SimulationReset);
    }
}
