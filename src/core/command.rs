// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Actuator command vocabulary

use std::fmt;

use serde::{Deserialize, Serialize};

/// Actuator a command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actuator {
    Lid,
    Fan,
}

/// Operator command accepted by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    OpenLid,
    CloseLid,
    ToggleLid,
    FanOn,
    FanOff,
    ToggleFan,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::OpenLid,
        Command::CloseLid,
        Command::ToggleLid,
        Command::FanOn,
        Command::FanOff,
        Command::ToggleFan,
    ];

    /// Parse a wire tag such as `"toggleLid"`. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Command::OpenLid => "openLid",
            Command::CloseLid => "closeLid",
            Command::ToggleLid => "toggleLid",
            Command::FanOn => "fanOn",
            Command::FanOff => "fanOff",
            Command::ToggleFan => "toggleFan",
        }
    }

    pub fn actuator(&self) -> Actuator {
        match self {
            Command::OpenLid | Command::CloseLid | Command::ToggleLid => Actuator::Lid,
            Command::FanOn | Command::FanOff | Command::ToggleFan => Actuator::Fan,
        }
    }

    /// New actuator value given its current one.
    pub fn resolve(&self, current: bool) -> bool {
        match self {
            Command::OpenLid | Command::FanOn => true,
            Command::CloseLid | Command::FanOff => false,
            Command::ToggleLid | Command::ToggleFan => !current,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
