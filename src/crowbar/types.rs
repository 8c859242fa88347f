// Copyright 2026 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Run state of a node role.
///
/// Encoded as an integer completion code on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "i64", into = "i64")]
pub enum RunState {
    /// The role has failed.
    Error,
    /// The role has completed successfully.
    Active,
    /// The role is waiting to run.
    Todo,
    /// The role is running.
    Transition,
    /// The role is waiting for its parents.
    Blocked,
    /// The role is part of uncommitted changes.
    Proposed,
    /// Reported code is not known.
    Unknown(i64),
}

impl RunState {
    /// Whether the role has completed successfully.
    #[inline]
    pub fn is_success(&self) -> bool {
        *self == RunState::Active
    }

    /// Whether the role has failed.
    #[inline]
    pub fn is_failure(&self) -> bool {
        *self == RunState::Error
    }
}

impl From<i64> for RunState {
    fn from(value: i64) -> RunState {
        match value {
            -1 => RunState::Error,
            0 => RunState::Active,
            1 => RunState::Todo,
            2 => RunState::Transition,
            3 => RunState::Blocked,
            4 => RunState::Proposed,
            other => RunState::Unknown(other),
        }
    }
}

impl From<RunState> for i64 {
    fn from(value: RunState) -> i64 {
        match value {
            RunState::Error => -1,
            RunState::Active => 0,
            RunState::Todo => 1,
            RunState::Transition => 2,
            RunState::Blocked => 3,
            RunState::Proposed => 4,
            RunState::Unknown(other) => other,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Error => f.write_str("error"),
            RunState::Active => f.write_str("active"),
            RunState::Todo => f.write_str("todo"),
            RunState::Transition => f.write_str("transition"),
            RunState::Blocked => f.write_str("blocked"),
            RunState::Proposed => f.write_str("proposed"),
            RunState::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

protocol_enum! {
    /// Power action to request on a node.
    enum PowerAction {
        /// Power on.
        On = "on",
        /// Graceful power off.
        Off = "off",
        /// Reboot.
        Reboot = "reboot",
        /// Hard reset.
        Reset = "reset",
        /// Halt immediately.
        Halt = "halt"
    }
}
