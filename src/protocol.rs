//! Wire format of the amplifier's control socket.
//!
//! Requests are `{"action": <name>, "value": <scalar|object>}`. Inbound messages
//! are objects with an optional `amp_state` and an optional `ab_test` section.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::{AbTestStatus, DeviceState, PresetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    GetState,
    StartTest,
    StopTest,
    ResetTest,
    DisableTestMode,
    SetPreset,
    SetVolume,
    SetMute,
    SetEqP1,
    SetEqP2,
    SetEqP3,
    SetSourceP1,
    SetSourceP2,
    SetSourceP3,
}

impl Action {
    pub fn set_eq(preset: PresetId) -> Option<Action> {
        match preset {
            1 => Some(Action::SetEqP1),
            2 => Some(Action::SetEqP2),
            3 => Some(Action::SetEqP3),
            _ => None,
        }
    }

    pub fn set_source(preset: PresetId) -> Option<Action> {
        match preset {
            1 => Some(Action::SetSourceP1),
            2 => Some(Action::SetSourceP2),
            3 => Some(Action::SetSourceP3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,
    pub value: Value,
}

impl Request {
    pub fn new(action: Action, value: Value) -> Self {
        Request { action, value }
    }

    /// For actions whose value the device ignores. The device still requires
    /// the field to be present.
    pub fn bare(action: Action) -> Self {
        Request { action, value: Value::from(0) }
    }

    pub fn to_json(&self) -> String {
        // Request only holds an enum and a Value; serializing cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Payload of `start_test`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTestParams {
    pub preset_a: PresetId,
    pub preset_b: PresetId,
    #[serde(rename = "min_time")]
    pub min_duration_secs: u32,
    #[serde(rename = "max_time")]
    pub max_duration_secs: u32,
}

/// Typed view of an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Inbound {
    #[serde(default)]
    pub amp_state: Option<DeviceState>,
    #[serde(default)]
    pub ab_test: Option<AbTestStatus>,
}

impl Inbound {
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        Inbound::deserialize(value)
    }
}
