//! State Synchronizer - single owner of `DeviceState`
//!
//! Inbound: each message is a snapshot. A device section replaces the whole
//! `DeviceState` (no field merging); the test section, or its absence, replaces
//! the test visibility. Outbound: user intents become `{action, value}` requests
//! on the channel. The active preset only ever changes through a snapshot.

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::channel::ChannelManager;
use crate::protocol::{Action, Inbound, Request, StartTestParams};
use crate::scheduler::Scheduler;
use crate::status::{AbTestStatus, DeviceState, InputSource, PresetId};
use crate::traits::Transport;

/// What one inbound message changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncUpdate {
    pub device_replaced: bool,
    /// (old, new) when the active preset moved.
    pub preset_changed: Option<(PresetId, PresetId)>,
    /// Test section as carried by the message.
    pub ab_test: Option<AbTestStatus>,
}

pub struct Synchronizer<T: Transport> {
    channel: ChannelManager<T>,
    device: DeviceState,
    ab_test: Option<AbTestStatus>,
}

impl<T: Transport> Synchronizer<T> {
    pub fn new(channel: ChannelManager<T>) -> Self {
        Synchronizer {
            channel,
            device: DeviceState::default(),
            ab_test: None,
        }
    }

    pub fn channel(&self) -> &ChannelManager<T> {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut ChannelManager<T> {
        &mut self.channel
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn active_preset(&self) -> PresetId {
        self.device.active_preset
    }

    pub fn ab_test(&self) -> Option<&AbTestStatus> {
        self.ab_test.as_ref()
    }

    /// Drains the channel. Returns the raw inbound values, in arrival order.
    pub fn poll(&mut self, now_ms: u64, scheduler: &mut Scheduler) -> Vec<Value> {
        self.channel.poll(now_ms, scheduler)
    }

    pub fn apply_inbound(&mut self, message: &Value) -> SyncUpdate {
        let inbound = match Inbound::from_value(message) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("[SYNC] Ignoring unreadable snapshot ({}): {}", e, message);
                return SyncUpdate::default();
            }
        };

        let mut update = SyncUpdate::default();

        if let Some(device) = inbound.amp_state {
            let old = self.device.active_preset;
            self.device = device;
            update.device_replaced = true;

            if old != self.device.active_preset {
                info!("[SYNC] Active preset {} -> {}", old, self.device.active_preset);
                update.preset_changed = Some((old, self.device.active_preset));
            }
        }

        if inbound.ab_test != self.ab_test {
            debug!("[SYNC] Test section {:?} -> {:?}", self.ab_test, inbound.ab_test);
        }
        self.ab_test = inbound.ab_test;
        update.ab_test = self.ab_test.clone();

        update
    }

    /// Serializes `value` and sends it as `action`. Returns true if it went out.
    pub fn issue<V: Serialize>(&mut self, action: Action, value: V) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("[SYNC] Cannot encode value for {:?}: {}", action, e);
                return false;
            }
        };
        self.channel.send(&Request::new(action, value))
    }

    fn issue_bare(&mut self, action: Action) -> bool {
        self.channel.send(&Request::bare(action))
    }

    pub fn request_state(&mut self) -> bool {
        self.issue_bare(Action::GetState)
    }

    /// Asks the device to switch. The indicator moves when the snapshot confirms.
    pub fn set_preset(&mut self, preset: PresetId) -> bool {
        self.issue(Action::SetPreset, preset)
    }

    pub fn set_mute(&mut self, muted: bool) -> bool {
        self.issue(Action::SetMute, muted)
    }

    pub fn set_volume(&mut self, volume_db: i32) -> bool {
        self.issue(Action::SetVolume, volume_db)
    }

    pub fn set_eq(&mut self, preset: PresetId, enabled: bool) -> bool {
        match Action::set_eq(preset) {
            Some(action) => self.issue(action, enabled),
            None => {
                warn!("[SYNC] No EQ for preset {}", preset);
                false
            }
        }
    }

    pub fn set_source(&mut self, preset: PresetId, source: InputSource) -> bool {
        match Action::set_source(preset) {
            Some(action) => self.issue(action, u8::from(source)),
            None => {
                warn!("[SYNC] No source routing for preset {}", preset);
                false
            }
        }
    }

    pub fn start_test(&mut self, params: StartTestParams) -> bool {
        self.issue(Action::StartTest, params)
    }

    pub fn stop_test(&mut self) -> bool {
        self.issue_bare(Action::StopTest)
    }

    pub fn reset_test(&mut self) -> bool {
        self.issue_bare(Action::ResetTest)
    }

    pub fn disable_test_mode(&mut self) -> bool {
        self.issue_bare(Action::DisableTestMode)
    }
}
