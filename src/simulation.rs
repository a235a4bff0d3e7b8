//! Stand-in amplifier for running without hardware.
//!
//! Answers `get_state`, `start_test` and `stop_test` with canned snapshots the
//! moment they are sent; every other action is swallowed. Responses are queued
//! on the transport itself, so the next poll delivers them without any I/O.

use anyhow::Result;
use log::info;
use serde_json::{json, Value};
use std::collections::VecDeque;

use crate::protocol::{Action, Request};
use crate::traits::Transport;

#[derive(Debug, Default)]
pub struct SimulatedAmp {
    outbox: VecDeque<String>,
    sent: Vec<Request>,
}

impl SimulatedAmp {
    pub fn new() -> Self {
        info!("[SIM] No amplifier reachable: answering locally");
        Self::default()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> &[Request] {
        &self.sent
    }

    /// Canned answer for a request, or None for actions the simulator ignores.
    pub fn respond(request: &Request) -> Option<Value> {
        match request.action {
            Action::StartTest => Some(json!({
                "ab_test": {
                    "preset_a": request.value.get("preset_a").cloned().unwrap_or(Value::Null),
                    "preset_b": request.value.get("preset_b").cloned().unwrap_or(Value::Null),
                    "is_running": true,
                    "is_finished": false
                }
            })),
            Action::StopTest => Some(json!({
                "ab_test": {
                    "is_running": false,
                    "is_finished": true
                }
            })),
            Action::GetState => Some(json!({
                "amp_state": {
                    "filter_name": "test mode",
                    "is_muted": false,
                    "preset": 1,
                    "eq_on": [false, true, true],
                    "preset_source": [4, 1, 0],
                    "current_source": 2,
                    "volume_db": -42
                }
            })),
            _ => None,
        }
    }
}

impl Transport for SimulatedAmp {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let request: Request = serde_json::from_str(text)?;
        if let Some(response) = Self::respond(&request) {
            self.outbox.push_back(response.to_string());
        }
        self.sent.push(request);
        Ok(())
    }

    fn recv_text(&mut self) -> Result<Option<String>> {
        Ok(self.outbox.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Inbound;
    use crate::status::InputSource;

    #[test]
    fn test_get_state_is_answered_immediately() {
        let mut amp = SimulatedAmp::default();
        amp.send_text(&Request::bare(Action::GetState).to_json()).unwrap();

        let text = amp.recv_text().unwrap().expect("canned snapshot");
        let inbound = Inbound::from_value(&serde_json::from_str(&text).unwrap()).unwrap();
        let state = inbound.amp_state.unwrap();
        assert_eq!(state.active_preset, 1);
        assert!((state.volume_db - -42.0).abs() < f64::EPSILON);
        assert_eq!(state.eq_enabled, [false, true, true]);
        assert_eq!(state.live_input_source, InputSource::Rca);
        assert!(inbound.ab_test.is_none());

        assert_eq!(amp.recv_text().unwrap(), None);
    }

    #[test]
    fn test_start_test_echoes_presets() {
        let req = Request::new(
            Action::StartTest,
            json!({ "preset_a": 2, "preset_b": 3, "min_time": 5, "max_time": 10 }),
        );
        let resp = SimulatedAmp::respond(&req).unwrap();
        assert_eq!(resp["ab_test"]["preset_a"], 2);
        assert_eq!(resp["ab_test"]["preset_b"], 3);
        assert_eq!(resp["ab_test"]["is_running"], true);
    }

    #[test]
    fn test_stop_test_reports_finished() {
        let resp = SimulatedAmp::respond(&Request::bare(Action::StopTest)).unwrap();
        assert_eq!(resp["ab_test"]["is_finished"], true);
        assert_eq!(resp["ab_test"]["is_running"], false);
    }

    #[test]
    fn test_other_actions_are_swallowed_but_recorded() {
        let mut amp = SimulatedAmp::default();
        amp.send_text(&Request::new(Action::SetMute, true.into()).to_json()).unwrap();
        amp.send_text(&Request::new(Action::SetPreset, 2.into()).to_json()).unwrap();

        assert_eq!(amp.recv_text().unwrap(), None);
        assert_eq!(amp.requests().len(), 2);
        assert_eq!(amp.requests()[1].action, Action::SetPreset);
    }
}
