//! Session View Controller
//!
//! Exactly one view is active at a time. Device snapshots drive the main and
//! AB views; the ABX views only move on explicit ABX start/stop/reset. A
//! snapshot with no active preset always wins and shows the main view.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::status::{AbTestStatus, DeviceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    MainControl,
    AbControl,
    AbActive,
    AbResults,
    AbxControl,
    AbxActive,
    AbxResults,
}

impl View {
    pub fn is_abx(&self) -> bool {
        matches!(self, View::AbxControl | View::AbxActive | View::AbxResults)
    }
}

/// View implied by a device snapshot, ignoring ABX.
pub fn derive_view(device: &DeviceState, ab_test: Option<&AbTestStatus>) -> View {
    if !device.is_connected() {
        return View::MainControl;
    }
    match ab_test {
        Some(t) if t.is_running => View::AbActive,
        Some(t) if t.is_finished => View::AbResults,
        Some(_) => View::AbControl,
        None => View::MainControl,
    }
}

#[derive(Debug)]
pub struct SessionView {
    current: View,
    ui_enabled: bool,
}

impl Default for SessionView {
    fn default() -> Self {
        SessionView {
            current: View::MainControl,
            ui_enabled: false,
        }
    }
}

impl SessionView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> View {
        self.current
    }

    /// Controls are usable only with a preset active on the device.
    pub fn ui_enabled(&self) -> bool {
        self.ui_enabled
    }

    /// Makes `view` the active one. Returns true if this entered a different view.
    pub fn switch_to(&mut self, view: View) -> bool {
        if self.current == view {
            return false;
        }
        debug!("[VIEW] {:?} -> {:?}", self.current, view);
        self.current = view;
        true
    }

    /// Re-derives the view from a snapshot. Returns the new view if it changed.
    pub fn apply_snapshot(&mut self, device: &DeviceState, ab_test: Option<&AbTestStatus>) -> Option<View> {
        self.ui_enabled = device.is_connected();

        let target = derive_view(device, ab_test);
        if self.current.is_abx() && device.is_connected() {
            return None;
        }
        if self.switch_to(target) {
            Some(target)
        } else {
            None
        }
    }
}
