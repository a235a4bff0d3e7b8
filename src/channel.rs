//! Channel Manager - owns the single logical link to the amplifier
//!
//! - Requests `get_state` right after every successful (re)connect, so the
//!   snapshot order seen by the synchronizer always restarts from a full state.
//! - Any abnormal close (including a failed open) parks exactly one
//!   `TimerEvent::Reconnect`, `reconnect_delay_ms` later. Retries never stop
//!   and the delay never grows.
//! - Sends are at-most-once: while not Open they are logged and dropped.

use log::{debug, info, warn};
use serde_json::Value;

use crate::protocol::{Action, Request};
use crate::scheduler::{Scheduler, TimerEvent};
use crate::traits::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

pub struct ChannelManager<T: Transport> {
    transport: T,
    state: ConnectionState,
    reconnect_delay_ms: u64,
    reconnect_count: u64,
}

impl<T: Transport> ChannelManager<T> {
    pub fn new(transport: T, reconnect_delay_ms: u64) -> Self {
        ChannelManager {
            transport,
            state: ConnectionState::Disconnected,
            reconnect_delay_ms,
            reconnect_count: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Number of abnormal closes seen so far.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn connect(&mut self, now_ms: u64, scheduler: &mut Scheduler) {
        if self.state != ConnectionState::Disconnected {
            debug!("[WS] connect() ignored, already {:?}", self.state);
            return;
        }

        info!("[WS] Trying to open connection...");
        self.state = ConnectionState::Connecting;

        match self.transport.open() {
            Ok(()) => {
                self.state = ConnectionState::Open;
                info!("[WS] Connection opened");
                self.send(&Request::bare(Action::GetState));
            }
            Err(e) => {
                warn!("[WS] Open failed: {}", e);
                self.on_abnormal_close(now_ms, scheduler);
            }
        }
    }

    /// Deliberate close. No reconnect is scheduled.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        info!("[WS] Connection closed by client");
    }

    /// Returns true if the request was handed to the transport.
    pub fn send(&mut self, request: &Request) -> bool {
        let text = request.to_json();

        if self.state != ConnectionState::Open {
            warn!("[WS] Not connected, dropping {}", text);
            return false;
        }

        debug!("[WS] Send: {}", text);
        match self.transport.send_text(&text) {
            Ok(()) => true,
            Err(e) => {
                // The close itself surfaces on the next poll.
                warn!("[WS] Send failed, dropping {}: {}", text, e);
                false
            }
        }
    }

    /// Drains every pending inbound message.
    ///
    /// Messages are returned in arrival order. A transport error ends the
    /// drain, marks the channel Disconnected and schedules the reconnect.
    pub fn poll(&mut self, now_ms: u64, scheduler: &mut Scheduler) -> Vec<Value> {
        let mut inbound = Vec::new();

        while self.state == ConnectionState::Open {
            match self.transport.recv_text() {
                Ok(Some(text)) => {
                    debug!("[WS] Received: {}", text);
                    match serde_json::from_str::<Value>(&text) {
                        Ok(value) => inbound.push(value),
                        Err(e) => warn!("[WS] Skipping malformed message ({}): {}", e, text),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    info!("[WS] Connection closed: {}", e);
                    self.on_abnormal_close(now_ms, scheduler);
                }
            }
        }

        inbound
    }

    fn on_abnormal_close(&mut self, now_ms: u64, scheduler: &mut Scheduler) {
        self.state = ConnectionState::Disconnected;
        self.reconnect_count += 1;
        scheduler.schedule_in(now_ms, self.reconnect_delay_ms, TimerEvent::Reconnect);
        info!("[WS] Reconnecting in {} ms", self.reconnect_delay_ms);
    }
}
