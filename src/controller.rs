//! Bench - the event loop tying the link, the synchronizer and both test
//! controllers together
//!
//! Everything runs to completion on one thread. Each user action, timer and
//! inbound message is handled fully before the next one, so there is no locking.
//! After every user action the inbound side is drained once more: in simulation
//! the device answers synchronously, and the answer lands before the action returns.

use log::{info, warn};

use crate::ab::{AbController, AbResults, AbTestParams};
use crate::abx::{AbxChoice, AbxController, AbxResult, AbxTestParams, Guess, GuessOutcome};
use crate::channel::{ChannelManager, ConnectionState};
use crate::clock::Clock;
use crate::config::SystemConfig;
use crate::error::Result;
use crate::scheduler::{Scheduler, TimerEvent};
use crate::status::{DeviceState, InputSource, PresetId};
use crate::sync::Synchronizer;
use crate::traits::{RandomSource, Transport};
use crate::view::{SessionView, View};

/// Things a front end may want to render after an iteration or action.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchEvent {
    ViewChanged(View),
    PresetChanged(PresetId),
    Elapsed(String),
    AbFinished(AbResults),
    AbxFinished(AbxResult),
}

pub struct Bench<T, C, R>
where
    T: Transport,
    C: Clock,
    R: RandomSource,
{
    sync: Synchronizer<T>,
    ab: AbController,
    abx: AbxController,
    view: SessionView,
    scheduler: Scheduler,
    clock: C,
    rng: R,
    config: SystemConfig,
    events: Vec<BenchEvent>,
}

impl<T, C, R> Bench<T, C, R>
where
    T: Transport,
    C: Clock,
    R: RandomSource,
{
    pub fn new(transport: T, clock: C, rng: R, config: SystemConfig) -> Self {
        info!("=== Bench Initialization ===");
        info!("Link: {} (reconnect every {} ms)", config.channel.url, config.channel.reconnect_delay_ms);
        info!("ABX unmute delay: {} ms", config.abx.unmute_delay_ms);

        let channel = ChannelManager::new(transport, config.channel.reconnect_delay_ms);
        Bench {
            sync: Synchronizer::new(channel),
            ab: AbController::new(),
            abx: AbxController::new(config.abx.unmute_delay_ms),
            view: SessionView::new(),
            scheduler: Scheduler::new(),
            clock,
            rng,
            config,
            events: Vec::new(),
        }
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn device(&self) -> &DeviceState {
        self.sync.device()
    }

    pub fn synchronizer(&self) -> &Synchronizer<T> {
        &self.sync
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.sync.channel().state()
    }

    pub fn view(&self) -> View {
        self.view.current()
    }

    pub fn ui_enabled(&self) -> bool {
        self.view.ui_enabled()
    }

    pub fn ab(&self) -> &AbController {
        &self.ab
    }

    pub fn abx(&self) -> &AbxController {
        &self.abx
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Events produced since the last call.
    pub fn take_events(&mut self) -> Vec<BenchEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // LOOP
    // ========================================================================

    pub fn connect(&mut self) {
        let now = self.clock.now_ms();
        self.sync.channel_mut().connect(now, &mut self.scheduler);
        self.pump_inbound();
    }

    pub fn disconnect(&mut self) {
        self.sync.channel_mut().disconnect();
    }

    /// Fires due timers, then applies everything the link delivered.
    pub fn process_loop_iteration(&mut self) {
        let now = self.clock.now_ms();
        while let Some(event) = self.scheduler.pop_due(now) {
            self.on_timer(event, now);
        }
        self.pump_inbound();
    }

    fn on_timer(&mut self, event: TimerEvent, now: u64) {
        match event {
            TimerEvent::Reconnect => {
                self.sync.channel_mut().connect(now, &mut self.scheduler);
            }
            TimerEvent::Unmute => {
                self.sync.set_mute(false);
            }
            TimerEvent::StopwatchTick => {
                if let Some(display) = self.ab.tick(now) {
                    self.events.push(BenchEvent::Elapsed(display));
                    self.scheduler
                        .schedule_in(now, self.config.ab.tick_interval_ms, TimerEvent::StopwatchTick);
                }
            }
        }
    }

    fn pump_inbound(&mut self) {
        let now = self.clock.now_ms();
        for message in self.sync.poll(now, &mut self.scheduler) {
            let update = self.sync.apply_inbound(&message);

            if let Some((_, new)) = update.preset_changed {
                self.events.push(BenchEvent::PresetChanged(new));
            }

            let device = self.sync.device().clone();
            if let Some(view) = self.view.apply_snapshot(&device, self.sync.ab_test()) {
                self.on_view_entered(view, now);
            }
        }
    }

    fn on_view_entered(&mut self, view: View, now: u64) {
        self.events.push(BenchEvent::ViewChanged(view));
        match view {
            View::AbActive => {
                // Re-entry mid-session (link flap) keeps the running count.
                if !self.ab.stopwatch().is_running() {
                    self.ab.start_stopwatch(now);
                }
                if self.scheduler.pending(TimerEvent::StopwatchTick) == 0 {
                    self.scheduler
                        .schedule_in(now, self.config.ab.tick_interval_ms, TimerEvent::StopwatchTick);
                }
            }
            View::AbResults => {
                if let Some(results) = self.ab.finish_from_device(now) {
                    self.events.push(BenchEvent::AbFinished(results));
                }
            }
            _ => {}
        }
    }

    fn switch_view(&mut self, view: View) {
        let now = self.clock.now_ms();
        if self.view.switch_to(view) {
            self.on_view_entered(view, now);
        }
    }

    // ========================================================================
    // DEVICE CONTROL
    // ========================================================================

    pub fn open_view(&mut self, view: View) {
        self.switch_view(view);
    }

    /// Asks for a fresh snapshot.
    pub fn refresh(&mut self) {
        self.sync.request_state();
        self.pump_inbound();
    }

    pub fn set_preset(&mut self, preset: PresetId) {
        self.sync.set_preset(preset);
        self.pump_inbound();
    }

    pub fn set_mute(&mut self, muted: bool) {
        self.sync.set_mute(muted);
        self.pump_inbound();
    }

    pub fn set_volume(&mut self, volume_db: i32) {
        self.sync.set_volume(volume_db);
        self.pump_inbound();
    }

    pub fn set_eq(&mut self, preset: PresetId, enabled: bool) {
        self.sync.set_eq(preset, enabled);
        self.pump_inbound();
    }

    pub fn set_source(&mut self, preset: PresetId, source: InputSource) {
        self.sync.set_source(preset, source);
        self.pump_inbound();
    }

    // ========================================================================
    // AB TEST
    // ========================================================================

    pub fn start_ab(&mut self, params: AbTestParams) -> Result<()> {
        let started_at = self.clock.wall_time();
        self.ab.start(params, &mut self.sync, started_at)?;
        self.switch_view(View::AbActive);
        self.pump_inbound();
        Ok(())
    }

    pub fn log_like(&mut self) -> Result<PresetId> {
        self.ab.log_like(self.sync.active_preset())
    }

    pub fn stop_ab(&mut self) -> Result<AbResults> {
        let now = self.clock.now_ms();
        let results = self.ab.stop(&mut self.sync, now)?;
        self.events.push(BenchEvent::AbFinished(results));
        self.switch_view(View::AbResults);
        self.pump_inbound();
        Ok(results)
    }

    pub fn reset_ab(&mut self) {
        self.ab.reset(&mut self.sync);
        self.switch_view(View::AbControl);
        self.pump_inbound();
    }

    /// Leaves test mode on the device and returns to the main view.
    pub fn disable_test_mode(&mut self) {
        self.sync.disable_test_mode();
        self.ab.abandon();
        self.switch_view(View::MainControl);
        self.pump_inbound();
    }

    // ========================================================================
    // ABX TEST
    // ========================================================================

    pub fn start_abx(&mut self, params: AbxTestParams) -> Result<()> {
        let now = self.clock.now_ms();
        self.abx
            .start(params, &mut self.rng, &mut self.sync, &mut self.scheduler, now)?;
        self.switch_view(View::AbxActive);
        self.pump_inbound();
        Ok(())
    }

    pub fn present_abx(&mut self, which: AbxChoice) -> Result<PresetId> {
        let now = self.clock.now_ms();
        let preset = self.abx.present(which, &mut self.sync, &mut self.scheduler, now)?;
        self.pump_inbound();
        Ok(preset)
    }

    pub fn submit_guess(&mut self, guess: Guess) -> Result<GuessOutcome> {
        let outcome = self.abx.submit_guess(guess, &mut self.rng)?;
        if let GuessOutcome::Finished(result) = &outcome {
            self.events.push(BenchEvent::AbxFinished(result.clone()));
            self.switch_view(View::AbxResults);
        }
        Ok(outcome)
    }

    pub fn stop_abx(&mut self) -> Result<AbxResult> {
        let result = self.abx.stop()?;
        self.events.push(BenchEvent::AbxFinished(result.clone()));
        self.switch_view(View::AbxResults);
        Ok(result)
    }

    pub fn reset_abx(&mut self) {
        self.abx.reset();
        self.switch_view(View::AbxControl);
    }
}

impl<T, C, R> Drop for Bench<T, C, R>
where
    T: Transport,
    C: Clock,
    R: RandomSource,
{
    fn drop(&mut self) {
        if self.sync.channel().is_open() {
            warn!("[WS] Bench dropped with open link, closing");
            self.sync.channel_mut().disconnect();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
