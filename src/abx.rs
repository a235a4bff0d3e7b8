//! ABX Test Controller
//!
//! `Idle -> Presenting (one pass per trial) -> Finished -> Idle`.
//!
//! X is drawn from {A, B} with a fair coin before every trial and never leaves
//! this module; the listener only ever learns the aggregate score once the
//! session is finalized. Finalization scores the session with a one-tailed
//! exact binomial test (see `stats`).

use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BenchError, Result};
use crate::scheduler::{Scheduler, TimerEvent};
use crate::stats::{abx_p_value, Verdict};
use crate::status::PresetId;
use crate::sync::Synchronizer;
use crate::traits::{RandomSource, Transport};

const TEST_NAME: &str = "ABX";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbxChoice {
    A,
    B,
    X,
}

/// What the listener may answer: X is A, or X is B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guess {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbxTestParams {
    pub preset_a: PresetId,
    pub preset_b: PresetId,
    pub total_trials: u32,
    pub muted_during_switch: bool,
}

impl AbxTestParams {
    pub fn validate(&self) -> Result<()> {
        if self.preset_a == self.preset_b {
            return Err(BenchError::IdenticalPresets(self.preset_a));
        }
        if self.total_trials == 0 {
            return Err(BenchError::NoTrials);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AbxSession {
    pub id: Uuid,
    pub preset_a: PresetId,
    pub preset_b: PresetId,
    preset_x: PresetId,
    pub muted_during_switch: bool,
    pub total_trials: u32,
    pub trials_completed: u32,
    pub correct_count: u32,
    pub last_presented: Option<AbxChoice>,
}

impl AbxSession {
    fn preset_for(&self, choice: AbxChoice) -> PresetId {
        match choice {
            AbxChoice::A => self.preset_a,
            AbxChoice::B => self.preset_b,
            AbxChoice::X => self.preset_x,
        }
    }

    fn draw_x<R: RandomSource>(&mut self, rng: &mut R) {
        self.preset_x = if rng.coin_flip() { self.preset_a } else { self.preset_b };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbxResult {
    pub preset_a: PresetId,
    pub preset_b: PresetId,
    pub trials: u32,
    pub correct: u32,
    pub p_value: f64,
    pub verdict: Verdict,
}

impl AbxResult {
    pub fn interpretation(&self) -> String {
        self.verdict.interpretation(self.p_value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuessOutcome {
    NextTrial { trial: u32 },
    Finished(AbxResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbxPhase {
    Idle,
    Presenting,
    Finished,
}

#[derive(Debug)]
enum AbxState {
    Idle,
    Presenting(AbxSession),
    Finished(AbxResult),
}

#[derive(Debug)]
pub struct AbxController {
    state: AbxState,
    unmute_delay_ms: u64,
}

impl AbxController {
    pub fn new(unmute_delay_ms: u64) -> Self {
        AbxController {
            state: AbxState::Idle,
            unmute_delay_ms,
        }
    }

    pub fn phase(&self) -> AbxPhase {
        match self.state {
            AbxState::Idle => AbxPhase::Idle,
            AbxState::Presenting(_) => AbxPhase::Presenting,
            AbxState::Finished(_) => AbxPhase::Finished,
        }
    }

    pub fn session(&self) -> Option<&AbxSession> {
        match &self.state {
            AbxState::Presenting(s) => Some(s),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AbxResult> {
        match &self.state {
            AbxState::Finished(r) => Some(r),
            _ => None,
        }
    }

    /// Captures the session, hides the first X and auditions A.
    pub fn start<T: Transport, R: RandomSource>(
        &mut self,
        params: AbxTestParams,
        rng: &mut R,
        sync: &mut Synchronizer<T>,
        scheduler: &mut Scheduler,
        now_ms: u64,
    ) -> Result<()> {
        if matches!(self.state, AbxState::Presenting(_)) {
            return Err(BenchError::AlreadyRunning(TEST_NAME));
        }
        params.validate()?;

        let mut session = AbxSession {
            id: Uuid::new_v4(),
            preset_a: params.preset_a,
            preset_b: params.preset_b,
            preset_x: params.preset_a,
            muted_during_switch: params.muted_during_switch,
            total_trials: params.total_trials,
            trials_completed: 0,
            correct_count: 0,
            last_presented: None,
        };
        session.draw_x(rng);
        info!(
            "[ABX] Session {} started: A={} B={} trials={} mute={}",
            session.id, session.preset_a, session.preset_b, session.total_trials, session.muted_during_switch
        );

        self.state = AbxState::Presenting(session);
        self.present(AbxChoice::A, sync, scheduler, now_ms)?;
        Ok(())
    }

    /// Switches the device to the preset behind `which`.
    ///
    /// With mute-during-switch the sequence is mute, switch, and an unmute
    /// parked `unmute_delay_ms` later. Returns the requested preset.
    pub fn present<T: Transport>(
        &mut self,
        which: AbxChoice,
        sync: &mut Synchronizer<T>,
        scheduler: &mut Scheduler,
        now_ms: u64,
    ) -> Result<PresetId> {
        let session = match &mut self.state {
            AbxState::Presenting(s) => s,
            _ => return Err(BenchError::NotRunning(TEST_NAME)),
        };

        let preset = session.preset_for(which);
        session.last_presented = Some(which);
        debug!("[ABX] Presenting {:?}", which);

        if session.muted_during_switch {
            sync.set_mute(true);
        }
        sync.set_preset(preset);
        if session.muted_during_switch {
            scheduler.schedule_in(now_ms, self.unmute_delay_ms, TimerEvent::Unmute);
        }
        Ok(preset)
    }

    /// Records the listener's answer for the current trial.
    pub fn submit_guess<R: RandomSource>(&mut self, guess: Guess, rng: &mut R) -> Result<GuessOutcome> {
        let session = match &mut self.state {
            AbxState::Presenting(s) => s,
            _ => return Err(BenchError::NotRunning(TEST_NAME)),
        };

        let guessed = match guess {
            Guess::A => session.preset_a,
            Guess::B => session.preset_b,
        };
        if guessed == session.preset_x {
            session.correct_count += 1;
        }
        session.trials_completed += 1;
        debug!("[ABX] Trial {}/{} recorded", session.trials_completed, session.total_trials);

        if session.trials_completed >= session.total_trials {
            return Ok(GuessOutcome::Finished(self.finalize()?));
        }

        session.draw_x(rng);
        Ok(GuessOutcome::NextTrial {
            trial: session.trials_completed + 1,
        })
    }

    /// Ends the session early, scoring only the completed trials.
    pub fn stop(&mut self) -> Result<AbxResult> {
        self.finalize()
    }

    pub fn reset(&mut self) {
        self.state = AbxState::Idle;
    }

    fn finalize(&mut self) -> Result<AbxResult> {
        let session = match &self.state {
            AbxState::Presenting(s) => s,
            _ => return Err(BenchError::NotRunning(TEST_NAME)),
        };

        let p_value = abx_p_value(session.trials_completed as i64, session.correct_count as i64);
        let result = AbxResult {
            preset_a: session.preset_a,
            preset_b: session.preset_b,
            trials: session.trials_completed,
            correct: session.correct_count,
            p_value,
            verdict: Verdict::from_p_value(p_value),
        };
        info!(
            "[ABX] Session {} finished: {}/{} correct, p={:.4} ({:?})",
            session.id, result.correct, result.trials, result.p_value, result.verdict
        );

        self.state = AbxState::Finished(result.clone());
        Ok(result)
    }
}
