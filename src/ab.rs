//! AB Test Controller
//!
//! `Idle -> Running -> Finished -> Idle`. The device decides when presets are
//! switched and how long the test lives; this side only validates the request,
//! counts likes against whatever preset the device reports as active, and keeps
//! a display stopwatch.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BenchError, Result};
use crate::protocol::StartTestParams;
use crate::status::PresetId;
use crate::sync::Synchronizer;
use crate::traits::Transport;

const TEST_NAME: &str = "A/B";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbTestParams {
    pub preset_a: PresetId,
    pub preset_b: PresetId,
    pub muted_during_switch: bool,
    pub min_duration_secs: u32,
    pub max_duration_secs: u32,
}

impl AbTestParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_duration_secs >= self.max_duration_secs {
            return Err(BenchError::InvalidDurations {
                min_secs: self.min_duration_secs,
                max_secs: self.max_duration_secs,
            });
        }
        if self.preset_a == self.preset_b {
            return Err(BenchError::IdenticalPresets(self.preset_a));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbSession {
    pub id: Uuid,
    pub preset_a: PresetId,
    pub preset_b: PresetId,
    pub muted_during_switch: bool,
    pub likes_a: u32,
    pub likes_b: u32,
    pub min_duration_secs: u32,
    pub max_duration_secs: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbResults {
    pub preset_a: PresetId,
    pub preset_b: PresetId,
    pub likes_a: u32,
    pub likes_b: u32,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbPhase {
    Idle,
    Running,
    Finished,
}

/// Elapsed-time display, sampled once per tick. Never used for scoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stopwatch {
    started_ms: Option<u64>,
    elapsed_ms: u64,
}

impl Stopwatch {
    pub fn start(&mut self, now_ms: u64) {
        self.started_ms = Some(now_ms);
        self.elapsed_ms = 0;
    }

    pub fn sample(&mut self, now_ms: u64) {
        if let Some(start) = self.started_ms {
            self.elapsed_ms = now_ms.saturating_sub(start);
        }
    }

    pub fn stop(&mut self, now_ms: u64) {
        self.sample(now_ms);
        self.started_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_ms.is_some()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms / 1000
    }

    pub fn display(&self) -> String {
        format_elapsed(self.elapsed_ms)
    }
}

/// `MM:SS`, minutes unbounded.
pub fn format_elapsed(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[derive(Debug)]
pub struct AbController {
    phase: AbPhase,
    session: Option<AbSession>,
    results: Option<AbResults>,
    stopwatch: Stopwatch,
}

impl Default for AbController {
    fn default() -> Self {
        AbController {
            phase: AbPhase::Idle,
            session: None,
            results: None,
            stopwatch: Stopwatch::default(),
        }
    }
}

impl AbController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AbPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&AbSession> {
        self.session.as_ref()
    }

    pub fn results(&self) -> Option<&AbResults> {
        self.results.as_ref()
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    /// Validates and asks the device to start. Nothing changes and nothing is
    /// sent if validation fails.
    pub fn start<T: Transport>(
        &mut self,
        params: AbTestParams,
        sync: &mut Synchronizer<T>,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        if self.phase == AbPhase::Running {
            return Err(BenchError::AlreadyRunning(TEST_NAME));
        }
        params.validate()?;

        let session = AbSession {
            id: Uuid::new_v4(),
            preset_a: params.preset_a,
            preset_b: params.preset_b,
            muted_during_switch: params.muted_during_switch,
            likes_a: 0,
            likes_b: 0,
            min_duration_secs: params.min_duration_secs,
            max_duration_secs: params.max_duration_secs,
            started_at,
        };
        info!(
            "[AB] Session {} started: A={} B={} switch every {}-{}s",
            session.id, session.preset_a, session.preset_b, session.min_duration_secs, session.max_duration_secs
        );

        self.session = Some(session);
        self.results = None;
        self.stopwatch = Stopwatch::default();
        self.phase = AbPhase::Running;

        sync.start_test(StartTestParams {
            preset_a: params.preset_a,
            preset_b: params.preset_b,
            min_duration_secs: params.min_duration_secs,
            max_duration_secs: params.max_duration_secs,
        });
        Ok(())
    }

    /// Starts the display stopwatch. Called on entering the AB-active view.
    pub fn start_stopwatch(&mut self, now_ms: u64) {
        self.stopwatch.start(now_ms);
    }

    /// Samples the stopwatch. Returns the display string while it runs.
    pub fn tick(&mut self, now_ms: u64) -> Option<String> {
        if !self.stopwatch.is_running() {
            return None;
        }
        self.stopwatch.sample(now_ms);
        Some(self.stopwatch.display())
    }

    /// Credits one like to whichever session preset is active on the device.
    pub fn log_like(&mut self, active_preset: PresetId) -> Result<PresetId> {
        let session = match (self.phase, self.session.as_mut()) {
            (AbPhase::Running, Some(s)) => s,
            _ => return Err(BenchError::NotRunning(TEST_NAME)),
        };

        if active_preset == session.preset_a {
            session.likes_a += 1;
        } else if active_preset == session.preset_b {
            session.likes_b += 1;
        } else {
            let err = BenchError::UnattributedLike {
                active: active_preset,
                preset_a: session.preset_a,
                preset_b: session.preset_b,
            };
            warn!("[AB] {}", err);
            return Err(err);
        }
        Ok(active_preset)
    }

    pub fn stop<T: Transport>(&mut self, sync: &mut Synchronizer<T>, now_ms: u64) -> Result<AbResults> {
        if self.phase != AbPhase::Running {
            return Err(BenchError::NotRunning(TEST_NAME));
        }
        sync.stop_test();
        self.finish(now_ms).ok_or(BenchError::NotRunning(TEST_NAME))
    }

    /// The device reported the test finished on its own.
    pub fn finish_from_device(&mut self, now_ms: u64) -> Option<AbResults> {
        if self.phase != AbPhase::Running {
            return None;
        }
        info!("[AB] Device finished the test");
        self.finish(now_ms)
    }

    /// Back to Idle. Tells the device to clear its finished test.
    pub fn reset<T: Transport>(&mut self, sync: &mut Synchronizer<T>) {
        if self.phase != AbPhase::Idle {
            sync.reset_test();
        }
        self.abandon();
    }

    /// Back to Idle without telling the device.
    pub fn abandon(&mut self) {
        self.phase = AbPhase::Idle;
        self.session = None;
        self.results = None;
        self.stopwatch = Stopwatch::default();
    }

    fn finish(&mut self, now_ms: u64) -> Option<AbResults> {
        let session = self.session.as_ref()?;
        self.stopwatch.stop(now_ms);

        let results = AbResults {
            preset_a: session.preset_a,
            preset_b: session.preset_b,
            likes_a: session.likes_a,
            likes_b: session.likes_b,
            elapsed_secs: self.stopwatch.elapsed_secs(),
        };
        info!(
            "[AB] Session {} finished after {}: A={} likes, B={} likes",
            session.id,
            self.stopwatch.display(),
            results.likes_a,
            results.likes_b
        );

        self.phase = AbPhase::Finished;
        self.results = Some(results);
        Some(results)
    }
}
