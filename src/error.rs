use thiserror::Error;

use crate::status::PresetId;

/// Errors raised by the test controllers.
///
/// None of these are fatal: validation errors are shown to the listener and
/// leave every controller untouched, attribution anomalies are logged and the
/// session keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BenchError {
    #[error("Min. time ({min_secs}s) must be less than max. time ({max_secs}s)")]
    InvalidDurations { min_secs: u32, max_secs: u32 },

    #[error("Presets A and B must differ (both are {0})")]
    IdenticalPresets(PresetId),

    #[error("An ABX test needs at least one trial")]
    NoTrials,

    #[error("Cannot attribute like: active preset {active} is neither A ({preset_a}) nor B ({preset_b})")]
    UnattributedLike {
        active: PresetId,
        preset_a: PresetId,
        preset_b: PresetId,
    },

    #[error("{0} test is already running")]
    AlreadyRunning(&'static str),

    #[error("No {0} test is running")]
    NotRunning(&'static str),
}

pub type Result<T> = std::result::Result<T, BenchError>;
