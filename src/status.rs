use serde::{Deserialize, Serialize};

/// Amplifier preset number. 0 means "no preset", i.e. no device behind the link.
pub type PresetId = u8;

pub const NO_PRESET: PresetId = 0;
pub const PRESET_COUNT: usize = 3;

/// Integer-coded input of the amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum InputSource {
    /// Auto-detect; the detected input is reported as `live_input_source`.
    #[default]
    Scan,
    Xlr,
    Rca,
    Spdif,
    Aes,
    Optical,
    External,
    Unknown(u8),
}

impl From<u8> for InputSource {
    fn from(code: u8) -> Self {
        match code {
            0 => InputSource::Scan,
            1 => InputSource::Xlr,
            2 => InputSource::Rca,
            4 => InputSource::Spdif,
            5 => InputSource::Aes,
            6 => InputSource::Optical,
            7 => InputSource::External,
            other => InputSource::Unknown(other),
        }
    }
}

impl From<InputSource> for u8 {
    fn from(source: InputSource) -> Self {
        match source {
            InputSource::Scan => 0,
            InputSource::Xlr => 1,
            InputSource::Rca => 2,
            InputSource::Spdif => 4,
            InputSource::Aes => 5,
            InputSource::Optical => 6,
            InputSource::External => 7,
            InputSource::Unknown(code) => code,
        }
    }
}

impl InputSource {
    pub fn short_name(&self) -> Option<&'static str> {
        match self {
            InputSource::Xlr => Some("XLR"),
            InputSource::Rca => Some("RCA"),
            InputSource::Spdif => Some("SPDIF"),
            InputSource::Aes => Some("AES"),
            InputSource::Optical => Some("OPT"),
            InputSource::External => Some("EXT"),
            InputSource::Scan | InputSource::Unknown(_) => None,
        }
    }
}

/// Normalized device snapshot.
///
/// Deserialized straight from the `amp_state` section of an inbound message and
/// always replaced as a whole; fields missing on the wire take their defaults,
/// so a snapshot without `preset` reads as disconnected.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceState {
    pub filter_name: String,
    pub is_muted: bool,
    #[serde(rename = "preset")]
    pub active_preset: PresetId,
    #[serde(rename = "eq_on")]
    pub eq_enabled: [bool; PRESET_COUNT],
    pub preset_source: [InputSource; PRESET_COUNT],
    #[serde(rename = "current_source")]
    pub live_input_source: InputSource,
    pub volume_db: f64,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            filter_name: String::new(),
            is_muted: false,
            active_preset: NO_PRESET,
            eq_enabled: [false; PRESET_COUNT],
            preset_source: [InputSource::Scan; PRESET_COUNT],
            live_input_source: InputSource::Scan,
            volume_db: 0.0,
        }
    }
}

impl DeviceState {
    pub fn is_connected(&self) -> bool {
        self.active_preset != NO_PRESET
    }

    pub fn display_name(&self) -> &str {
        if self.filter_name.is_empty() {
            "NOT CONNECTED"
        } else {
            &self.filter_name
        }
    }

    /// Label of the source selector for `preset` (1-based).
    ///
    /// A preset routed to Scan shows the detected input, but only while it is
    /// the active preset; otherwise the device has nothing detected for it.
    pub fn source_label(&self, preset: PresetId) -> String {
        let idx = match (preset as usize).checked_sub(1) {
            Some(i) if i < PRESET_COUNT => i,
            _ => return "Scan".to_string(),
        };
        let source = self.preset_source[idx];
        if source != InputSource::Scan {
            return format!("{:?}", source);
        }
        if self.active_preset == preset {
            if let Some(name) = self.live_input_source.short_name() {
                return format!("Scan ({})", name);
            }
        }
        "Scan".to_string()
    }
}

/// The device's view of the AB test, from the `ab_test` section.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AbTestStatus {
    pub preset_a: Option<PresetId>,
    pub preset_b: Option<PresetId>,
    pub is_running: bool,
    pub is_finished: bool,
}
