use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::click::{WaveformSpec, MAX_VOLUME, MIN_VOLUME};
use crate::scheduler::clock::{MAX_FRAME_RATE, MIN_FRAME_RATE};
use crate::scheduler::{clamp_rate, DriftCorrection, DEFAULT_RATE, DEFAULT_VOLUME};

const SETTINGS_VERSION: u32 = 1;

/// Persisted user settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub bpm: i32,
    pub volume: i32,
    pub theme: String,
    pub frame_rate_hz: u32,
    pub click: WaveformSpec,
    pub correction: DriftCorrection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            bpm: DEFAULT_RATE,
            volume: DEFAULT_VOLUME,
            theme: "default".to_string(),
            frame_rate_hz: 60,
            click: WaveformSpec::default(),
            correction: DriftCorrection::default(),
        }
    }
}

impl Settings {
    /// Pull every numeric field back into its legal range
    pub fn normalized(mut self) -> Self {
        self.version = SETTINGS_VERSION;
        self.bpm = clamp_rate(self.bpm);
        self.volume = self.volume.clamp(MIN_VOLUME, MAX_VOLUME);
        self.frame_rate_hz = self.frame_rate_hz.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
        self.correction = self.correction.sanitized();
        self
    }
}

/// Get the settings directory (~/.cadence/)
pub fn settings_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".cadence")
}

pub fn default_settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Load settings; a missing file yields defaults
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        log::debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    // Peek at version before committing to the layout
    let raw: Value = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
    if version > SETTINGS_VERSION {
        bail!(
            "Settings version {} is newer than supported version {}",
            version,
            SETTINGS_VERSION
        );
    }

    let settings: Settings = serde_json::from_value(raw)
        .with_context(|| format!("Failed to parse settings {}", path.display()))?;
    Ok(settings.normalized())
}

/// Save settings as pretty JSON, creating the parent directory if needed
pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
