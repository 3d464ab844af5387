//! Engine configuration.
//!
//! Loaded from TOML; every key is optional and falls back to its default.
//!
//! ```toml
//! midi_algorithm = "v2-drum"
//! midi_note_sustain_ms = 25
//! naive_require_focus = false
//! hid_light_brightness = 60
//! ```

use crate::error::Result;
use crate::midi::MidiAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Process-wide engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// MIDI note state machine, shared by every MIDI device.
    pub midi_algorithm: MidiAlgorithm,
    /// How long a v2 note reads pressed after its NOTE-ON once released.
    pub midi_note_sustain_ms: u32,
    /// Gate naive key bindings and mouse analogs on window focus.
    pub naive_require_focus: bool,
    /// Gate device-backed button bindings on window focus.
    pub device_require_focus: bool,
    /// Percentage applied to HID value outputs (lights).
    pub hid_light_brightness: u8,
    /// Period of the unconditional output refresh.
    pub flush_refresh_ms: u64,
    /// Log every enumerated device at info level.
    pub dump_devices: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            midi_algorithm: MidiAlgorithm::V2,
            midi_note_sustain_ms: 20,
            naive_require_focus: true,
            device_require_focus: false,
            hid_light_brightness: 100,
            flush_refresh_ms: 495,
            dump_devices: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: Self = toml::from_str(s)?;
        cfg.hid_light_brightness = cfg.hid_light_brightness.min(100);
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn sustain(&self) -> Duration {
        Duration::from_millis(self.midi_note_sustain_ms as u64)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.flush_refresh_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.sustain(), Duration::from_millis(20));
    }

    #[test]
    fn test_partial_document_and_brightness_clamp() {
        let cfg = EngineConfig::from_toml_str(
            "midi_algorithm = \"v2-drum\"\nhid_light_brightness = 250\n",
        )
        .unwrap();
        assert_eq!(cfg.midi_algorithm, MidiAlgorithm::V2Drum);
        assert_eq!(cfg.hid_light_brightness, 100);
        assert!(cfg.naive_require_focus);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let cfg = EngineConfig {
            midi_algorithm: MidiAlgorithm::Legacy,
            midi_note_sustain_ms: 33,
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn test_unknown_algorithm_is_an_error() {
        assert!(EngineConfig::from_toml_str("midi_algorithm = \"v3\"").is_err());
    }
}
