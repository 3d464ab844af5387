//! Control bindings and binding profiles.
//!
//! A binding names a logical control and maps it onto a device identifier
//! plus an index within that device's control space. Tuning fields are
//! persisted with serde; per-poll runtime state (last value, debounce and
//! smoothing history, overrides) is `#[serde(skip)]` and rebuilt at runtime.
//!
//! An empty `device` on a [`ButtonBinding`] makes it *naive*: `index` is then
//! an OS virtual-key code read directly from the OS key state.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Index value of a button bound to nothing.
pub const INVALID_INDEX: u16 = 0xFF;

/// How a button reads a non-boolean control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAnalogType {
    /// Plain boolean control.
    #[default]
    None,
    Positive,
    Negative,
    HatUp,
    HatUpRight,
    HatRight,
    HatDownRight,
    HatDown,
    HatDownLeft,
    HatLeft,
    HatUpLeft,
    HatNeutral,
    MidiCtrlPrecision,
    MidiCtrlSingle,
    MidiCtrlOnOff,
    MidiPitchDown,
    MidiPitchUp,
    Any,
}

impl ButtonAnalogType {
    pub fn display_name(self) -> &'static str {
        match self {
            ButtonAnalogType::None => "None",
            ButtonAnalogType::Positive => "Positive",
            ButtonAnalogType::Negative => "Negative",
            ButtonAnalogType::HatUp => "Hat Up",
            ButtonAnalogType::HatUpRight => "Hat Up Right",
            ButtonAnalogType::HatRight => "Hat Right",
            ButtonAnalogType::HatDownRight => "Hat Down Right",
            ButtonAnalogType::HatDown => "Hat Down",
            ButtonAnalogType::HatDownLeft => "Hat Down Left",
            ButtonAnalogType::HatLeft => "Hat Left",
            ButtonAnalogType::HatUpLeft => "Hat Up Left",
            ButtonAnalogType::HatNeutral => "Hat Neutral",
            ButtonAnalogType::MidiCtrlPrecision => "MIDI Control Precision",
            ButtonAnalogType::MidiCtrlSingle => "MIDI Control Single",
            ButtonAnalogType::MidiCtrlOnOff => "MIDI Control On/Off",
            ButtonAnalogType::MidiPitchDown => "MIDI Pitch Down",
            ButtonAnalogType::MidiPitchUp => "MIDI Pitch Up",
            ButtonAnalogType::Any => "Any Direction",
        }
    }

    pub fn is_hat(self) -> bool {
        matches!(
            self,
            ButtonAnalogType::HatUp
                | ButtonAnalogType::HatUpRight
                | ButtonAnalogType::HatRight
                | ButtonAnalogType::HatDownRight
                | ButtonAnalogType::HatDown
                | ButtonAnalogType::HatDownLeft
                | ButtonAnalogType::HatLeft
                | ButtonAnalogType::HatUpLeft
                | ButtonAnalogType::HatNeutral
        )
    }
}

/// Transient state of a button binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonRuntime {
    pub last_state: bool,
    pub last_velocity: f32,
    pub override_enabled: bool,
    pub override_state: bool,
    pub override_velocity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonBinding {
    pub name: String,
    /// Device identifier; empty for naive bindings.
    pub device: String,
    pub index: u16,
    pub analog_type: ButtonAnalogType,
    pub invert: bool,
    /// Seconds a release is held as pressed.
    pub debounce_up: f64,
    /// Seconds a press is held as released.
    pub debounce_down: f64,
    /// MIDI note velocity threshold (v2 algorithms).
    pub velocity_threshold: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ButtonBinding>,
    #[serde(skip)]
    pub runtime: ButtonRuntime,
}

impl Default for ButtonBinding {
    fn default() -> Self {
        Self {
            name: String::new(),
            device: String::new(),
            index: INVALID_INDEX,
            analog_type: ButtonAnalogType::None,
            invert: false,
            debounce_up: 0.0,
            debounce_down: 0.0,
            velocity_threshold: 0,
            alternatives: Vec::new(),
            runtime: ButtonRuntime::default(),
        }
    }
}

impl ButtonBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Bound to an OS virtual key.
    pub fn naive(name: impl Into<String>, vkey: u16) -> Self {
        Self {
            index: vkey,
            ..Self::new(name)
        }
    }

    /// Bound to a device control.
    pub fn device(name: impl Into<String>, device: impl Into<String>, index: u16) -> Self {
        Self {
            device: device.into(),
            index,
            ..Self::new(name)
        }
    }

    pub fn with_analog_type(mut self, analog_type: ButtonAnalogType) -> Self {
        self.analog_type = analog_type;
        self
    }

    pub fn with_alternative(mut self, alternative: ButtonBinding) -> Self {
        self.alternatives.push(alternative);
        self
    }

    pub fn is_naive(&self) -> bool {
        self.device.is_empty()
    }

    /// Whether anything (override, own binding, or an alternative) is bound.
    pub fn is_set(&self) -> bool {
        self.runtime.override_enabled
            || self.index != INVALID_INDEX
            || self.alternatives.iter().any(|a| a.index != INVALID_INDEX)
    }

    pub fn set_override(&mut self, pressed: bool, velocity: f32) {
        self.runtime.override_enabled = true;
        self.runtime.override_state = pressed;
        self.runtime.override_velocity = velocity;
    }

    pub fn clear_override(&mut self) {
        self.runtime.override_enabled = false;
    }

    /// Unbind, dropping alternatives.
    pub fn clear(&mut self) {
        self.index = INVALID_INDEX;
        self.device.clear();
        self.analog_type = ButtonAnalogType::None;
        self.alternatives.clear();
    }
}

/// Angular smoothing history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct VectorSample {
    pub time_ms: f64,
    pub sine: f32,
    pub cosine: f32,
}

pub(crate) const SMOOTHING_HISTORY: usize = 10;

/// Transient state of an analog binding.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogRuntime {
    pub last_state: f32,
    pub override_enabled: bool,
    pub override_state: f32,
    pub(crate) history: [VectorSample; SMOOTHING_HISTORY],
    pub(crate) history_index: usize,
    pub(crate) smoothed_last: f32,
    pub(crate) previous_raw_rads: f32,
    pub(crate) adjusted_rads: f32,
    pub(crate) divisor_region: u32,
    pub(crate) divisor_previous: f32,
    pub(crate) relative_absolute: f32,
    pub(crate) delay: VecDeque<f32>,
}

impl Default for AnalogRuntime {
    fn default() -> Self {
        Self {
            last_state: 0.5,
            override_enabled: false,
            override_state: 0.5,
            history: [VectorSample::default(); SMOOTHING_HISTORY],
            history_index: 0,
            smoothed_last: 0.0,
            previous_raw_rads: 0.0,
            adjusted_rads: 0.0,
            divisor_region: 0,
            divisor_previous: 0.5,
            relative_absolute: 0.5,
            delay: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalogBinding {
    pub name: String,
    pub device: String,
    pub index: u16,
    pub invert: bool,
    sensitivity: f32,
    deadzone: f32,
    pub deadzone_mirror: bool,
    pub smoothing: bool,
    /// `> 1` multiplies, `< -1` divides into `-multiplier` regions.
    multiplier: i32,
    relative_mode: bool,
    /// Number of samples to hold back; 0 disables the delay buffer.
    pub delay_buffer_depth: usize,
    #[serde(skip)]
    pub runtime: AnalogRuntime,
}

impl Default for AnalogBinding {
    fn default() -> Self {
        Self {
            name: String::new(),
            device: String::new(),
            index: 0,
            invert: false,
            sensitivity: 1.0,
            deadzone: 0.0,
            deadzone_mirror: false,
            smoothing: false,
            multiplier: 1,
            relative_mode: false,
            delay_buffer_depth: 0,
            runtime: AnalogRuntime::default(),
        }
    }
}

impl AnalogBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn device(name: impl Into<String>, device: impl Into<String>, index: u16) -> Self {
        Self {
            device: device.into(),
            index,
            ..Self::new(name)
        }
    }

    pub fn is_set(&self) -> bool {
        self.runtime.override_enabled || !self.device.is_empty()
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity;
    }

    /// Sensitivity differs enough from 1.0 to be applied.
    pub fn is_sensitivity_set(&self) -> bool {
        self.sensitivity < 0.99 || self.sensitivity > 1.01
    }

    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    /// Clamped to `[-1, 1]`. Negative values remap from the edge instead of the center.
    pub fn set_deadzone(&mut self, deadzone: f32) {
        self.deadzone = deadzone.clamp(-1.0, 1.0);
    }

    pub fn is_deadzone_set(&self) -> bool {
        self.deadzone.abs() > 0.01
    }

    pub fn multiplier(&self) -> i32 {
        self.multiplier
    }

    /// Also resets the divisor's region tracking.
    pub fn set_multiplier(&mut self, multiplier: i32) {
        self.multiplier = multiplier;
        self.runtime.divisor_region = 0;
        self.runtime.divisor_previous = 0.5;
    }

    pub fn is_relative_mode(&self) -> bool {
        self.relative_mode
    }

    /// Also recenters the integrated position.
    pub fn set_relative_mode(&mut self, relative: bool) {
        self.relative_mode = relative;
        self.runtime.relative_absolute = 0.5;
    }

    pub fn set_override(&mut self, value: f32) {
        self.runtime.override_enabled = true;
        self.runtime.override_state = value;
    }

    pub fn clear_override(&mut self) {
        self.runtime.override_enabled = false;
    }
}

/// Transient state of a light binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightRuntime {
    pub last_state: f32,
    pub override_enabled: bool,
    pub override_state: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightBinding {
    pub name: String,
    pub device: String,
    pub index: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<LightBinding>,
    #[serde(skip)]
    pub runtime: LightRuntime,
}

impl LightBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn device(name: impl Into<String>, device: impl Into<String>, index: u16) -> Self {
        Self {
            device: device.into(),
            index,
            ..Self::new(name)
        }
    }

    pub fn with_alternative(mut self, alternative: LightBinding) -> Self {
        self.alternatives.push(alternative);
        self
    }

    pub fn is_set(&self) -> bool {
        self.runtime.override_enabled
            || !self.device.is_empty()
            || self.alternatives.iter().any(|a| !a.device.is_empty())
    }

    pub fn set_override(&mut self, value: f32) {
        self.runtime.override_enabled = true;
        self.runtime.override_state = value;
    }

    pub fn clear_override(&mut self) {
        self.runtime.override_enabled = false;
    }
}

/// Serializable set of bindings for one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingProfile {
    pub name: String,
    pub description: Option<String>,
    pub buttons: Vec<ButtonBinding>,
    pub analogs: Vec<AnalogBinding>,
    pub lights: Vec<LightBinding>,
}

impl BindingProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load by extension: `.json` is JSON, anything else TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = if is_json(path) {
            self.to_json_string()?
        } else {
            self.to_toml_string()?
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Buttons ordered by `names`; names without a binding get an empty one.
    pub fn sorted_buttons(&self, names: &[&str]) -> Vec<ButtonBinding> {
        sorted(&self.buttons, names, |b| &b.name, |n| ButtonBinding::new(n))
    }

    pub fn sorted_analogs(&self, names: &[&str]) -> Vec<AnalogBinding> {
        sorted(&self.analogs, names, |a| &a.name, |n| AnalogBinding::new(n))
    }

    pub fn sorted_lights(&self, names: &[&str]) -> Vec<LightBinding> {
        sorted(&self.lights, names, |l| &l.name, |n| LightBinding::new(n))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn sorted<T: Clone>(
    items: &[T],
    names: &[&str],
    name_of: impl Fn(&T) -> &String,
    empty: impl Fn(&str) -> T,
) -> Vec<T> {
    names
        .iter()
        .map(|&n| {
            items
                .iter()
                .find(|item| name_of(item) == n)
                .cloned()
                .unwrap_or_else(|| empty(n))
        })
        .collect()
}
