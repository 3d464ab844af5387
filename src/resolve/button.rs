//! Button and velocity resolution.

use super::{Poll, Resolver};
use crate::binding::{ButtonAnalogType, ButtonBinding, INVALID_INDEX};
use crate::device::DevicePayload;
use crate::midi::{self, MidiAlgorithm, MidiState};
use crate::state::{ButtonSlot, HidState};
use std::time::Duration;

/// Hat switch step between adjacent directions, in scaled units.
const HAT_INCREMENT: f32 = 1.0 / 7.0;
const HAT_TOLERANCE: f32 = 0.001;

/// Directions a scaled hat value satisfies.
///
/// A diagonal also satisfies both adjacent cardinals. Unused slots are
/// `ButtonAnalogType::None`; negative values (no data, or centered) are neutral.
pub fn hat_directions(value: f32) -> [ButtonAnalogType; 3] {
    use ButtonAnalogType::*;
    const STEPS: [[ButtonAnalogType; 3]; 8] = [
        [HatUp, None, None],
        [HatUpRight, HatUp, HatRight],
        [HatRight, None, None],
        [HatDownRight, HatRight, HatDown],
        [HatDown, None, None],
        [HatDownLeft, HatDown, HatLeft],
        [HatLeft, None, None],
        [HatUpLeft, HatLeft, HatUp],
    ];
    if value < 0.0 {
        return [HatNeutral, None, None];
    }
    STEPS
        .iter()
        .enumerate()
        .find(|(k, _)| value < *k as f32 * HAT_INCREMENT + HAT_TOLERANCE)
        .map(|(_, dirs)| *dirs)
        .unwrap_or([HatNeutral, None, None])
}

/// Raw reading of one device-backed binding.
enum Reading {
    /// No device with that identifier.
    Missing,
    /// Device destroyed or focus lost: keep the last resolved state.
    Stale,
    Plain(bool),
    /// Boolean control with transition times, subject to debounce.
    Slot(ButtonSlot),
}

impl Reading {
    fn slot(slot: Option<&ButtonSlot>) -> Self {
        slot.map_or(Reading::Plain(false), |s| Reading::Slot(*s))
    }
}

fn debounce(slot: &ButtonSlot, up: f64, down: f64, now: Duration) -> bool {
    let within = |at: Option<Duration>, secs: f64| {
        secs > 0.0 && at.is_some_and(|at| now.saturating_sub(at).as_secs_f64() < secs)
    };
    if slot.pressed {
        !within(slot.pressed_at, down)
    } else {
        within(slot.released_at, up)
    }
}

fn read_hid(hid: &HidState, binding: &ButtonBinding) -> Reading {
    let index = binding.index as usize;
    let value = || hid.value(index).map(|v| v.value);
    match binding.analog_type {
        ButtonAnalogType::None => Reading::slot(hid.button(index)),
        ButtonAnalogType::Positive => Reading::Plain(value().is_some_and(|v| v > 0.6)),
        ButtonAnalogType::Negative => Reading::Plain(value().is_some_and(|v| v < 0.4)),
        ButtonAnalogType::Any => Reading::Plain(value().is_some_and(|v| v > 0.01)),
        t if t.is_hat() => {
            Reading::Plain(value().is_some_and(|v| hat_directions(v).contains(&t)))
        }
        _ => Reading::Plain(false),
    }
}

fn read_midi(state: &mut MidiState, binding: &ButtonBinding, poll: &Poll) -> bool {
    let index = binding.index as usize;
    let legacy = poll.config.midi_algorithm == MidiAlgorithm::Legacy;
    let sustain = poll.config.sustain();
    let threshold = binding.velocity_threshold;
    match binding.analog_type {
        ButtonAnalogType::None if legacy => state.poll_legacy_note(index),
        ButtonAnalogType::None => {
            if index >= midi::NOTE_COUNT {
                return false;
            }
            state.latch_threshold(index, threshold);
            midi::v2_pressed(state.note_on[index], state.note_off[index], poll.now, sustain)
        }
        ButtonAnalogType::MidiCtrlPrecision => state.precision.get(index).is_some_and(|&v| {
            if legacy {
                v > 0
            } else {
                // 7-bit threshold widened to the 14-bit range
                ((threshold as u16) << 7 | 0x7F) < v
            }
        }),
        ButtonAnalogType::MidiCtrlSingle => state
            .single
            .get(index)
            .is_some_and(|&v| if legacy { v > 0 } else { threshold < v }),
        ButtonAnalogType::MidiCtrlOnOff => {
            if index >= midi::ONOFF_COUNT {
                false
            } else if legacy {
                state.onoff[index]
            } else {
                midi::v2_pressed(
                    state.onoff_on[index],
                    state.onoff_off[index],
                    poll.now,
                    sustain,
                )
            }
        }
        ButtonAnalogType::MidiPitchDown => state.pitch.get(index).is_some_and(|&p| p < 0),
        ButtonAnalogType::MidiPitchUp => state.pitch.get(index).is_some_and(|&p| p > 0),
        _ => false,
    }
}

fn midi_velocity(state: &MidiState, binding: &ButtonBinding) -> f32 {
    let index = binding.index as usize;
    let flag = |on: bool| if on { 1.0 } else { 0.0 };
    let velocity = match binding.analog_type {
        ButtonAnalogType::MidiCtrlPrecision => {
            state.precision.get(index).map(|&v| v as f32 / 16383.0)
        }
        ButtonAnalogType::MidiCtrlSingle => state.single.get(index).map(|&v| v as f32 / 127.0),
        ButtonAnalogType::MidiCtrlOnOff => state.onoff.get(index).map(|&on| flag(on)),
        ButtonAnalogType::MidiPitchDown => state.pitch.get(index).map(|&p| flag(p < 0)),
        ButtonAnalogType::MidiPitchUp => state.pitch.get(index).map(|&p| flag(p > 0)),
        _ => state.velocity.get(index).map(|&v| v as f32 / 127.0),
    }
    .unwrap_or(0.0);
    if binding.invert {
        1.0 - velocity
    } else {
        velocity
    }
}

impl Resolver<'_> {
    /// Whether a button is pressed.
    ///
    /// An override on the binding wins. Otherwise the binding and then each
    /// alternative is tried in order, stopping at the first that reads
    /// pressed. Missing devices and out-of-range indices read not pressed.
    pub fn resolve_button(&self, binding: &mut ButtonBinding) -> bool {
        if binding.runtime.override_enabled {
            return binding.runtime.override_state;
        }
        let poll = self.poll();
        if self.button_one(binding, &poll) {
            return true;
        }
        binding
            .alternatives
            .iter_mut()
            .any(|alt| self.button_one(alt, &poll))
    }

    /// Press velocity in `[0, 1]`, the maximum over the binding and its alternatives.
    /// An override on the binding wins, as in [`Resolver::resolve_button`].
    pub fn resolve_velocity(&self, binding: &mut ButtonBinding) -> f32 {
        if binding.runtime.override_enabled {
            return binding.runtime.override_velocity;
        }
        let poll = self.poll();
        let mut velocity = self.velocity_one(binding, &poll);
        for alt in &mut binding.alternatives {
            velocity = velocity.max(self.velocity_one(alt, &poll));
        }
        velocity
    }

    fn button_one(&self, binding: &mut ButtonBinding, poll: &Poll) -> bool {
        if binding.is_naive() {
            if binding.index == INVALID_INDEX {
                return false;
            }
            let down = !poll.naive_blocked() && poll.keys.is_key_down(binding.index);
            return down != binding.invert;
        }

        let pressed = match self.read_device(binding, poll) {
            Reading::Missing => return false,
            Reading::Stale => binding.runtime.last_state,
            Reading::Plain(pressed) => pressed,
            Reading::Slot(slot) => {
                debounce(&slot, binding.debounce_up, binding.debounce_down, poll.now)
            }
        };
        binding.runtime.last_state = pressed;
        pressed != binding.invert
    }

    fn read_device(&self, binding: &ButtonBinding, poll: &Poll) -> Reading {
        let Some(device) = self.registry.lookup(&binding.device) else {
            return Reading::Missing;
        };
        if poll.device_blocked() {
            return Reading::Stale;
        }
        let index = binding.index as usize;
        let mut st = device.lock();
        match &mut st.payload {
            DevicePayload::Destroyed => Reading::Stale,
            DevicePayload::Mouse(mouse) => Reading::slot(mouse.buttons.get(index)),
            DevicePayload::Keyboard(kb) => Reading::slot(kb.keys.get(index)),
            DevicePayload::Hid(hid) => read_hid(hid, binding),
            DevicePayload::Midi(state) => Reading::Plain(read_midi(state, binding, poll)),
            DevicePayload::VendorIoBoard(board) => Reading::slot(board.inputs.get(index)),
            DevicePayload::SerialLightBoard(_) => Reading::Plain(false),
        }
    }

    fn velocity_one(&self, binding: &mut ButtonBinding, poll: &Poll) -> f32 {
        if binding.runtime.override_enabled {
            return binding.runtime.override_velocity;
        }
        if binding.is_naive() {
            if binding.index == INVALID_INDEX {
                return 0.0;
            }
            let down = poll.keys.is_key_down(binding.index);
            return if down != binding.invert { 1.0 } else { 0.0 };
        }
        if !self.button_one(binding, poll) {
            return 0.0;
        }

        let Some(device) = self.registry.lookup(&binding.device) else {
            return binding.runtime.last_velocity;
        };
        let velocity = match &device.lock().payload {
            DevicePayload::Midi(state) => midi_velocity(state, binding),
            _ => 1.0,
        };
        binding.runtime.last_velocity = velocity;
        velocity
    }
}
