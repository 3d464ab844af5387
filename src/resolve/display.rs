//! Human-readable binding descriptions for configuration UIs.
//!
//! Unbound bindings describe as an empty string.

use super::Resolver;
use crate::binding::{AnalogBinding, ButtonAnalogType, ButtonBinding, LightBinding, INVALID_INDEX};
use crate::capability::ControlRef;
use crate::device::{self, DevicePayload};
use crate::keys::vkey_name;
use crate::midi::{self, NOTES_PER_CHANNEL, ONOFF_PER_CHANNEL, PRECISION_PER_CHANNEL, SINGLE_PER_CHANNEL};
use crate::state::MOUSE_BUTTONS;

fn midi_button(binding: &ButtonBinding, desc: &str) -> String {
    let i = binding.index as usize;
    match binding.analog_type {
        ButtonAnalogType::None => {
            let note = (i % NOTES_PER_CHANNEL) as u8;
            format!(
                "MIDI Note Ch.{} #{} {} ({desc})",
                i / NOTES_PER_CHANNEL + 1,
                note,
                midi::note_name(note)
            )
        }
        ButtonAnalogType::MidiCtrlPrecision => format!(
            "MIDI Prec Ctrl Ch.{} CC#{} ({desc})",
            i / PRECISION_PER_CHANNEL + 1,
            i % PRECISION_PER_CHANNEL
        ),
        ButtonAnalogType::MidiCtrlSingle => format!(
            "MIDI Ctrl Ch.{} CC#{} ({desc})",
            i / SINGLE_PER_CHANNEL + 1,
            midi::single_control(i)
        ),
        ButtonAnalogType::MidiCtrlOnOff => format!(
            "MIDI OnOff Ch.{} CC#{} ({desc})",
            i / ONOFF_PER_CHANNEL + 1,
            i % ONOFF_PER_CHANNEL + 0x40
        ),
        ButtonAnalogType::MidiPitchDown => format!("MIDI Pitch Down Ch.{} ({desc})", i + 1),
        ButtonAnalogType::MidiPitchUp => format!("MIDI Pitch Up Ch.{} ({desc})", i + 1),
        _ => format!("MIDI Unknown {:#x} ({desc})", binding.index),
    }
}

impl Resolver<'_> {
    /// Description of a button binding, e.g. `"Button 3 (Pad)"`.
    pub fn button_display(&self, binding: &ButtonBinding) -> String {
        let index = binding.index as usize;
        let hex = format!("{:#x}", binding.index);
        if binding.is_naive() {
            if binding.index == INVALID_INDEX {
                return String::new();
            }
            return format!("{} (Naive, {hex})", vkey_name(binding.index));
        }
        let Some(device) = self.registry.lookup(&binding.device) else {
            return format!("Device missing ({hex})");
        };
        let desc = device.desc();
        let st = device.lock();
        match &st.payload {
            DevicePayload::Mouse(_) if index < MOUSE_BUTTONS => {
                format!("{} ({desc})", device::mouse_button_name(index))
            }
            DevicePayload::Mouse(_) => format!("Unknown ({desc})"),
            DevicePayload::Keyboard(_) => format!("{} ({desc})", device::key_slot_name(index)),
            DevicePayload::Hid(hid) => {
                let t = binding.analog_type;
                let sign = match t {
                    ButtonAnalogType::None => {
                        return match hid.caps.locate(index) {
                            Some(ControlRef::Button { .. }) => format!(
                                "{} ({desc})",
                                hid.caps.control_name(index).unwrap_or_default()
                            ),
                            _ => format!("Invalid button ({desc})"),
                        };
                    }
                    ButtonAnalogType::Positive => "+",
                    ButtonAnalogType::Negative => "-",
                    ButtonAnalogType::Any => "*",
                    t if t.is_hat() => return format!("{} ({desc})", t.display_name()),
                    _ => return format!("Unknown analog type ({desc})"),
                };
                match hid.caps.locate(index) {
                    Some(ControlRef::Value(v)) => {
                        format!("{}{sign} ({desc})", hid.caps.values[v].name)
                    }
                    _ => format!("Invalid analog ({desc})"),
                }
            }
            DevicePayload::Midi(_) => midi_button(binding, desc),
            DevicePayload::VendorIoBoard(board) if index < board.inputs.len() => {
                format!("Input {} ({desc})", index + 1)
            }
            DevicePayload::Destroyed => format!("Device unplugged ({hex})"),
            _ => format!("Unknown device type ({hex})"),
        }
    }

    /// Description of an analog binding, e.g. `"X (Mouse)"`.
    pub fn analog_display(&self, binding: &AnalogBinding) -> String {
        if binding.device.is_empty() {
            return String::new();
        }
        let index = binding.index as usize;
        let hex = format!("{:#x}", binding.index);
        let Some(device) = self.registry.lookup(&binding.device) else {
            return format!("Device missing ({hex})");
        };
        let desc = device.desc();
        let st = device.lock();
        match &st.payload {
            DevicePayload::Mouse(_) => format!("{} ({desc})", device::mouse_axis_name(index)),
            DevicePayload::Hid(hid) => match hid.caps.locate(index) {
                Some(ControlRef::Value(v)) => format!("{} ({desc})", hid.caps.values[v].name),
                _ => format!("Invalid Axis ({hex})"),
            },
            DevicePayload::Midi(_) => match midi::analog_label(index) {
                Some(label) => format!("{label} ({desc})"),
                None => format!("MIDI Unknown Index {hex} ({desc})"),
            },
            DevicePayload::Destroyed => format!("Device unplugged ({hex})"),
            _ => format!("Unknown Axis ({hex})"),
        }
    }

    /// Description of a light binding, e.g. `"Light 2 (0x1 - Light Board)"`.
    pub fn light_display(&self, binding: &LightBinding) -> String {
        if binding.device.is_empty() {
            return String::new();
        }
        let index = binding.index as usize;
        let hex = format!("{:#x}", binding.index);
        let Some(device) = self.registry.lookup(&binding.device) else {
            return format!("Device missing ({hex})");
        };
        let desc = device.desc();
        let st = device.lock();
        let board_light = |count: usize| {
            if index < count {
                format!("Light {} ({hex} - {desc})", index + 1)
            } else {
                format!("Invalid Light ({hex})")
            }
        };
        match &st.payload {
            DevicePayload::Hid(hid) => match hid.caps.output_name(index) {
                Some(name) => format!("{name} ({hex} - {desc})"),
                None => format!("Invalid Light ({hex})"),
            },
            DevicePayload::SerialLightBoard(board) => board_light(board.lights.len()),
            DevicePayload::VendorIoBoard(board) => board_light(board.lights.len()),
            DevicePayload::Destroyed => format!("Device unplugged ({hex})"),
            _ => format!("Unknown Light ({hex})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DeviceSpec;
    use crate::capability::CapabilityModel;
    use crate::config::EngineConfig;
    use crate::registry::DeviceRegistry;
    use crate::resolve::testing::FakeKeys;
    use crate::state::{HidState, KeyboardState, LightBoardState, MouseState};
    use std::sync::Arc;

    // 2 buttons and an X axis, plus one LED output and padding
    const PAD: &[u8] = &[
        0x05, 0x09, 0x19, 0x01, 0x29, 0x02, 0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95, 0x02, 0x81,
        0x02, 0x75, 0x06, 0x95, 0x01, 0x81, 0x03, 0x05, 0x01, 0x09, 0x30, 0x26, 0xFF, 0x00, 0x75,
        0x08, 0x95, 0x01, 0x81, 0x02, 0x05, 0x08, 0x09, 0x01, 0x25, 0x01, 0x75, 0x01, 0x95, 0x01,
        0x91, 0x02, 0x75, 0x07, 0x95, 0x01, 0x91, 0x03,
    ];

    fn registry() -> DeviceRegistry {
        let reg = DeviceRegistry::new(EngineConfig::default());
        let specs = [
            DeviceSpec::new(
                "pad",
                "Pad",
                DevicePayload::Hid(Box::new(HidState::new(
                    CapabilityModel::from_descriptor(PAD).unwrap(),
                ))),
            ),
            DeviceSpec::new("kbd", "Keyboard", DevicePayload::Keyboard(KeyboardState::default())),
            DeviceSpec::new("mouse", "Mouse", DevicePayload::Mouse(MouseState::default())),
            DeviceSpec::new("midi", "Keys", DevicePayload::Midi(Box::default())),
            DeviceSpec::new(
                "board",
                "Board",
                DevicePayload::SerialLightBoard(LightBoardState::new(2)),
            ),
        ];
        for spec in specs {
            reg.upsert(spec);
        }
        reg
    }

    #[test]
    fn test_button_strings() {
        let reg = registry();
        let r = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        assert_eq!(r.button_display(&ButtonBinding::new("A")), "");
        assert_eq!(r.button_display(&ButtonBinding::naive("A", 0x41)), "A (Naive, 0x41)");
        assert_eq!(
            r.button_display(&ButtonBinding::device("A", "gone", 3)),
            "Device missing (0x3)"
        );
        assert_eq!(
            r.button_display(&ButtonBinding::device("A", "mouse", 0)),
            "Left Mouse (Mouse)"
        );
        assert_eq!(
            r.button_display(&ButtonBinding::device("A", "kbd", 0x41)),
            "A (Keyboard)"
        );
        assert_eq!(
            r.button_display(&ButtonBinding::device("A", "pad", 1)),
            "Button 2 (Pad)"
        );
        assert_eq!(
            r.button_display(&ButtonBinding::device("A", "pad", 2)),
            "Invalid button (Pad)"
        );
        assert_eq!(
            r.button_display(
                &ButtonBinding::device("A", "pad", 2).with_analog_type(ButtonAnalogType::Negative)
            ),
            "X- (Pad)"
        );
        assert_eq!(
            r.button_display(
                &ButtonBinding::device("A", "pad", 2).with_analog_type(ButtonAnalogType::HatLeft)
            ),
            "Hat Left (Pad)"
        );
    }

    #[test]
    fn test_midi_button_strings() {
        let reg = registry();
        let r = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let b = |index, t| ButtonBinding::device("A", "midi", index).with_analog_type(t);
        assert_eq!(
            r.button_display(&b(128 + 60, ButtonAnalogType::None)),
            "MIDI Note Ch.2 #60 C4 (Keys)"
        );
        assert_eq!(
            r.button_display(&b(33, ButtonAnalogType::MidiCtrlPrecision)),
            "MIDI Prec Ctrl Ch.2 CC#1 (Keys)"
        );
        assert_eq!(
            r.button_display(&b(26, ButtonAnalogType::MidiCtrlSingle)),
            "MIDI Ctrl Ch.1 CC#102 (Keys)"
        );
        assert_eq!(
            r.button_display(&b(7, ButtonAnalogType::MidiCtrlOnOff)),
            "MIDI OnOff Ch.2 CC#65 (Keys)"
        );
        assert_eq!(
            r.button_display(&b(3, ButtonAnalogType::MidiPitchUp)),
            "MIDI Pitch Up Ch.4 (Keys)"
        );
    }

    #[test]
    fn test_analog_and_light_strings() {
        let reg = registry();
        let r = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        assert_eq!(r.analog_display(&AnalogBinding::new("X")), "");
        assert_eq!(
            r.analog_display(&AnalogBinding::device("X", "mouse", 2)),
            "Scroll Wheel (Mouse)"
        );
        assert_eq!(r.analog_display(&AnalogBinding::device("X", "pad", 2)), "X (Pad)");
        assert_eq!(
            r.analog_display(&AnalogBinding::device("X", "pad", 0)),
            "Invalid Axis (0x0)"
        );
        assert_eq!(
            r.analog_display(&AnalogBinding::device("X", "midi", 0)),
            "MIDI Prec Ctrl Ch.1 CC#0 (Keys)"
        );

        assert_eq!(r.light_display(&LightBinding::new("L")), "");
        assert_eq!(
            r.light_display(&LightBinding::device("L", "board", 1)),
            "Light 2 (0x1 - Board)"
        );
        assert_eq!(
            r.light_display(&LightBinding::device("L", "board", 2)),
            "Invalid Light (0x2)"
        );
        assert_eq!(
            r.light_display(&LightBinding::device("L", "pad", 0)),
            "Num Lock (0x0 - Pad)"
        );

        reg.remove("board");
        assert_eq!(
            r.light_display(&LightBinding::device("L", "board", 1)),
            "Device unplugged (0x1)"
        );
    }
}
