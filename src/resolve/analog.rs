//! Analog resolution.

use super::transform::{
    apply_angular_sensitivity, apply_deadzone, apply_multiplier, apply_relative, delay,
    smoothed_angle,
};
use super::Resolver;
use crate::binding::AnalogBinding;
use crate::clock::as_ms;
use crate::device::DevicePayload;
use std::f32::consts::TAU;
use std::time::Duration;

const MOUSE_WHEEL: usize = 2;

/// Raw sample copied out under the device lock.
enum Sample {
    Mouse(i64),
    Hid(f32),
    Midi(f32),
}

/// Mouse positions wrap: X/Y every 256 counts, the wheel every 64 notches.
fn mouse_value(pos: i64, index: usize, sensitivity: f32, invert: bool) -> f32 {
    let val = (pos as f32 * sensitivity).round() as i64;
    let invert = invert != (val < 0);
    let value = if index == MOUSE_WHEEL {
        (val.unsigned_abs() % 65) as f32 / 64.0
    } else {
        (val.unsigned_abs() % 257) as f32 / 256.0
    };
    if invert {
        1.0 - value
    } else {
        value
    }
}

fn with_deadzone(value: f32, binding: &AnalogBinding) -> f32 {
    if binding.is_deadzone_set() {
        apply_deadzone(value, binding.deadzone(), binding.deadzone_mirror)
    } else {
        value
    }
}

/// HID pipeline: invert, deadzone, relative or absolute transform, delay.
/// `None` while the delay buffer fills.
fn hid_value(raw: f32, binding: &mut AnalogBinding, now: Duration) -> Option<f32> {
    let value = if binding.invert { 1.0 - raw } else { raw };
    let mut value = with_deadzone(value, binding);

    let multiplier = binding.multiplier();
    let sensitivity = binding.is_sensitivity_set().then_some(binding.sensitivity());
    let smoothing = binding.smoothing;
    let depth = binding.delay_buffer_depth;
    let relative = binding.is_relative_mode();
    let rt = &mut binding.runtime;

    if relative {
        value = apply_relative(value, multiplier, sensitivity, rt);
    } else {
        value = apply_multiplier(value, multiplier, rt);
        if smoothing || sensitivity.is_some() {
            let mut rads = value * TAU;
            if smoothing {
                // keep a full turn from collapsing onto zero
                if rads >= TAU {
                    rads -= 0.0001;
                }
                rads = smoothed_angle(rads, as_ms(now), rt);
            }
            if let Some(sensitivity) = sensitivity {
                rads = apply_angular_sensitivity(rads, sensitivity, rt);
            }
            value = rads / TAU;
        }
    }

    if depth > 0 {
        delay(value, depth, rt)
    } else {
        Some(value)
    }
}

impl Resolver<'_> {
    /// Current value of an analog in `[0, 1]`.
    ///
    /// An override wins. A missing or destroyed device, an out-of-range index,
    /// a mouse without focus, or a filling delay buffer all return the last
    /// resolved value (0.5 before the first read).
    pub fn resolve_analog(&self, binding: &mut AnalogBinding) -> f32 {
        if binding.runtime.override_enabled {
            return binding.runtime.override_state;
        }
        let Some(device) = self.registry.lookup(&binding.device) else {
            return binding.runtime.last_state;
        };
        let index = binding.index as usize;
        let sample = match &device.lock().payload {
            DevicePayload::Mouse(mouse) => mouse.axis(index).map(Sample::Mouse),
            DevicePayload::Hid(hid) => hid.value(index).map(|v| Sample::Hid(v.value)),
            DevicePayload::Midi(state) => state.analog_value(index).map(Sample::Midi),
            _ => None,
        };
        let Some(sample) = sample else {
            return binding.runtime.last_state;
        };

        let poll = self.poll();
        let value = match sample {
            Sample::Mouse(_) if poll.naive_blocked() => return binding.runtime.last_state,
            Sample::Mouse(pos) => mouse_value(pos, index, binding.sensitivity(), binding.invert),
            Sample::Hid(raw) => match hid_value(raw, binding, poll.now) {
                Some(value) => value,
                None => return binding.runtime.last_state,
            },
            Sample::Midi(raw) => {
                let value = if binding.invert { 1.0 - raw } else { raw };
                with_deadzone(value, binding)
            }
        };
        binding.runtime.last_state = value;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DeviceSpec;
    use crate::capability::CapabilityModel;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::event::InputSample;
    use crate::midi::{ANALOG_COUNT, PITCH_COUNT, PRECISION_COUNT};
    use crate::registry::DeviceRegistry;
    use crate::resolve::testing::FakeKeys;
    use crate::state::{HidState, MouseState};
    use std::sync::Arc;

    // one 8-bit X axis, 0..=255
    const STICK: &[u8] = &[
        0x05, 0x01, 0x09, 0x30, 0x15, 0x00, 0x26, 0xFF, 0x00, 0x75, 0x08, 0x95, 0x01, 0x81, 0x02,
    ];

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn registry() -> (DeviceRegistry, ManualClock) {
        let clock = ManualClock::new(Duration::from_secs(1));
        let reg = DeviceRegistry::with_clock(EngineConfig::default(), Arc::new(clock.clone()));
        reg.upsert(DeviceSpec::new(
            "stick",
            "Stick",
            DevicePayload::Hid(Box::new(HidState::new(
                CapabilityModel::from_descriptor(STICK).unwrap(),
            ))),
        ));
        reg.upsert(DeviceSpec::new(
            "mouse",
            "Mouse",
            DevicePayload::Mouse(MouseState::default()),
        ));
        reg.upsert(DeviceSpec::new(
            "midi",
            "Controller",
            DevicePayload::Midi(Box::default()),
        ));
        (reg, clock)
    }

    fn axis(reg: &DeviceRegistry, raw: u8) {
        reg.ingest("stick", InputSample::HidReport(vec![raw]));
    }

    #[test]
    fn test_hid_invert_and_deadzone() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut a = AnalogBinding::device("X", "stick", 0);
        axis(&reg, 255);
        assert_eq!(resolver.resolve_analog(&mut a), 1.0);
        a.invert = true;
        assert_eq!(resolver.resolve_analog(&mut a), 0.0);

        a.invert = false;
        a.set_deadzone(0.5);
        axis(&reg, 140);
        assert_eq!(resolver.resolve_analog(&mut a), 0.5);
    }

    #[test]
    fn test_hid_relative_mode_integrates() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut a = AnalogBinding::device("Knob", "stick", 0);
        a.set_relative_mode(true);
        axis(&reg, 255);
        assert!(close(resolver.resolve_analog(&mut a), 0.5 + 0.5 / 80.0));
        assert!(close(resolver.resolve_analog(&mut a), 0.5 + 1.0 / 80.0));
    }

    #[test]
    fn test_hid_multiplier_and_delay() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut a = AnalogBinding::device("TT", "stick", 0);
        a.set_multiplier(2);
        a.delay_buffer_depth = 2;
        axis(&reg, 51);
        // buffer still filling: last state
        assert_eq!(resolver.resolve_analog(&mut a), 0.5);
        axis(&reg, 102);
        assert!(close(resolver.resolve_analog(&mut a), 0.4));
        assert!(close(resolver.resolve_analog(&mut a), 0.8));
    }

    #[test]
    fn test_hid_angular_sensitivity() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut a = AnalogBinding::device("TT", "stick", 0);
        a.set_sensitivity(2.0);
        axis(&reg, 0);
        assert!(close(resolver.resolve_analog(&mut a), 0.0));
        axis(&reg, 51);
        assert!(close(resolver.resolve_analog(&mut a), 0.4));
    }

    #[test]
    fn test_missing_destroyed_and_out_of_range() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut gone = AnalogBinding::device("X", "nowhere", 0);
        assert_eq!(resolver.resolve_analog(&mut gone), 0.5);

        let mut a = AnalogBinding::device("X", "stick", 0);
        axis(&reg, 255);
        assert_eq!(resolver.resolve_analog(&mut a), 1.0);
        reg.remove("stick");
        assert_eq!(resolver.resolve_analog(&mut a), 1.0);

        let mut far = AnalogBinding::device("Y", "mouse", 7);
        assert_eq!(resolver.resolve_analog(&mut far), 0.5);
    }

    #[test]
    fn test_extreme_configuration_stays_in_range() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut a: AnalogBinding = serde_json::from_str(
            r#"{"name":"TT","device":"stick","index":0,"multiplier":-2147483648}"#,
        )
        .unwrap();
        axis(&reg, 230);
        axis(&reg, 20);
        let v = resolver.resolve_analog(&mut a);
        assert!((0.0..=1.0).contains(&v), "{v}");
        a.set_relative_mode(true);
        let v = resolver.resolve_analog(&mut a);
        assert!((0.0..=1.0).contains(&v), "{v}");

        let mut x = AnalogBinding::device("X", "mouse", 0);
        x.set_sensitivity(f32::INFINITY);
        reg.ingest("mouse", InputSample::MouseMove { x: -64, y: 0, absolute: true });
        let v = resolver.resolve_analog(&mut x);
        assert!((0.0..=1.0).contains(&v), "{v}");
    }

    #[test]
    fn test_override() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut a = AnalogBinding::device("X", "stick", 0);
        a.set_override(0.2);
        assert_eq!(resolver.resolve_analog(&mut a), 0.2);
    }

    #[test]
    fn test_mouse_axes_wrap_and_focus() {
        let (reg, _) = registry();
        let keys = Arc::new(FakeKeys::default());
        let resolver = Resolver::with_keys(&reg, keys.clone());
        let mut x = AnalogBinding::device("X", "mouse", 0);
        let mut wheel = AnalogBinding::device("W", "mouse", 2);

        reg.ingest("mouse", InputSample::MouseMove { x: 128, y: 0, absolute: true });
        assert_eq!(resolver.resolve_analog(&mut x), 0.5);
        reg.ingest("mouse", InputSample::MouseMove { x: -64, y: 0, absolute: true });
        assert_eq!(resolver.resolve_analog(&mut x), 0.75);
        reg.ingest("mouse", InputSample::MouseMove { x: 257 + 32, y: 0, absolute: true });
        assert_eq!(resolver.resolve_analog(&mut x), 0.125);

        reg.ingest("mouse", InputSample::MouseWheel { delta: 360 });
        assert_eq!(resolver.resolve_analog(&mut wheel), 3.0 / 64.0);

        keys.set_focus(false);
        reg.ingest("mouse", InputSample::MouseMove { x: 0, y: 0, absolute: true });
        assert_eq!(resolver.resolve_analog(&mut x), 0.125);
    }

    #[test]
    fn test_midi_controls() {
        let (reg, _) = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        reg.ingest("midi", InputSample::Midi(vec![0xB0, 0x46, 127]));
        let mut fader = AnalogBinding::device("Fader", "midi", PRECISION_COUNT as u16);
        assert_eq!(resolver.resolve_analog(&mut fader), 1.0);
        fader.invert = true;
        assert_eq!(resolver.resolve_analog(&mut fader), 0.0);

        reg.ingest("midi", InputSample::Midi(vec![0xE0, 0x00, 0x40]));
        let mut pitch = AnalogBinding::device("Pitch", "midi", (ANALOG_COUNT - PITCH_COUNT) as u16);
        pitch.set_deadzone(0.2);
        assert_eq!(resolver.resolve_analog(&mut pitch), 0.5);
    }
}
