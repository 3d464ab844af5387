//! Light output.

use super::Resolver;
use crate::binding::LightBinding;

impl Resolver<'_> {
    /// Drive a light, clamped to `[0, 1]`.
    ///
    /// An override on the binding replaces `value` on the device and is
    /// pushed down to every alternative; without one, alternatives lose any
    /// override they carried and receive `value`. The device is only marked
    /// output-pending when the stored state actually changes.
    pub fn write_light(&self, binding: &mut LightBinding, value: f32) {
        let value = value.clamp(0.0, 1.0);
        binding.runtime.last_state = value;
        let forced = binding
            .runtime
            .override_enabled
            .then_some(binding.runtime.override_state);

        if let Some(device) = self.registry.lookup(&binding.device) {
            device.set_output(binding.index as usize, forced.unwrap_or(value));
        }

        for alt in &mut binding.alternatives {
            match forced {
                Some(state) => {
                    alt.set_override(state);
                    self.write_light(alt, state);
                }
                None => {
                    alt.clear_override();
                    self.write_light(alt, value);
                }
            }
        }
    }

    /// Last value written through this binding, or its override.
    pub fn read_light(&self, binding: &LightBinding) -> f32 {
        if binding.runtime.override_enabled {
            binding.runtime.override_state
        } else {
            binding.runtime.last_state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DeviceSpec;
    use crate::capability::CapabilityModel;
    use crate::config::EngineConfig;
    use crate::device::DevicePayload;
    use crate::registry::{DeviceRegistry, FlushMode};
    use crate::resolve::testing::FakeKeys;
    use crate::state::{HidState, LightBoardState};
    use std::sync::Arc;

    // 2 LED bits, 6 bits padding, one 8-bit value output
    const LEDS: &[u8] = &[
        0x05, 0x08, 0x19, 0x01, 0x29, 0x02, 0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95, 0x02, 0x91,
        0x02, 0x75, 0x06, 0x95, 0x01, 0x91, 0x03, 0x09, 0x4B, 0x26, 0xFF, 0x00, 0x75, 0x08, 0x95,
        0x01, 0x91, 0x02,
    ];

    fn registry() -> DeviceRegistry {
        let reg = DeviceRegistry::new(EngineConfig::default());
        reg.upsert(DeviceSpec::new(
            "pad",
            "Pad",
            DevicePayload::Hid(Box::new(HidState::new(
                CapabilityModel::from_descriptor(LEDS).unwrap(),
            ))),
        ));
        reg.upsert(DeviceSpec::new(
            "board",
            "Light Board",
            DevicePayload::SerialLightBoard(LightBoardState::new(4)),
        ));
        reg
    }

    #[test]
    fn test_hid_button_and_value_outputs() {
        let reg = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let pad = reg.lookup("pad").unwrap();

        let mut led = LightBinding::device("Start", "pad", 1);
        resolver.write_light(&mut led, 0.7);
        assert_eq!(pad.output(1), Some(1.0));
        assert_eq!(resolver.read_light(&led), 0.7);
        assert!(pad.lock().output_pending);

        let mut dim = LightBinding::device("Dim", "pad", 2);
        resolver.write_light(&mut dim, 1.5);
        assert_eq!(pad.output(2), Some(1.0));
        assert_eq!(resolver.read_light(&dim), 1.0);
    }

    #[test]
    fn test_unchanged_value_is_not_pending() {
        let reg = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let board = reg.lookup("board").unwrap();
        let mut lamp = LightBinding::device("Lamp", "board", 0);

        resolver.write_light(&mut lamp, 1.0);
        reg.flush(FlushMode::Blocking);
        assert!(!board.lock().output_pending);
        resolver.write_light(&mut lamp, 0.9);
        assert!(!board.lock().output_pending);
        assert!(board.lock().output_enabled);
    }

    #[test]
    fn test_override_propagates_to_alternatives() {
        let reg = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let board = reg.lookup("board").unwrap();
        let mut lamp = LightBinding::device("Lamp", "pad", 0)
            .with_alternative(LightBinding::device("Lamp", "board", 3));

        lamp.set_override(1.0);
        resolver.write_light(&mut lamp, 0.0);
        assert_eq!(resolver.read_light(&lamp), 1.0);
        assert_eq!(board.output(3), Some(1.0));
        assert!(lamp.alternatives[0].runtime.override_enabled);

        lamp.clear_override();
        resolver.write_light(&mut lamp, 0.0);
        assert_eq!(board.output(3), Some(0.0));
        assert!(!lamp.alternatives[0].runtime.override_enabled);
        assert_eq!(resolver.read_light(&lamp), 0.0);
    }

    #[test]
    fn test_missing_device_still_records_state() {
        let reg = registry();
        let resolver = Resolver::with_keys(&reg, Arc::new(FakeKeys::default()));
        let mut lamp = LightBinding::device("Lamp", "gone", 0);
        resolver.write_light(&mut lamp, 0.4);
        assert_eq!(resolver.read_light(&lamp), 0.4);
        let mut unbound = LightBinding::new("Unbound");
        resolver.write_light(&mut unbound, -1.0);
        assert_eq!(resolver.read_light(&unbound), 0.0);
    }
}
