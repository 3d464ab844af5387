use iovirt::binding::AnalogRuntime;
use iovirt::resolve::transform::{
    angular_difference, apply_angular_sensitivity, apply_deadzone, apply_multiplier,
    smoothed_angle,
};
use proptest::prelude::*;
use std::f32::consts::{PI, TAU};

proptest! {
    #[test]
    fn deadzone_keeps_center_and_range(d in 0.0f32..1.0, v in 0.0f32..=1.0, mirror: bool) {
        prop_assert_eq!(apply_deadzone(0.5, d, mirror), 0.5);
        let out = apply_deadzone(v, d, mirror);
        prop_assert!((0.0..=1.0).contains(&out), "out of range: {}", out);
    }

    #[test]
    fn negative_deadzone_stays_in_range(d in -0.99f32..0.0, v in 0.0f32..=1.0, mirror: bool) {
        let out = apply_deadzone(v, d, mirror);
        prop_assert!((0.0..=1.0).contains(&out), "out of range: {}", out);
    }

    #[test]
    fn multiplier_is_fractional_part(v in 0.0f32..1.0, m in 2i32..16) {
        let mut rt = AnalogRuntime::default();
        let out = apply_multiplier(v, m, &mut rt);
        prop_assert!((0.0..1.0).contains(&out));
        let expected = (v * m as f32).fract();
        prop_assert!((out - expected).abs() < 1e-5, "{} vs {}", out, expected);
    }

    #[test]
    fn divisor_reconstructs_position(
        steps in prop::collection::vec(1u32..200, 1..300),
        m in -8i32..=-2,
    ) {
        // steps are multiples of 1/1024 so positions are exact in f32
        let n = -m;
        let mut rt = AnalogRuntime::default();
        let mut pos = 0u32;
        for step in steps {
            pos += step;
            let turns = pos / 1024;
            let v = (pos % 1024) as f32 / 1024.0;
            let out = apply_multiplier(v, m, &mut rt);
            let expected = ((turns % n as u32) as f32 + v) / n as f32;
            prop_assert!((out - expected).abs() < 1e-5, "pos {}: {} vs {}", pos, out, expected);
        }
    }

    #[test]
    fn smoothing_converges_on_constant_angle(angle in 0.0f32..TAU) {
        let mut rt = AnalogRuntime::default();
        let mut out = 0.0;
        for ms in 1..=100 {
            out = smoothed_angle(angle, ms as f64, &mut rt);
        }
        prop_assert!(angular_difference(angle, out).abs() < 1e-3, "{} vs {}", out, angle);
    }

    #[test]
    fn half_turn_picks_opposite_windings(eps in 0.01f32..0.5) {
        prop_assert!(angular_difference(0.0, PI - eps) > 0.0);
        prop_assert!(angular_difference(0.0, PI + eps) < 0.0);

        let mut short = AnalogRuntime::default();
        let mut long = AnalogRuntime::default();
        let a = apply_angular_sensitivity(PI - eps, 0.5, &mut short);
        let b = apply_angular_sensitivity(PI + eps, 0.5, &mut long);
        prop_assert!(a < PI, "{}", a);
        prop_assert!(b > PI, "{}", b);
    }
}
