//! Signal transforms applied to analog values.
//!
//! Values are `[0, 1]` floats centered on 0.5; angles are radians in `[0, 2π)`.

use crate::binding::{AnalogRuntime, VectorSample, SMOOTHING_HISTORY};
use std::f32::consts::{PI, TAU};

/// Samples older than this carry no weight in the circular mean.
pub const SMOOTHING_WINDOW_MS: f64 = 48.0;
/// Reads closer together than this reuse the previous smoothed value.
const SMOOTHING_MIN_STEP_MS: f64 = 0.9;
/// Relative-mode scale of the deflection from center per read.
pub const RELATIVE_SCALE: f32 = 80.0;

/// Wrap into `[0, 1]`.
pub fn normalize(v: f32) -> f32 {
    if v < 0.0 {
        v + v.trunc().abs() + 1.0
    } else if v > 1.0 {
        v.fract()
    } else {
        v
    }
}

/// Wrap into `[0, 2π)`.
pub fn normalize_angle(rads: f32) -> f32 {
    let r = rads.rem_euclid(TAU);
    if r >= TAU {
        0.0
    } else {
        r
    }
}

/// Remap around a deadzone.
///
/// Positive `dz` opens a gap of width `dz` around center (or, mirrored,
/// stretches the center band so the outer `dz/2` on each side saturates).
/// Negative `dz` ignores the bottom `-dz` of the range (mirrored: the top).
pub fn apply_deadzone(v: f32, dz: f32, mirror: bool) -> f32 {
    if dz > 0.0 {
        let delta = v - 0.5;
        let dtlen = 1.0 - dz;
        if mirror {
            if dtlen == 0.0 {
                return 0.5;
            }
            return (0.5 + delta / dtlen).clamp(0.0, 1.0);
        }
        let limit = dz * 0.5;
        if dtlen == 0.0 {
            0.5
        } else if delta > limit {
            (0.5 + ((delta - limit) / dtlen).max(0.0)).min(1.0)
        } else if delta < -limit {
            (0.5 + ((delta + limit) / dtlen).min(0.0)).max(0.0)
        } else {
            0.5
        }
    } else if dz < 0.0 {
        let v = if mirror { 1.0 - v } else { v };
        let out = if dz > -1.0 && v > -dz {
            ((v + dz) / (1.0 + dz)).min(1.0)
        } else {
            0.0
        };
        if mirror {
            1.0 - out
        } else {
            out
        }
    } else {
        v
    }
}

/// Multiplier (`m > 1`) or divisor (`m < -1`) transform.
///
/// A multiplier repeats the range `m` times per revolution. A divisor stretches
/// one revolution over `-m`, tracking the current region from wrap crossings.
pub fn apply_multiplier(v: f32, m: i32, rt: &mut AnalogRuntime) -> f32 {
    if m > 1 {
        let r = (v * m as f32).rem_euclid(1.0);
        if r >= 1.0 {
            0.0
        } else {
            r
        }
    } else if m < -1 {
        let n = m.unsigned_abs();
        if rt.divisor_previous > 0.75 && v < 0.25 {
            rt.divisor_region = (rt.divisor_region + 1) % n;
        } else if rt.divisor_previous < 0.25 && v > 0.75 {
            rt.divisor_region = if rt.divisor_region == 0 {
                n - 1
            } else {
                rt.divisor_region - 1
            };
        }
        rt.divisor_previous = v;
        (rt.divisor_region as f32 + v) / n as f32
    } else {
        v
    }
}

/// Time-decayed circular mean of recent angles.
pub fn smoothed_angle(raw_rads: f32, now_ms: f64, rt: &mut AnalogRuntime) -> f32 {
    if now_ms - rt.history[rt.history_index].time_ms < SMOOTHING_MIN_STEP_MS {
        return rt.smoothed_last;
    }
    rt.history_index = (rt.history_index + 1) % SMOOTHING_HISTORY;
    rt.history[rt.history_index] = VectorSample {
        time_ms: now_ms,
        sine: raw_rads.sin(),
        cosine: raw_rads.cos(),
    };

    let mut sin_sum = 0.0f32;
    let mut cos_sum = 0.0f32;
    for sample in &rt.history {
        let dt = (now_ms - sample.time_ms).max(0.0);
        let weight = 1.0 - dt / SMOOTHING_WINDOW_MS;
        if weight > 0.0 {
            sin_sum += sample.sine * weight as f32;
            cos_sum += sample.cosine * weight as f32;
        }
    }
    if cos_sum == 0.0 {
        cos_sum = f32::MIN_POSITIVE;
    }
    rt.smoothed_last = normalize_angle(sin_sum.atan2(cos_sum));
    rt.smoothed_last
}

/// Shortest signed delta from `old` to `new`, assuming < half a turn per read.
pub fn angular_difference(old: f32, new: f32) -> f32 {
    let delta = new - old;
    if delta.abs() >= PI {
        if delta < 0.0 {
            TAU + delta
        } else {
            -(TAU - delta)
        }
    } else {
        delta
    }
}

/// Integrate scaled angular deltas into a running angle.
pub fn apply_angular_sensitivity(raw_rads: f32, sensitivity: f32, rt: &mut AnalogRuntime) -> f32 {
    let delta = angular_difference(rt.previous_raw_rads, raw_rads);
    rt.previous_raw_rads = raw_rads;
    rt.adjusted_rads = normalize_angle(rt.adjusted_rads + delta * sensitivity);
    rt.adjusted_rads
}

/// Relative mode: integrate the deflection from center into an absolute value.
pub fn apply_relative(
    v: f32,
    multiplier: i32,
    sensitivity: Option<f32>,
    rt: &mut AnalogRuntime,
) -> f32 {
    let mut delta = (v - 0.5) / RELATIVE_SCALE;
    if multiplier < -1 {
        delta /= multiplier.unsigned_abs() as f32;
    } else if multiplier > 1 {
        delta *= multiplier as f32;
    }
    if let Some(s) = sensitivity {
        delta *= s;
    }
    rt.relative_absolute = normalize(rt.relative_absolute + delta);
    rt.relative_absolute
}

/// Hold back `depth` values. Returns `None` while the buffer fills.
pub fn delay(v: f32, depth: usize, rt: &mut AnalogRuntime) -> Option<f32> {
    while rt.delay.len() >= depth {
        rt.delay.pop_front();
    }
    rt.delay.push_back(v);
    if rt.delay.len() < depth {
        None
    } else {
        rt.delay.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_deadzone_center_gap() {
        assert_eq!(apply_deadzone(0.5, 0.2, false), 0.5);
        assert_eq!(apply_deadzone(0.55, 0.2, false), 0.5);
        assert!(close(apply_deadzone(0.6, 0.2, false), 0.5));
        assert!(close(apply_deadzone(1.0, 0.2, false), 1.0));
        assert!(close(apply_deadzone(0.0, 0.2, false), 0.0));
        assert!(close(apply_deadzone(0.8, 0.2, false), 0.5 + 0.2 / 0.8));
    }

    #[test]
    fn test_deadzone_mirror_and_negative() {
        assert!(close(apply_deadzone(0.9, 0.2, true), 1.0));
        assert!(close(apply_deadzone(0.6, 0.2, true), 0.625));
        assert_eq!(apply_deadzone(0.5, 0.2, true), 0.5);
        assert_eq!(apply_deadzone(0.1, -0.2, false), 0.0);
        assert!(close(apply_deadzone(0.6, -0.2, false), 0.5));
        assert!(close(apply_deadzone(0.9, -0.2, true), 1.0));
        assert_eq!(apply_deadzone(0.3, 0.0, false), 0.3);
        assert_eq!(apply_deadzone(0.7, 1.0, false), 0.5);
    }

    #[test]
    fn test_multiplier_fraction() {
        let mut rt = AnalogRuntime::default();
        assert!(close(apply_multiplier(0.3, 2, &mut rt), 0.6));
        assert!(close(apply_multiplier(0.6, 2, &mut rt), 0.2));
        assert_eq!(apply_multiplier(0.5, 2, &mut rt), 0.0);
        assert_eq!(apply_multiplier(0.3, 1, &mut rt), 0.3);
        assert_eq!(apply_multiplier(0.3, -1, &mut rt), 0.3);
    }

    #[test]
    fn test_divisor_tracks_regions_both_ways() {
        let mut rt = AnalogRuntime::default();
        let n = -3;
        assert!(close(apply_multiplier(0.5, n, &mut rt), 0.5 / 3.0));
        apply_multiplier(0.9, n, &mut rt);
        assert!(close(apply_multiplier(0.1, n, &mut rt), 1.1 / 3.0));
        // backwards across the seam
        apply_multiplier(0.1, n, &mut rt);
        assert!(close(apply_multiplier(0.9, n, &mut rt), 0.9 / 3.0));
        apply_multiplier(0.5, n, &mut rt);
        apply_multiplier(0.1, n, &mut rt);
        assert!(close(apply_multiplier(0.9, n, &mut rt), 2.9 / 3.0));
    }

    #[test]
    fn test_angular_difference_picks_short_way() {
        assert!(close(angular_difference(0.1, 0.3), 0.2));
        assert!(close(angular_difference(6.2, 0.1), 0.1 + TAU - 6.2));
        assert!(close(angular_difference(0.1, 6.2), -(0.1 + TAU - 6.2)));
        let eps = 0.01;
        assert!(angular_difference(0.0, PI - eps) > 0.0);
        assert!(angular_difference(0.0, PI + eps) < 0.0);
    }

    #[test]
    fn test_angular_sensitivity_integrates() {
        let mut rt = AnalogRuntime::default();
        apply_angular_sensitivity(0.0, 2.0, &mut rt);
        let a = apply_angular_sensitivity(0.5, 2.0, &mut rt);
        assert!(close(a, 1.0));
        let b = apply_angular_sensitivity(TAU - 0.5, 2.0, &mut rt);
        assert!(close(b, TAU - 1.0));
    }

    #[test]
    fn test_smoothing_converges_on_constant_input() {
        let mut rt = AnalogRuntime::default();
        let target = 2.0f32;
        let mut out = 0.0;
        for step in 1..=40 {
            out = smoothed_angle(target, step as f64 * 2.0, &mut rt);
        }
        assert!(close(out, target));
        // too soon: reuses last value
        assert_eq!(smoothed_angle(0.0, 80.5, &mut rt), out);
    }

    #[test]
    fn test_relative_mode_integrates_and_wraps() {
        let mut rt = AnalogRuntime::default();
        let v = apply_relative(1.0, 1, None, &mut rt);
        assert!(close(v, 0.5 + 0.5 / 80.0));
        let v = apply_relative(0.5, 1, None, &mut rt);
        assert!(close(v, 0.5 + 0.5 / 80.0));
        rt.relative_absolute = 0.999;
        let v = apply_relative(1.0, 2, None, &mut rt);
        assert!(close(v, 0.999 + 1.0 / 80.0 - 1.0));
        rt.relative_absolute = 0.5;
        assert!(close(apply_relative(0.0, -2, Some(2.0), &mut rt), 0.5 - 0.5 / 80.0));
    }

    #[test]
    fn test_delay_buffer_holds_back() {
        let mut rt = AnalogRuntime::default();
        assert_eq!(delay(0.1, 3, &mut rt), None);
        assert_eq!(delay(0.2, 3, &mut rt), None);
        assert_eq!(delay(0.3, 3, &mut rt), Some(0.1));
        assert_eq!(delay(0.4, 3, &mut rt), Some(0.2));
    }

    #[test]
    fn test_normalize() {
        assert!(close(normalize(1.25), 0.25));
        assert!(close(normalize(-0.25), 0.75));
        assert_eq!(normalize(1.0), 1.0);
        assert!(close(normalize_angle(-0.5), TAU - 0.5));
        assert!(normalize_angle(TAU) < TAU);
    }
}
