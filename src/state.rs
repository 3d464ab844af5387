//! Live per-kind device buffers.
//!
//! Each struct here is the payload of one [`DevicePayload`](crate::device::DevicePayload)
//! variant and is only ever touched under the owning device's lock.

use crate::capability::report::{byte_len, extract_bits, insert_bits, sign_extend};
use crate::capability::{ButtonLayout, ButtonRange, CapabilityModel, ControlRef, ValueCap};
use crate::event::KeyPrefix;
use std::collections::BTreeMap;
use std::time::Duration;

pub const KEY_SLOTS: usize = 1024;
pub const MOUSE_BUTTONS: usize = 16;
/// `WHEEL_DELTA`: wheel units per notch.
pub const WHEEL_DELTA: i64 = 120;

const VK_SHIFT_MAKE_LEFT: u16 = 42;
const VK_SHIFT_MAKE_RIGHT: u16 = 54;
const VK_CONTROL: usize = 0x11;
const VK_LSHIFT: usize = 0xA0;
const VK_RSHIFT: usize = 0xA1;
const VK_LCONTROL: usize = 0xA2;
const VK_RCONTROL: usize = 0xA3;

/// One boolean control with its last transition times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSlot {
    pub pressed: bool,
    pub pressed_at: Option<Duration>,
    pub released_at: Option<Duration>,
}

impl ButtonSlot {
    /// Record a sample. Returns true on a transition.
    pub fn set(&mut self, pressed: bool, now: Duration) -> bool {
        if self.pressed == pressed {
            return false;
        }
        self.pressed = pressed;
        if pressed {
            self.pressed_at = Some(now);
        } else {
            self.released_at = Some(now);
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct KeyboardState {
    pub keys: Vec<ButtonSlot>,
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self {
            keys: vec![ButtonSlot::default(); KEY_SLOTS],
        }
    }
}

impl KeyboardState {
    /// Slot index of a key event. Left/right modifiers get their own codes.
    pub fn slot(vkey: u16, make_code: u16, prefix: KeyPrefix) -> Option<usize> {
        if vkey >= 255 {
            return None;
        }
        let bank = prefix.bank();
        let index = match bank + vkey as usize {
            i if i == VK_CONTROL => VK_LCONTROL,
            i if i == 256 + VK_CONTROL => VK_RCONTROL,
            i => i,
        };
        let index = match make_code {
            VK_SHIFT_MAKE_LEFT => VK_LSHIFT,
            VK_SHIFT_MAKE_RIGHT => VK_RSHIFT,
            _ => index,
        };
        (index < KEY_SLOTS).then_some(index)
    }

    pub fn set_key(
        &mut self,
        vkey: u16,
        make_code: u16,
        prefix: KeyPrefix,
        pressed: bool,
        now: Duration,
    ) -> bool {
        match Self::slot(vkey, make_code, prefix) {
            Some(i) => self.keys[i].set(pressed, now),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MouseState {
    pub buttons: Vec<ButtonSlot>,
    pub pos_x: i64,
    pub pos_y: i64,
    /// Accumulated notches.
    pub pos_wheel: i64,
}

impl Default for MouseState {
    fn default() -> Self {
        Self {
            buttons: vec![ButtonSlot::default(); MOUSE_BUTTONS],
            pos_x: 0,
            pos_y: 0,
            pos_wheel: 0,
        }
    }
}

impl MouseState {
    pub fn move_to(&mut self, x: i32, y: i32, absolute: bool) -> bool {
        let before = (self.pos_x, self.pos_y);
        if absolute {
            self.pos_x = x as i64;
            self.pos_y = y as i64;
        } else {
            self.pos_x += x as i64;
            self.pos_y += y as i64;
        }
        before != (self.pos_x, self.pos_y)
    }

    pub fn wheel(&mut self, delta: i16) -> bool {
        let notches = delta as i64 / WHEEL_DELTA;
        self.pos_wheel += notches;
        notches != 0
    }

    pub fn set_button(&mut self, button: u8, pressed: bool, now: Duration) -> bool {
        self.buttons
            .get_mut(button as usize)
            .map(|b| b.set(pressed, now))
            .unwrap_or(false)
    }

    /// Raw position of analog index 0 (X), 1 (Y) or 2 (wheel).
    pub fn axis(&self, index: usize) -> Option<i64> {
        match index {
            0 => Some(self.pos_x),
            1 => Some(self.pos_y),
            2 => Some(self.pos_wheel),
            _ => None,
        }
    }
}

/// Scaled value plus the raw integer it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueSlot {
    pub value: f32,
    pub raw: i32,
    /// Live calibration range; starts at the descriptor's logical range.
    pub min: i32,
    pub max: i32,
}

impl ValueSlot {
    fn new(cap: &ValueCap) -> Self {
        Self {
            value: cap.initial_value(),
            raw: 0,
            min: cap.logical_min,
            max: cap.logical_max,
        }
    }

    fn update(&mut self, cap: &ValueCap, raw: i32) -> bool {
        let value = if cap.is_hat() {
            if raw < cap.logical_min || raw > cap.logical_max {
                -1.0
            } else if cap.logical_max == cap.logical_min {
                0.0
            } else {
                (raw - cap.logical_min) as f32 / (cap.logical_max - cap.logical_min) as f32
            }
        } else {
            self.min = self.min.min(raw);
            self.max = self.max.max(raw);
            if self.max == self.min {
                0.5
            } else {
                (raw as i64 - self.min as i64) as f32 / (self.max as i64 - self.min as i64) as f32
            }
        };
        self.raw = raw;
        let changed = value != self.value;
        self.value = value;
        changed
    }
}

/// Buffers of a generic HID device.
#[derive(Debug, Clone)]
pub struct HidState {
    pub caps: CapabilityModel,
    /// One vector per input button range.
    pub buttons: Vec<Vec<ButtonSlot>>,
    pub values: Vec<ValueSlot>,
    pub button_outputs: Vec<Vec<bool>>,
    pub value_outputs: Vec<f32>,
}

impl HidState {
    pub fn new(caps: CapabilityModel) -> Self {
        Self {
            buttons: caps
                .buttons
                .iter()
                .map(|r| vec![ButtonSlot::default(); r.len()])
                .collect(),
            values: caps.values.iter().map(ValueSlot::new).collect(),
            button_outputs: caps
                .button_outputs
                .iter()
                .map(|r| vec![false; r.len()])
                .collect(),
            value_outputs: vec![0.0; caps.value_outputs.len()],
            caps,
        }
    }

    /// Boolean input at a unified index; `None` for value indices.
    pub fn button(&self, index: usize) -> Option<&ButtonSlot> {
        match self.caps.locate(index)? {
            ControlRef::Button { range, offset } => self.buttons[range].get(offset),
            ControlRef::Value(_) => None,
        }
    }

    /// Scaled value at a unified index; `None` for button indices.
    pub fn value(&self, index: usize) -> Option<&ValueSlot> {
        match self.caps.locate(index)? {
            ControlRef::Value(i) => self.values.get(i),
            ControlRef::Button { .. } => None,
        }
    }

    /// Decode one input report. Returns true if any control changed.
    pub fn ingest_report(&mut self, data: &[u8], now: Duration) -> bool {
        let (report_id, payload) = if self.caps.uses_report_ids {
            match data.split_first() {
                Some((id, rest)) => (*id, rest),
                None => return false,
            }
        } else {
            (0, data)
        };

        let mut changed = false;
        for (range, slots) in self.caps.buttons.iter().zip(self.buttons.iter_mut()) {
            if range.report_id != report_id {
                continue;
            }
            let Some(pressed) = decode_range(range, payload) else {
                continue;
            };
            for (slot, p) in slots.iter_mut().zip(pressed) {
                changed |= slot.set(p, now);
            }
        }
        for (cap, slot) in self.caps.values.iter().zip(self.values.iter_mut()) {
            if cap.report_id != report_id {
                continue;
            }
            let Some(bits) = extract_bits(payload, cap.bit_offset, cap.bit_size) else {
                continue;
            };
            let raw = if cap.is_signed() {
                sign_extend(bits, cap.bit_size)
            } else {
                bits as i32
            };
            changed |= slot.update(cap, raw);
        }
        changed
    }

    /// Set an output at a unified output index. Returns true if it changed.
    pub fn set_output(&mut self, index: usize, value: f32) -> bool {
        match self.caps.locate_output(index) {
            Some(ControlRef::Button { range, offset }) => {
                let on = value > 0.5;
                match self.button_outputs[range].get_mut(offset) {
                    Some(slot) if *slot != on => {
                        *slot = on;
                        true
                    }
                    _ => false,
                }
            }
            Some(ControlRef::Value(i)) => match self.value_outputs.get_mut(i) {
                Some(slot) if *slot != value => {
                    *slot = value;
                    true
                }
                _ => false,
            },
            None => false,
        }
    }

    /// Current output value at a unified output index.
    pub fn output(&self, index: usize) -> Option<f32> {
        match self.caps.locate_output(index)? {
            ControlRef::Button { range, offset } => self.button_outputs[range]
                .get(offset)
                .map(|&on| if on { 1.0 } else { 0.0 }),
            ControlRef::Value(i) => self.value_outputs.get(i).copied(),
        }
    }

    /// Encode every output report, one per report id, each prefixed by its id byte.
    pub fn encode_output(&self, brightness: u8) -> Vec<Vec<u8>> {
        let mut reports: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
        for range in &self.caps.button_outputs {
            grow(&mut reports, range.report_id, range.bit_offset + range.bit_len());
        }
        for cap in &self.caps.value_outputs {
            grow(&mut reports, cap.report_id, cap.bit_offset + cap.bit_size);
        }

        for (range, states) in self.caps.button_outputs.iter().zip(&self.button_outputs) {
            if let Some(buf) = reports.get_mut(&range.report_id) {
                encode_range(range, states, &mut buf[1..]);
            }
        }
        let scale = brightness.min(100) as f64 / 100.0;
        for (cap, &v) in self.caps.value_outputs.iter().zip(&self.value_outputs) {
            let Some(buf) = reports.get_mut(&cap.report_id) else {
                continue;
            };
            let (min, max) = (cap.logical_min as i64, cap.logical_max as i64);
            let scaled = min + ((max - min) as f64 * v as f64 * scale).round() as i64;
            let raw = scaled.clamp(min.min(max), max.max(min)) as i32 as u32;
            insert_bits(&mut buf[1..], cap.bit_offset, cap.bit_size, raw);
        }
        reports.into_values().collect()
    }
}

fn grow(reports: &mut BTreeMap<u8, Vec<u8>>, report_id: u8, bits: u32) {
    let buf = reports.entry(report_id).or_insert_with(|| vec![report_id]);
    let len = 1 + byte_len(bits);
    if buf.len() < len {
        buf.resize(len, 0);
    }
}

/// Pressed state of every usage in a range, or `None` if the report is too short.
fn decode_range(range: &ButtonRange, payload: &[u8]) -> Option<Vec<bool>> {
    let mut pressed = vec![false; range.len()];
    match &range.layout {
        ButtonLayout::Bitfield { bit_size } => {
            for i in 0..(*bit_size as usize).min(pressed.len()) {
                pressed[i] = extract_bits(payload, range.bit_offset + i as u32, 1)? != 0;
            }
        }
        ButtonLayout::Array {
            slot_bits,
            slots,
            logical_min,
            map,
        } => {
            for s in 0..*slots {
                let v = extract_bits(payload, range.bit_offset + s * slot_bits, *slot_bits)?;
                let rel = v as i64 - *logical_min as i64;
                if rel < 0 {
                    continue;
                }
                let usage = match map {
                    Some(map) => match map.get(rel as usize) {
                        Some(&u) => u as i64,
                        None => continue,
                    },
                    None => range.usage_min as i64 + rel,
                };
                let offset = usage - range.usage_min as i64;
                if let Some(p) = usize::try_from(offset).ok().and_then(|o| pressed.get_mut(o)) {
                    *p = true;
                }
            }
        }
    }
    Some(pressed)
}

fn encode_range(range: &ButtonRange, states: &[bool], payload: &mut [u8]) {
    match &range.layout {
        ButtonLayout::Bitfield { .. } => {
            for (i, &on) in states.iter().enumerate() {
                insert_bits(payload, range.bit_offset + i as u32, 1, on as u32);
            }
        }
        ButtonLayout::Array {
            slot_bits,
            slots,
            logical_min,
            map,
        } => {
            let mut active = states.iter().enumerate().filter(|&(_, &on)| on).filter_map(
                |(offset, _)| {
                    let usage = range.usage_min as usize + offset;
                    let rel = match map {
                        Some(map) => map.iter().position(|&u| u as usize == usage)?,
                        None => offset,
                    };
                    Some((rel as i64 + *logical_min as i64) as u32)
                },
            );
            for s in 0..*slots {
                let v = active.next().unwrap_or(0);
                insert_bits(payload, range.bit_offset + s * slot_bits, *slot_bits, v);
            }
        }
    }
}

/// Serial board exposing only lights.
#[derive(Debug, Clone, Default)]
pub struct LightBoardState {
    pub lights: Vec<bool>,
}

impl LightBoardState {
    pub fn new(lights: usize) -> Self {
        Self {
            lights: vec![false; lights],
        }
    }
}

/// Vendor board with boolean inputs and lights.
#[derive(Debug, Clone, Default)]
pub struct IoBoardState {
    pub inputs: Vec<ButtonSlot>,
    pub lights: Vec<bool>,
}

impl IoBoardState {
    pub fn new(inputs: usize, lights: usize) -> Self {
        Self {
            inputs: vec![ButtonSlot::default(); inputs],
            lights: vec![false; lights],
        }
    }

    pub fn set_inputs(&mut self, sample: &[bool], now: Duration) -> bool {
        let mut changed = false;
        for (slot, &p) in self.inputs.iter_mut().zip(sample) {
            changed |= slot.set(p, now);
        }
        changed
    }
}

/// Write one light of a boolean light bank. Returns `None` for a bad index.
pub(crate) fn set_light(lights: &mut [bool], index: usize, value: f32) -> Option<bool> {
    let slot = lights.get_mut(index)?;
    let on = value > 0.5;
    let changed = *slot != on;
    *slot = on;
    Some(changed)
}
