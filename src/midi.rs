//! MIDI ingestion and the note state machine.
//!
//! A MIDI device exposes four buffers per channel:
//!
//! | Buffer | Source | Per channel | Scale |
//! |---|---|---|---|
//! | notes | NOTE-ON/OFF | 128 | velocity / 127 |
//! | precision | CC 0x00–0x1F (MSB) + 0x20–0x3F (LSB) | 32 | 14-bit / 16383 |
//! | single | CC 0x46–0x5F, 0x66–0x77 | 44 | 7-bit / 127 |
//! | on/off | CC 0x40–0x45 | 6 | value ≥ 64 |
//! | pitch | pitch bend | 1 | centered 14-bit |
//!
//! Note buttons are indexed `channel * 128 + note`. Analog indices walk the
//! precision, single, on/off and pitch buffers in that order.
//!
//! ## Note algorithms
//! The algorithm is a process-wide choice ([`MidiAlgorithm`]):
//! - **Legacy** counts NOTE-ON events per key and lets each poll consume one.
//!   Overlapping bindings of the same key can starve each other.
//! - **V2** keeps the last on/off timestamps per key. A key is pressed while
//!   its NOTE-OFF has not been seen after its NOTE-ON, and for a sustain
//!   window after the NOTE-ON in any case (see [`v2_pressed`]). A NOTE-ON at
//!   or below the key's velocity threshold counts as NOTE-OFF.
//! - **V2-drum** is V2 where every accepted NOTE-ON also stamps NOTE-OFF, so
//!   each hit lasts exactly the sustain window; NOTE-OFF and quiet NOTE-ONs
//!   are ignored.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const CHANNELS: usize = 16;
pub const NOTES_PER_CHANNEL: usize = 128;
pub const PRECISION_PER_CHANNEL: usize = 32;
pub const SINGLE_PER_CHANNEL: usize = 44;
pub const ONOFF_PER_CHANNEL: usize = 6;

pub const NOTE_COUNT: usize = CHANNELS * NOTES_PER_CHANNEL;
pub const PRECISION_COUNT: usize = CHANNELS * PRECISION_PER_CHANNEL;
pub const SINGLE_COUNT: usize = CHANNELS * SINGLE_PER_CHANNEL;
pub const ONOFF_COUNT: usize = CHANNELS * ONOFF_PER_CHANNEL;
pub const PITCH_COUNT: usize = CHANNELS;
pub const ANALOG_COUNT: usize = PRECISION_COUNT + SINGLE_COUNT + ONOFF_COUNT + PITCH_COUNT;

/// CCs 0x46..=0x5F map to single slots 0..26; 0x66..=0x77 follow.
const SINGLE_LOW_LEN: usize = 0x5F - 0x46 + 1;

/// Process-wide MIDI note algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MidiAlgorithm {
    Legacy,
    #[default]
    V2,
    V2Drum,
}

impl MidiAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            MidiAlgorithm::Legacy => "legacy",
            MidiAlgorithm::V2 => "v2",
            MidiAlgorithm::V2Drum => "v2-drum",
        }
    }
}

impl std::fmt::Display for MidiAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel voice messages the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Velocity 0 is kept as NOTE-ON; the state machine decides what it means.
    NoteOn { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, control: u8, value: u8 },
    /// Centered on zero: `-8192..=8191`.
    PitchBend { channel: u8, value: i16 },
    /// Aftertouch, program change, channel pressure and system messages.
    Ignored { status: u8 },
}

impl MidiMessage {
    /// Parse one short message. Running status is not supported.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;
        if status < 0x80 {
            return None;
        }
        let channel = status & 0x0F;
        let b1 = data.get(1).map(|b| b & 0x7F);
        let b2 = data.get(2).map(|b| b & 0x7F);
        match status >> 4 {
            0x8 => Some(MidiMessage::NoteOff {
                channel,
                note: b1?,
                velocity: b2?,
            }),
            0x9 => Some(MidiMessage::NoteOn {
                channel,
                note: b1?,
                velocity: b2?,
            }),
            0xB => Some(MidiMessage::ControlChange {
                channel,
                control: b1?,
                value: b2?,
            }),
            0xE => Some(MidiMessage::PitchBend {
                channel,
                value: ((b1? as i16) | ((b2? as i16) << 7)) - 0x2000,
            }),
            _ => Some(MidiMessage::Ignored { status }),
        }
    }
}

/// V2 note resolution.
///
/// - never turned on: not pressed
/// - off strictly before on: pressed (still held)
/// - otherwise: pressed while `now - on < sustain`
pub fn v2_pressed(
    on: Option<Duration>,
    off: Option<Duration>,
    now: Duration,
    sustain: Duration,
) -> bool {
    let Some(on) = on else {
        return false;
    };
    match off {
        Some(off) if off >= on => now.saturating_sub(on) < sustain,
        _ => true,
    }
}

/// Live buffers of one MIDI device.
#[derive(Debug, Clone)]
pub struct MidiState {
    /// Binding capture mode: thresholds and legacy releases are suspended.
    pub freeze: bool,

    pub velocity: Vec<u8>,
    // legacy
    pub states: Vec<bool>,
    pub events: Vec<u16>,
    // v2
    pub note_on: Vec<Option<Duration>>,
    pub note_off: Vec<Option<Duration>>,
    pub threshold: Vec<u8>,
    pub threshold_latched: Vec<bool>,

    pub precision: Vec<u16>,
    precision_msb: Vec<bool>,
    precision_lsb: Vec<bool>,
    pub single: Vec<u8>,
    pub onoff: Vec<bool>,
    pub onoff_on: Vec<Option<Duration>>,
    pub onoff_off: Vec<Option<Duration>>,
    pub pitch: Vec<i16>,
}

impl Default for MidiState {
    fn default() -> Self {
        Self {
            freeze: false,
            velocity: vec![0; NOTE_COUNT],
            states: vec![false; NOTE_COUNT],
            events: vec![0; NOTE_COUNT],
            note_on: vec![None; NOTE_COUNT],
            note_off: vec![None; NOTE_COUNT],
            threshold: vec![0; NOTE_COUNT],
            threshold_latched: vec![false; NOTE_COUNT],
            precision: vec![0; PRECISION_COUNT],
            precision_msb: vec![false; PRECISION_COUNT],
            precision_lsb: vec![false; PRECISION_COUNT],
            single: vec![0; SINGLE_COUNT],
            onoff: vec![false; ONOFF_COUNT],
            onoff_on: vec![None; ONOFF_COUNT],
            onoff_off: vec![None; ONOFF_COUNT],
            pitch: vec![0; PITCH_COUNT],
        }
    }
}

impl MidiState {
    /// Apply one message. Returns true if any buffer changed.
    pub fn ingest(&mut self, msg: MidiMessage, algorithm: MidiAlgorithm, now: Duration) -> bool {
        match msg {
            MidiMessage::NoteOff { channel, note, .. } => {
                self.note_off_event(note_index(channel, note), algorithm, now)
            }
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on_event(note_index(channel, note), velocity, algorithm, now),
            MidiMessage::ControlChange {
                channel,
                control,
                value,
            } => self.control_change(channel as usize, control, value, algorithm, now),
            MidiMessage::PitchBend { channel, value } => {
                let slot = &mut self.pitch[channel as usize % CHANNELS];
                let changed = *slot != value;
                *slot = value;
                changed
            }
            MidiMessage::Ignored { .. } => false,
        }
    }

    fn note_off_event(&mut self, key: usize, algorithm: MidiAlgorithm, now: Duration) -> bool {
        match algorithm {
            MidiAlgorithm::Legacy => {
                self.velocity[key] = 0;
                if self.events[key] > 0 {
                    self.states[key] = false;
                }
                true
            }
            MidiAlgorithm::V2 => {
                self.note_off[key] = Some(now);
                true
            }
            MidiAlgorithm::V2Drum => false,
        }
    }

    fn note_on_event(
        &mut self,
        key: usize,
        velocity: u8,
        algorithm: MidiAlgorithm,
        now: Duration,
    ) -> bool {
        match algorithm {
            MidiAlgorithm::Legacy => {
                self.velocity[key] = velocity;
                if velocity > 0 {
                    self.states[key] = true;
                    // odd count = pressed; an already-odd count gets one more to close it
                    let step = if self.events[key] % 2 == 1 { 1 } else { 2 };
                    self.events[key] = self.events[key].saturating_add(step);
                } else if !self.freeze {
                    self.states[key] = false;
                }
                true
            }
            MidiAlgorithm::V2 | MidiAlgorithm::V2Drum => {
                let threshold = if self.freeze { 0 } else { self.threshold[key] };
                if threshold < velocity {
                    self.velocity[key] = velocity;
                    self.note_on[key] = Some(now);
                    if algorithm == MidiAlgorithm::V2Drum {
                        self.note_off[key] = Some(now);
                    }
                    true
                } else if algorithm == MidiAlgorithm::V2 {
                    self.note_off[key] = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn control_change(
        &mut self,
        channel: usize,
        control: u8,
        value: u8,
        algorithm: MidiAlgorithm,
        now: Duration,
    ) -> bool {
        let channel = channel % CHANNELS;
        let value16 = value as u16;
        match control {
            0x00..=0x1F => {
                let i = channel * PRECISION_PER_CHANNEL + control as usize;
                if !self.precision_msb[i] {
                    self.precision_msb[i] = true;
                    // an earlier LSB-only value was stored as msb|lsb; keep its MSB part as LSB
                    self.precision[i] >>= 7;
                }
                let old = self.precision[i];
                let mut merged = (old & 0x7F) | value16 << 7;
                if !self.precision_lsb[i] {
                    merged = (merged & (0x7F << 7)) | value16;
                }
                self.precision[i] = merged;
                old != merged
            }
            0x20..=0x3F => {
                let i = channel * PRECISION_PER_CHANNEL + control as usize - 0x20;
                self.precision_lsb[i] = true;
                let old = self.precision[i];
                let merged = if self.precision_msb[i] {
                    (old & (0x7F << 7)) | value16
                } else {
                    value16 << 7 | value16
                };
                self.precision[i] = merged;
                old != merged
            }
            0x40..=0x45 => {
                let i = channel * ONOFF_PER_CHANNEL + control as usize - 0x40;
                let on = value >= 64;
                let previous = self.onoff[i];
                self.onoff[i] = on;
                match algorithm {
                    MidiAlgorithm::Legacy => previous != on,
                    MidiAlgorithm::V2 | MidiAlgorithm::V2Drum => {
                        if !previous && on {
                            self.onoff_on[i] = Some(now);
                            true
                        } else if previous && !on {
                            self.onoff_off[i] = Some(now);
                            true
                        } else {
                            false
                        }
                    }
                }
            }
            0x46..=0x5F | 0x66..=0x77 => {
                let slot = if control <= 0x5F {
                    control as usize - 0x46
                } else {
                    control as usize - 0x66 + SINGLE_LOW_LEN
                };
                let i = channel * SINGLE_PER_CHANNEL + slot;
                let changed = self.single[i] != value;
                self.single[i] = value;
                changed
            }
            // reset all controllers
            0x79 => {
                self.precision[channel * PRECISION_PER_CHANNEL..][..PRECISION_PER_CHANNEL]
                    .fill(0);
                self.single[channel * SINGLE_PER_CHANNEL..][..SINGLE_PER_CHANNEL].fill(0);
                let r = channel * ONOFF_PER_CHANNEL..(channel + 1) * ONOFF_PER_CHANNEL;
                self.onoff[r.clone()].fill(false);
                self.onoff_on[r.clone()].fill(None);
                self.onoff_off[r].fill(None);
                true
            }
            // all notes off (and the mode changes that imply it)
            0x7B..=0x7F => {
                let r = channel * NOTES_PER_CHANNEL..(channel + 1) * NOTES_PER_CHANNEL;
                self.velocity[r.clone()].fill(0);
                self.states[r.clone()].fill(false);
                self.events[r.clone()].fill(0);
                self.note_on[r.clone()].fill(None);
                self.note_off[r].fill(None);
                true
            }
            _ => false,
        }
    }

    /// Legacy poll of a note: consumes one queued event.
    pub fn poll_legacy_note(&mut self, key: usize) -> bool {
        let Some(&count) = self.events.get(key) else {
            return false;
        };
        if count == 0 {
            return false;
        }
        let pressed = count % 2 == 1;
        if !self.states[key] || count > 1 {
            self.events[key] -= 1;
        }
        pressed
    }

    /// Latch the per-key threshold from the first binding that sets one.
    pub fn latch_threshold(&mut self, key: usize, threshold: u8) {
        if threshold > 0 && key < NOTE_COUNT && !self.threshold_latched[key] {
            self.threshold_latched[key] = true;
            self.threshold[key] = threshold;
        }
    }

    /// Scaled analog value at a unified analog index.
    pub fn analog_value(&self, index: usize) -> Option<f32> {
        match analog_slot(index)? {
            AnalogSlot::Precision(i) => Some(self.precision[i] as f32 / 16383.0),
            AnalogSlot::Single(i) => Some(self.single[i] as f32 / 127.0),
            AnalogSlot::OnOff(i) => Some(if self.onoff[i] { 1.0 } else { 0.0 }),
            AnalogSlot::Pitch(i) => Some((self.pitch[i] as f32 + 8192.0) / 16383.0),
        }
    }
}

#[inline]
pub fn note_index(channel: u8, note: u8) -> usize {
    (channel as usize % CHANNELS) * NOTES_PER_CHANNEL + (note as usize & 0x7F)
}

/// Buffer a unified analog index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogSlot {
    Precision(usize),
    Single(usize),
    OnOff(usize),
    Pitch(usize),
}

pub fn analog_slot(index: usize) -> Option<AnalogSlot> {
    let mut i = index;
    if i < PRECISION_COUNT {
        return Some(AnalogSlot::Precision(i));
    }
    i -= PRECISION_COUNT;
    if i < SINGLE_COUNT {
        return Some(AnalogSlot::Single(i));
    }
    i -= SINGLE_COUNT;
    if i < ONOFF_COUNT {
        return Some(AnalogSlot::OnOff(i));
    }
    i -= ONOFF_COUNT;
    (i < PITCH_COUNT).then_some(AnalogSlot::Pitch(i))
}

/// CC number of a single-byte slot within its channel.
pub fn single_control(slot: usize) -> u8 {
    let slot = slot % SINGLE_PER_CHANNEL;
    if slot < SINGLE_LOW_LEN {
        (0x46 + slot) as u8
    } else {
        (0x66 + slot - SINGLE_LOW_LEN) as u8
    }
}

/// `"C4"`-style name of a note number.
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NAMES[note as usize % 12], octave)
}

/// Display label of a unified analog index.
pub fn analog_label(index: usize) -> Option<String> {
    Some(match analog_slot(index)? {
        AnalogSlot::Precision(i) => format!(
            "MIDI Prec Ctrl Ch.{} CC#{}",
            i / PRECISION_PER_CHANNEL + 1,
            i % PRECISION_PER_CHANNEL
        ),
        AnalogSlot::Single(i) => format!(
            "MIDI Ctrl Ch.{} CC#{}",
            i / SINGLE_PER_CHANNEL + 1,
            single_control(i)
        ),
        AnalogSlot::OnOff(i) => format!(
            "MIDI OnOff Ch.{} CC#{}",
            i / ONOFF_PER_CHANNEL + 1,
            i % ONOFF_PER_CHANNEL + 0x40
        ),
        AnalogSlot::Pitch(i) => format!("MIDI Pitch Ch.{}", i + 1),
    })
}
