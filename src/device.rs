//! Devices owned by the registry.
//!
//! A [`Device`] pairs an immutable identity (id, name, description, metadata)
//! with two locks:
//! - `state`: the kind-specific [`DevicePayload`] plus the dirty/output flags.
//!   Every read or write of live buffers happens under it.
//! - `transport`: the backend's output handle. Output frames are built under
//!   `state` and written under `transport` only after `state` is released, so
//!   slow hardware writes never stall readers.
//!
//! Destruction swaps the payload for [`DevicePayload::Destroyed`]; holders of
//! an `Arc<Device>` observe the tombstone instead of a dangling device.

use crate::capability::usage;
use crate::clock::as_ms;
use crate::error::Result;
use crate::event::{ControlDesc, ControlKind, InputSample};
use crate::keys;
use crate::metadata::DeviceMeta;
use crate::midi::{self, MidiAlgorithm, MidiMessage, MidiState};
use crate::state::{
    self, HidState, IoBoardState, KeyboardState, LightBoardState, MouseState, KEY_SLOTS,
    MOUSE_BUTTONS,
};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Registry-assigned identifier, stable across rescans of the same device.
pub type DeviceId = u32;

/// Device category. Fixed at construction; only `Destroyed` may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Mouse,
    Keyboard,
    HidGeneric,
    Midi,
    SerialLightBoard,
    VendorIoBoard,
    Destroyed,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Mouse => "mouse",
            DeviceKind::Keyboard => "keyboard",
            DeviceKind::HidGeneric => "hid",
            DeviceKind::Midi => "midi",
            DeviceKind::SerialLightBoard => "light-board",
            DeviceKind::VendorIoBoard => "io-board",
            DeviceKind::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific live buffers.
#[derive(Debug, Clone)]
pub enum DevicePayload {
    Mouse(MouseState),
    Keyboard(KeyboardState),
    Hid(Box<HidState>),
    Midi(Box<MidiState>),
    SerialLightBoard(LightBoardState),
    VendorIoBoard(IoBoardState),
    Destroyed,
}

impl DevicePayload {
    pub fn kind(&self) -> DeviceKind {
        match self {
            DevicePayload::Mouse(_) => DeviceKind::Mouse,
            DevicePayload::Keyboard(_) => DeviceKind::Keyboard,
            DevicePayload::Hid(_) => DeviceKind::HidGeneric,
            DevicePayload::Midi(_) => DeviceKind::Midi,
            DevicePayload::SerialLightBoard(_) => DeviceKind::SerialLightBoard,
            DevicePayload::VendorIoBoard(_) => DeviceKind::VendorIoBoard,
            DevicePayload::Destroyed => DeviceKind::Destroyed,
        }
    }
}

/// Encoded output ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFrame {
    /// HID output reports, each starting with its report id byte.
    Reports(Vec<Vec<u8>>),
    /// Full light bank of a board.
    Lights(Vec<bool>),
}

/// Backend-provided output channel of one device.
pub trait Transport: Send {
    fn write(&mut self, frame: &OutputFrame) -> Result<()>;

    /// Release backend resources. Called once, on destruction.
    fn close(&mut self) {}
}

/// Mutable part of a device, guarded by its lock.
#[derive(Debug)]
pub struct DeviceState {
    pub payload: DevicePayload,
    /// Set by ingestion, consumed by `lookup_updated`.
    pub updated: bool,
    pub output_pending: bool,
    /// Nothing is written until a light binding touches the device.
    pub output_enabled: bool,
    pub input_time: Option<Duration>,
    pub input_hz: f64,
    pub input_hz_max: f64,
}

impl DeviceState {
    fn new(payload: DevicePayload) -> Self {
        Self {
            payload,
            updated: false,
            output_pending: false,
            output_enabled: false,
            input_time: None,
            input_hz: 0.0,
            input_hz_max: 0.0,
        }
    }

    fn track_rate(&mut self, now: Duration) {
        let Some(last) = self.input_time else {
            self.input_time = Some(now);
            return;
        };
        let diff = as_ms(now.saturating_sub(last)) / 1000.0;
        if diff > 0.0001 {
            self.input_hz = 1.0 / diff;
            self.input_hz_max = self.input_hz_max.max(self.input_hz);
            self.input_time = Some(now);
        }
    }
}

pub struct Device {
    id: DeviceId,
    name: String,
    desc: String,
    meta: DeviceMeta,
    state: Mutex<DeviceState>,
    transport: Mutex<Option<Box<dyn Transport>>>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("kind", &self.kind())
            .finish()
    }
}

impl Device {
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        desc: impl Into<String>,
        meta: DeviceMeta,
        payload: DevicePayload,
        transport: Option<Box<dyn Transport>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            desc: desc.into(),
            meta,
            state: Mutex::new(DeviceState::new(payload)),
            transport: Mutex::new(transport),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Unique identifier string used by bindings.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn meta(&self) -> &DeviceMeta {
        &self.meta
    }

    /// Acquire the device lock.
    pub fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    pub fn kind(&self) -> DeviceKind {
        self.lock().payload.kind()
    }

    pub fn is_destroyed(&self) -> bool {
        self.kind() == DeviceKind::Destroyed
    }

    /// Apply one raw sample. Returns true if any control changed.
    pub fn ingest(&self, sample: &InputSample, now: Duration, algorithm: MidiAlgorithm) -> bool {
        let mut st = self.lock();
        if matches!(st.payload, DevicePayload::Destroyed) {
            warn!(device = %self.name, "input for destroyed device");
            return false;
        }
        st.track_rate(now);

        let changed = match (&mut st.payload, sample) {
            (
                DevicePayload::Keyboard(kb),
                InputSample::Key {
                    vkey,
                    make_code,
                    prefix,
                    pressed,
                },
            ) => kb.set_key(*vkey, *make_code, *prefix, *pressed, now),
            (DevicePayload::Mouse(m), InputSample::MouseMove { x, y, absolute }) => {
                m.move_to(*x, *y, *absolute)
            }
            (DevicePayload::Mouse(m), InputSample::MouseButton { button, pressed }) => {
                m.set_button(*button, *pressed, now)
            }
            (DevicePayload::Mouse(m), InputSample::MouseWheel { delta }) => m.wheel(*delta),
            (DevicePayload::Hid(hid), InputSample::HidReport(data)) => {
                hid.ingest_report(data, now)
            }
            (DevicePayload::Midi(state), InputSample::Midi(data)) => {
                match MidiMessage::parse(data) {
                    Some(msg) => state.ingest(msg, algorithm, now),
                    None => {
                        trace!(device = %self.name, len = data.len(), "unparsable MIDI message");
                        false
                    }
                }
            }
            (DevicePayload::VendorIoBoard(board), InputSample::BoardInputs(inputs)) => {
                board.set_inputs(inputs, now)
            }
            (payload, sample) => {
                debug!(
                    device = %self.name,
                    kind = %payload.kind(),
                    ?sample,
                    "sample does not match device kind"
                );
                false
            }
        };
        if changed {
            st.updated = true;
        }
        changed
    }

    /// Write one output. Enables output for the device; marks it pending on change.
    pub fn set_output(&self, index: usize, value: f32) -> bool {
        let value = value.clamp(0.0, 1.0);
        let mut st = self.lock();
        let changed = match &mut st.payload {
            DevicePayload::Hid(hid) => hid.set_output(index, value),
            DevicePayload::SerialLightBoard(board) => {
                self.light_write(&mut board.lights, index, value)
            }
            DevicePayload::VendorIoBoard(board) => {
                self.light_write(&mut board.lights, index, value)
            }
            _ => return false,
        };
        st.output_enabled = true;
        if changed {
            st.output_pending = true;
        }
        changed
    }

    fn light_write(&self, lights: &mut [bool], index: usize, value: f32) -> bool {
        match state::set_light(lights, index, value) {
            Some(changed) => changed,
            None => {
                warn!(device = %self.name, index, "invalid light index");
                false
            }
        }
    }

    /// Current value of an output.
    pub fn output(&self, index: usize) -> Option<f32> {
        let st = self.lock();
        let lit = |lights: &[bool]| lights.get(index).map(|&on| if on { 1.0 } else { 0.0 });
        match &st.payload {
            DevicePayload::Hid(hid) => hid.output(index),
            DevicePayload::SerialLightBoard(board) => lit(&board.lights),
            DevicePayload::VendorIoBoard(board) => lit(&board.lights),
            _ => None,
        }
    }

    fn build_frame(payload: &DevicePayload, brightness: u8) -> Option<OutputFrame> {
        match payload {
            DevicePayload::Hid(hid) => {
                let reports = hid.encode_output(brightness);
                (!reports.is_empty()).then_some(OutputFrame::Reports(reports))
            }
            DevicePayload::SerialLightBoard(board) => Some(OutputFrame::Lights(board.lights.clone())),
            DevicePayload::VendorIoBoard(board) => Some(OutputFrame::Lights(board.lights.clone())),
            _ => None,
        }
    }

    /// Push output state to the transport.
    ///
    /// With `only_pending`, devices without unwritten changes are skipped.
    /// Returns whether a frame was written.
    pub fn write_output(&self, only_pending: bool, brightness: u8) -> Result<bool> {
        let frame = {
            let mut st = self.lock();
            if !st.output_enabled || (only_pending && !st.output_pending) {
                return Ok(false);
            }
            let Some(frame) = Self::build_frame(&st.payload, brightness) else {
                return Ok(false);
            };
            st.output_pending = false;
            frame
        };

        let mut transport = self.transport.lock();
        match transport.as_mut() {
            Some(t) => {
                t.write(&frame)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Transition to `Destroyed` and release the transport.
    pub fn destroy(&self) {
        let mut st = self.lock();
        if matches!(st.payload, DevicePayload::Destroyed) {
            return;
        }
        st.payload = DevicePayload::Destroyed;
        st.output_pending = false;
        st.output_enabled = false;
        if let Some(mut t) = self.transport.lock().take() {
            t.close();
        }
        debug!(device = %self.name, "device destroyed");
    }

    /// Input rates as `(current, max)` in Hz.
    pub fn input_rate(&self) -> (f64, f64) {
        let st = self.lock();
        (st.input_hz, st.input_hz_max)
    }

    /// Every addressable control, inputs first.
    pub fn controls(&self) -> Vec<ControlDesc> {
        let st = self.lock();
        match &st.payload {
            DevicePayload::Mouse(_) => {
                let mut out: Vec<_> = (0..MOUSE_BUTTONS)
                    .map(|i| ControlDesc::simple(ControlKind::Button, i as u32, mouse_button_name(i)))
                    .collect();
                out.extend((0..3).map(|i| {
                    ControlDesc::simple(ControlKind::Value, i as u32, mouse_axis_name(i))
                }));
                out
            }
            DevicePayload::Keyboard(_) => (0..KEY_SLOTS)
                .map(|i| ControlDesc::simple(ControlKind::Button, i as u32, key_slot_name(i)))
                .collect(),
            DevicePayload::Hid(hid) => hid.caps.describe(),
            DevicePayload::Midi(_) => {
                let notes = (0..midi::NOTE_COUNT).map(|i| {
                    let name = format!(
                        "MIDI Note Ch.{} #{} {}",
                        i / midi::NOTES_PER_CHANNEL + 1,
                        i % midi::NOTES_PER_CHANNEL,
                        midi::note_name((i % midi::NOTES_PER_CHANNEL) as u8)
                    );
                    ControlDesc::simple(ControlKind::Button, i as u32, name)
                });
                let analogs = (0..midi::ANALOG_COUNT).filter_map(|i| {
                    midi::analog_label(i)
                        .map(|name| ControlDesc::simple(ControlKind::Value, i as u32, name))
                });
                notes.chain(analogs).collect()
            }
            DevicePayload::SerialLightBoard(board) => light_descs(&board.lights),
            DevicePayload::VendorIoBoard(board) => {
                let mut out: Vec<_> = (0..board.inputs.len())
                    .map(|i| {
                        ControlDesc::simple(ControlKind::Button, i as u32, format!("Input {}", i + 1))
                    })
                    .collect();
                out.extend(light_descs(&board.lights));
                out
            }
            DevicePayload::Destroyed => Vec::new(),
        }
    }
}

fn light_descs(lights: &[bool]) -> Vec<ControlDesc> {
    (0..lights.len())
        .map(|i| ControlDesc::simple(ControlKind::Light, i as u32, format!("Light {}", i + 1)))
        .collect()
}

pub fn mouse_button_name(index: usize) -> String {
    match index {
        0 => "Left Mouse".into(),
        1 => "Right Mouse".into(),
        2 => "Middle Mouse".into(),
        n => format!("Mouse {}", n - 2),
    }
}

pub fn mouse_axis_name(index: usize) -> &'static str {
    match index {
        0 => "X",
        1 => "Y",
        2 => "Scroll Wheel",
        _ => usage::FALLBACK_VALUE,
    }
}

/// Virtual-key name of a keyboard slot; extended banks are suffixed.
pub fn key_slot_name(index: usize) -> String {
    let name = keys::vkey_name((index % 256) as u16);
    match index / 256 {
        0 => name,
        1 => format!("{name} (E0)"),
        2 => format!("{name} (E1)"),
        _ => format!("{name} (ext)"),
    }
}
