//! Ingestion samples and control descriptions.
//!
//! Backends push [`InputSample`]s into the registry whenever hardware reports
//! something; the registry routes each sample to the owning device's state
//! under that device's lock. Samples carry no timestamp: the registry stamps
//! them with its clock on arrival.
//!
//! ## Value conventions
//! - **Keyboard:** Windows virtual-key codes; E0/E1-prefixed scan codes are
//!   folded into separate 256-key banks (see [`KeyPrefix`]).
//! - **Mouse:** positions are raw counts; wheel deltas use `WHEEL_DELTA` (120)
//!   units per notch and accumulate as notches.
//! - **HID:** whole input reports, including the report id byte when the
//!   descriptor declares report ids.
//! - **MIDI:** one short message per sample.

/// Extended-key prefix of a keyboard scan code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyPrefix {
    #[default]
    None,
    E0,
    E1,
}

impl KeyPrefix {
    /// Offset of this prefix's bank in the 1024-slot key table.
    pub fn bank(self) -> usize {
        match self {
            KeyPrefix::None => 0,
            KeyPrefix::E0 => 256,
            KeyPrefix::E1 => 512,
        }
    }
}

/// One raw sample from an input backend.
#[derive(Clone, Debug, PartialEq)]
pub enum InputSample {
    /// Keyboard key transition.
    Key {
        vkey: u16,
        make_code: u16,
        prefix: KeyPrefix,
        pressed: bool,
    },
    /// Pointer motion; `absolute` positions replace, relative ones accumulate.
    MouseMove { x: i32, y: i32, absolute: bool },
    /// Mouse button transition (`0..16`).
    MouseButton { button: u8, pressed: bool },
    /// Wheel rotation in `WHEEL_DELTA` units.
    MouseWheel { delta: i16 },
    /// Raw HID input report.
    HidReport(Vec<u8>),
    /// Raw MIDI short message.
    Midi(Vec<u8>),
    /// Full input snapshot of a vendor IO board.
    BoardInputs(Vec<bool>),
}

/// Category of a control exposed by a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKind {
    Button,
    Value,
    Hat,
    ButtonOutput,
    ValueOutput,
    Light,
}

/// Describes a control exposed by a device.
///
/// Backends populate this from descriptors or fixed layouts so UIs and binding
/// editors can present stable names and ranges.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlDesc {
    pub kind: ControlKind,
    /// Index to use in a binding (input and output spaces are separate).
    pub idx: u32,
    pub name: String,
    /// Descriptor range. Not normalized.
    pub logical_min: i32,
    pub logical_max: i32,
    pub usage_page: Option<u16>,
    pub usage: Option<u16>,
}

impl ControlDesc {
    pub(crate) fn simple(kind: ControlKind, idx: u32, name: impl Into<String>) -> Self {
        Self {
            kind,
            idx,
            name: name.into(),
            logical_min: 0,
            logical_max: 1,
            usage_page: None,
            usage: None,
        }
    }
}
