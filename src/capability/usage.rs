//! Human-readable HID usage names.
//!
//! Covers the pages game controllers and light boards actually use. Unknown
//! usages return `None` so callers can substitute a generic label.

pub const PAGE_GENERIC_DESKTOP: u16 = 0x01;
pub const PAGE_SIMULATION: u16 = 0x02;
pub const PAGE_KEYBOARD: u16 = 0x07;
pub const PAGE_LED: u16 = 0x08;
pub const PAGE_BUTTON: u16 = 0x09;
pub const PAGE_ORDINAL: u16 = 0x0A;
pub const PAGE_CONSUMER: u16 = 0x0C;

pub const USAGE_HAT_SWITCH: u16 = 0x39;

/// Generic label for an unnamed input button.
pub const FALLBACK_BUTTON: &str = "Button Control";
/// Generic label for an unnamed input value.
pub const FALLBACK_VALUE: &str = "Analog Control";
/// Generic label for an unnamed output button.
pub const FALLBACK_BUTTON_OUTPUT: &str = "Button Output";
/// Generic label for an unnamed output value.
pub const FALLBACK_VALUE_OUTPUT: &str = "Value Output";

pub fn is_hat_switch(usage_page: u16, usage: u16) -> bool {
    usage_page == PAGE_GENERIC_DESKTOP && usage == USAGE_HAT_SWITCH
}

/// Name for `(usage_page, usage)`, if known.
pub fn usage_name(usage_page: u16, usage: u16) -> Option<String> {
    match usage_page {
        PAGE_GENERIC_DESKTOP => {
            let s = match usage {
                0x01 => "Pointer",
                0x02 => "Mouse",
                0x04 => "Joystick",
                0x05 => "Game Pad",
                0x06 => "Keyboard",
                0x08 => "Multi-axis Controller",
                0x30 => "X",
                0x31 => "Y",
                0x32 => "Z",
                0x33 => "Rx",
                0x34 => "Ry",
                0x35 => "Rz",
                0x36 => "Slider",
                0x37 => "Dial",
                0x38 => "Wheel",
                0x39 => "Hat Switch",
                0x3D => "Start",
                0x3E => "Select",
                0x90 => "D-pad Up",
                0x91 => "D-pad Down",
                0x92 => "D-pad Right",
                0x93 => "D-pad Left",
                _ => return None,
            };
            Some(s.to_string())
        }
        PAGE_SIMULATION => {
            let s = match usage {
                0xB0 => "Aileron",
                0xB8 => "Rudder",
                0xBA => "Throttle",
                0xBB => "Accelerator",
                0xC4 => "Brake",
                0xC5 => "Clutch",
                0xC8 => "Steering",
                _ => return None,
            };
            Some(s.to_string())
        }
        PAGE_BUTTON => match usage {
            0 => None,
            n => Some(format!("Button {n}")),
        },
        PAGE_ORDINAL => match usage {
            0 => None,
            n => Some(format!("Instance {n}")),
        },
        PAGE_LED => {
            let s = match usage {
                0x01 => "Num Lock",
                0x02 => "Caps Lock",
                0x03 => "Scroll Lock",
                0x4B => "Generic Indicator",
                _ => return None,
            };
            Some(s.to_string())
        }
        PAGE_KEYBOARD => match usage {
            0x04..=0x1D => Some(((b'A' + (usage - 0x04) as u8) as char).to_string()),
            0x1E..=0x26 => Some(((b'1' + (usage - 0x1E) as u8) as char).to_string()),
            0x27 => Some("0".into()),
            0x28 => Some("Enter".into()),
            0x29 => Some("Escape".into()),
            0x2C => Some("Space".into()),
            0xE0..=0xE7 => Some(
                ["LCtrl", "LShift", "LAlt", "LGui", "RCtrl", "RShift", "RAlt", "RGui"]
                    [(usage - 0xE0) as usize]
                    .to_string(),
            ),
            _ => None,
        },
        PAGE_CONSUMER => {
            let s = match usage {
                0xB5 => "Scan Next Track",
                0xB6 => "Scan Previous Track",
                0xCD => "Play/Pause",
                0xE2 => "Mute",
                0xE9 => "Volume Increment",
                0xEA => "Volume Decrement",
                _ => return None,
            };
            Some(s.to_string())
        }
        _ => None,
    }
}
