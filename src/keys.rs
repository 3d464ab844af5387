//! OS key-state and focus queries used by naive bindings.
//!
//! Naive button bindings bypass the registry and read the OS's async key
//! state directly. Both naive bindings and mouse analogs can be gated on the
//! host process owning the foreground window.

use std::sync::Arc;

/// Source of OS-level key state.
pub trait KeyStateSource: Send + Sync {
    /// Whether the virtual key is currently held.
    fn is_key_down(&self, vkey: u16) -> bool;

    /// Whether this process owns the foreground window.
    fn has_focus(&self) -> bool;
}

/// Reports nothing pressed and focus always held.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeySource;

impl KeyStateSource for NullKeySource {
    fn is_key_down(&self, _vkey: u16) -> bool {
        false
    }

    fn has_focus(&self) -> bool {
        true
    }
}

#[cfg(windows)]
pub use self::windows::WindowsKeySource;

#[cfg(windows)]
mod windows {
    use super::KeyStateSource;
    use windows_sys::Win32::System::Threading::GetCurrentProcessId;
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowThreadProcessId,
    };

    /// `GetAsyncKeyState` plus a foreground-window process check.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsKeySource;

    impl KeyStateSource for WindowsKeySource {
        fn is_key_down(&self, vkey: u16) -> bool {
            // high bit: currently down
            let state = unsafe { GetAsyncKeyState(vkey as i32) };
            (state as u16 & 0x8000) != 0
        }

        fn has_focus(&self) -> bool {
            let hwnd = unsafe { GetForegroundWindow() };
            if hwnd.is_null() {
                return false;
            }
            let mut pid = 0u32;
            unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
            pid == unsafe { GetCurrentProcessId() }
        }
    }
}

/// Key source for the current platform.
pub fn platform_source() -> Arc<dyn KeyStateSource> {
    #[cfg(windows)]
    {
        Arc::new(WindowsKeySource)
    }
    #[cfg(not(windows))]
    {
        Arc::new(NullKeySource)
    }
}

/// Display name of a Windows virtual-key code. Codes above 255 carry the
/// extended-key flag, which only changes `Alt` into `AltGr`.
pub fn vkey_name(vkey: u16) -> String {
    let code = (vkey % 256) as u8;
    let name = match code {
        0x01 => "Left MB",
        0x02 => "Right MB",
        0x04 => "Middle MB",
        0x05 => "X1 MB",
        0x06 => "X2 MB",
        0x08 => "Backspace",
        0x09 => "Tab",
        0x0C => "Clear",
        0x0D => "Enter",
        0x10 => "Shift",
        0x11 => "Ctrl",
        0x12 if vkey > 255 => "AltGr",
        0x12 => "Alt",
        0x13 => "Pause",
        0x14 => "Caps Lock",
        0x1B => "Escape",
        0x20 => "Space",
        0x21 => "Page Up",
        0x22 => "Page Down",
        0x23 => "End",
        0x24 => "Home",
        0x25 => "Left",
        0x26 => "Up",
        0x27 => "Right",
        0x28 => "Down",
        0x2C => "Prt Scr",
        0x2D => "Insert",
        0x2E => "Delete",
        b'0'..=b'9' | b'A'..=b'Z' => return char::from(code).to_string(),
        0x5B => "Left Windows",
        0x5C => "Right Windows",
        0x5D => "Apps",
        0x60..=0x69 => return format!("Num {}", code - 0x60),
        0x6A => "Num *",
        0x6B => "Num +",
        0x6C => "Num Separator",
        0x6D => "Num -",
        0x6E => "Num .",
        0x6F => "Num /",
        0x70..=0x87 => return format!("F{}", code - 0x6F),
        0x90 => "Num Lock",
        0x91 => "Scroll Lock",
        0xA0 => "Left Shift",
        0xA1 => "Right Shift",
        0xA2 => "Left Control",
        0xA3 => "Right Control",
        0xA4 => "Left Menu",
        0xA5 => "Right Menu",
        _ => return format!("Key 0x{:02X}", code),
    };
    name.to_string()
}
