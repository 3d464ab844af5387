//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description of a device suitable
//! for UI display, logging, and allow-list checks. Backends populate what they
//! know; unknown fields remain `None`.
//!
//! # Conventions
//! - `bus` is a short, human-readable bus hint like `"usb"`, `"midi"`, or `"virtual"`.
//! - `path` is an OS/topology path (opaque string) useful for diagnostics.
//! - `usage_page`/`usage` describe the top-level application collection.

use serde::{Deserialize, Serialize};

/// Vendor/product pair that is probed even though it only exposes vendor pages.
pub const VENDOR_PAGE_ALLOW_LIST: &[(u16, u16)] = &[(0xBEEF, 0x5730)];

/// Snapshot of metadata describing a single device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// High-level bus classification.
    pub bus: Option<String>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    /// Manufacturer string from firmware.
    pub manufacturer: Option<String>,

    /// Human-readable product name from the driver/firmware.
    pub product_string: Option<String>,

    /// Device serial number supplied by firmware/OS, if present.
    pub serial_number: Option<String>,

    /// HID Usage Page of the top-level collection.
    pub usage_page: Option<u16>,

    /// HID Usage of the top-level collection.
    pub usage: Option<u16>,

    /// OS/topological path to the device. Treat as opaque.
    pub path: Option<String>,
}

impl DeviceMeta {
    /// True when the top-level usage page is in the vendor-defined range `0xFF00..=0xFFFF`.
    pub fn is_vendor_page(&self) -> bool {
        self.usage_page.map(|p| (p >> 8) == 0xFF).unwrap_or(false)
    }

    pub fn is_allow_listed(&self) -> bool {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => VENDOR_PAGE_ALLOW_LIST.contains(&(vid, pid)),
            _ => false,
        }
    }

    /// Vendor-only devices are skipped during scans unless allow-listed.
    pub fn should_skip(&self) -> bool {
        self.is_vendor_page() && !self.is_allow_listed()
    }

    /// `"Manufacturer Product"` or whichever half is known.
    pub fn description(&self) -> Option<String> {
        match (&self.manufacturer, &self.product_string) {
            (Some(m), Some(p)) if !m.is_empty() => Some(format!("{m} {p}")),
            (_, Some(p)) => Some(p.clone()),
            (Some(m), None) => Some(m.clone()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(page: u16, vid: u16, pid: u16) -> DeviceMeta {
        DeviceMeta {
            usage_page: Some(page),
            vid: Some(vid),
            pid: Some(pid),
            ..Default::default()
        }
    }

    #[test]
    fn test_vendor_pages_are_skipped() {
        assert!(meta(0xFF00, 0x1234, 0x0001).should_skip());
        assert!(meta(0xFFA0, 0x1234, 0x0001).should_skip());
        assert!(!meta(0x0001, 0x1234, 0x0001).should_skip());
    }

    #[test]
    fn test_allow_listed_pair_is_kept() {
        assert!(!meta(0xFF00, 0xBEEF, 0x5730).should_skip());
        assert!(meta(0xFF00, 0xBEEF, 0x5731).should_skip());
    }

    #[test]
    fn test_description_joins_strings() {
        let mut m = DeviceMeta::default();
        assert_eq!(m.description(), None);
        m.product_string = Some("Pad".into());
        assert_eq!(m.description().as_deref(), Some("Pad"));
        m.manufacturer = Some("Acme".into());
        assert_eq!(m.description().as_deref(), Some("Acme Pad"));
    }
}
