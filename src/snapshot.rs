//! Point-in-time summary of the registry.
//!
//! [`RegistrySnapshot`] is an **owned**, read-only list of per-device
//! summaries produced by [`DeviceRegistry::snapshot`](crate::registry::DeviceRegistry::snapshot).
//! It is what device pickers and diagnostics pages render; it holds no locks
//! and no references into the registry.
//!
//! # Examples
//! ```no_run
//! use iovirt::{DeviceRegistry, EngineConfig};
//!
//! let registry = DeviceRegistry::new(EngineConfig::default());
//! registry.scan().ok();
//! for dev in registry.snapshot().iter() {
//!     println!("{:>3} {:<10} {} ({:.0} Hz)", dev.id, dev.kind, dev.desc, dev.input_hz);
//! }
//! ```

use crate::device::{Device, DeviceId, DeviceKind};
use crate::metadata::DeviceMeta;
use serde::Serialize;

/// One device as seen at snapshot time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    pub desc: String,
    #[serde(serialize_with = "kind_str")]
    pub kind: DeviceKind,
    pub meta: DeviceMeta,
    pub input_hz: f64,
    pub input_hz_max: f64,
    pub updated: bool,
    pub output_pending: bool,
}

fn kind_str<S: serde::Serializer>(kind: &DeviceKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.as_str())
}

impl DeviceSummary {
    pub fn of(device: &Device) -> Self {
        let st = device.lock();
        Self {
            id: device.id(),
            name: device.name().to_string(),
            desc: device.desc().to_string(),
            kind: st.payload.kind(),
            meta: device.meta().clone(),
            input_hz: st.input_hz,
            input_hz_max: st.input_hz_max,
            updated: st.updated,
            output_pending: st.output_pending,
        }
    }
}

/// Owned list of device summaries, in registry order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RegistrySnapshot(pub Vec<DeviceSummary>);

impl RegistrySnapshot {
    pub fn new(devices: Vec<DeviceSummary>) -> Self {
        Self(devices)
    }

    /// Summary for a device name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&DeviceSummary> {
        self.0.iter().find(|d| d.name == name)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &DeviceSummary> {
        self.0.iter()
    }

    /// Devices that have not been destroyed.
    pub fn live(&self) -> impl Iterator<Item = &DeviceSummary> {
        self.0.iter().filter(|d| d.kind != DeviceKind::Destroyed)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the snapshot and return the inner list.
    #[inline]
    pub fn into_inner(self) -> Vec<DeviceSummary> {
        self.0
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::backends::DeviceSpec;
    use crate::device::{DeviceKind, DevicePayload};
    use crate::state::{KeyboardState, MouseState};
    use crate::{DeviceRegistry, EngineConfig};

    #[test]
    fn test_snapshot_lists_devices_in_order() {
        let reg = DeviceRegistry::new(EngineConfig::default());
        reg.upsert(DeviceSpec::new(
            "kbd",
            "Keyboard",
            DevicePayload::Keyboard(KeyboardState::default()),
        ));
        reg.upsert(DeviceSpec::new(
            "mouse",
            "Mouse",
            DevicePayload::Mouse(MouseState::default()),
        ));
        reg.remove("kbd");

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("kbd").unwrap().kind, DeviceKind::Destroyed);
        assert_eq!(snap.live().count(), 1);
        assert_eq!(snap.iter().map(|d| d.id).collect::<Vec<_>>(), vec![0, 1]);
        let json = snap.to_json().unwrap();
        assert!(json.contains("\"kind\": \"mouse\""));
    }
}
