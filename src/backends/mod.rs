//! Input backends.
//!
//! A [`Backend`] enumerates devices for the registry and, once a device is
//! registered, feeds it raw samples through an [`IngestSink`].
//!
//! # Feature flags
//! - **`hid`**: hidapi backend (report descriptors, input reader threads, output reports).
//! - **`midi`**: midir backend (one input connection per port).
//!
//! The in-memory [`virtual_input`] backend is always available.

use crate::device::{Device, DevicePayload, Transport};
use crate::error::Result;
use crate::metadata::DeviceMeta;
use std::sync::Arc;

pub use crate::registry::IngestSink;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;

#[cfg(feature = "midi")]
#[cfg_attr(docsrs, doc(cfg(feature = "midi")))]
pub mod midi;

pub mod virtual_input;

/// A device found by enumeration, ready to be registered.
pub struct DeviceSpec {
    /// Unique identifier; rescans match devices by it.
    pub name: String,
    pub desc: String,
    pub meta: DeviceMeta,
    pub payload: DevicePayload,
    pub transport: Option<Box<dyn Transport>>,
}

impl DeviceSpec {
    pub fn new(name: impl Into<String>, desc: impl Into<String>, payload: DevicePayload) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            meta: DeviceMeta::default(),
            payload,
            transport: None,
        }
    }

    pub fn with_meta(mut self, meta: DeviceMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }
}

impl std::fmt::Debug for DeviceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSpec")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("kind", &self.payload.kind())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

/// Platform device source.
pub trait Backend: Send {
    fn name(&self) -> &'static str;

    /// List currently connected devices.
    fn enumerate(&mut self) -> Result<Vec<DeviceSpec>>;

    /// Start delivering samples for a newly registered device.
    fn attach(&mut self, _device: &Arc<Device>, _sink: IngestSink) -> Result<()> {
        Ok(())
    }

    /// Stop every reader started by `attach`.
    fn detach(&mut self) {}
}
