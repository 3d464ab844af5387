//! In-memory backend.
//!
//! [`VirtualBackend`] enumerates a fixed set of declared devices and hands out
//! a [`VirtualHandle`] that feeds samples into whichever instance the registry
//! currently holds. [`RecordingTransport`] captures output frames.
//!
//! ```
//! use iovirt::backends::virtual_input::{RecordingTransport, VirtualBackend};
//! use iovirt::device::DevicePayload;
//! use iovirt::event::{InputSample, KeyPrefix};
//! use iovirt::state::{KeyboardState, LightBoardState};
//! use iovirt::DeviceRegistry;
//!
//! let mut backend = VirtualBackend::new();
//! backend.add("kbd", "Virtual Keyboard", DevicePayload::Keyboard(KeyboardState::default()));
//! let lights = RecordingTransport::default();
//! backend.add_with_transport(
//!     "board",
//!     "Virtual Board",
//!     DevicePayload::SerialLightBoard(LightBoardState::new(8)),
//!     lights.clone(),
//! );
//! let handle = backend.handle();
//!
//! let registry = DeviceRegistry::default();
//! registry.add_backend(backend);
//! assert_eq!(registry.scan().unwrap(), 2);
//! let key = InputSample::Key { vkey: 0x41, make_code: 30, prefix: KeyPrefix::None, pressed: true };
//! assert!(handle.push("kbd", key));
//! ```

use super::{Backend, DeviceSpec, IngestSink};
use crate::device::{Device, DevicePayload, OutputFrame, Transport};
use crate::error::{Error, Result};
use crate::event::InputSample;
use crate::metadata::DeviceMeta;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

struct Declared {
    name: String,
    desc: String,
    payload: DevicePayload,
    transport: Option<RecordingTransport>,
}

/// Backend over devices declared in code.
#[derive(Default)]
pub struct VirtualBackend {
    declared: Vec<Declared>,
    sinks: Arc<Mutex<HashMap<String, IngestSink>>>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input-only device. Every scan re-creates it from `payload`.
    pub fn add(&mut self, name: impl Into<String>, desc: impl Into<String>, payload: DevicePayload) {
        self.declared.push(Declared {
            name: name.into(),
            desc: desc.into(),
            payload,
            transport: None,
        });
    }

    /// Declare a device whose output lands in `transport`.
    pub fn add_with_transport(
        &mut self,
        name: impl Into<String>,
        desc: impl Into<String>,
        payload: DevicePayload,
        transport: RecordingTransport,
    ) {
        self.declared.push(Declared {
            name: name.into(),
            desc: desc.into(),
            payload,
            transport: Some(transport),
        });
    }

    /// Feeder that stays valid across rescans.
    pub fn handle(&self) -> VirtualHandle {
        VirtualHandle {
            sinks: self.sinks.clone(),
        }
    }
}

impl Backend for VirtualBackend {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceSpec>> {
        Ok(self
            .declared
            .iter()
            .map(|d| {
                let meta = DeviceMeta {
                    bus: Some("virtual".into()),
                    product_string: Some(d.desc.clone()),
                    ..DeviceMeta::default()
                };
                let spec = DeviceSpec::new(&d.name, &d.desc, d.payload.clone()).with_meta(meta);
                match &d.transport {
                    Some(t) => spec.with_transport(t.clone()),
                    None => spec,
                }
            })
            .collect())
    }

    fn attach(&mut self, device: &Arc<Device>, sink: IngestSink) -> Result<()> {
        debug!(device = %device.name(), "virtual device attached");
        self.sinks.lock().insert(device.name().to_string(), sink);
        Ok(())
    }

    fn detach(&mut self) {
        self.sinks.lock().clear();
    }
}

/// Sample feeder for a [`VirtualBackend`]'s devices.
#[derive(Clone)]
pub struct VirtualHandle {
    sinks: Arc<Mutex<HashMap<String, IngestSink>>>,
}

impl VirtualHandle {
    /// Deliver a sample. False if the device was never attached or is gone.
    pub fn push(&self, name: &str, sample: InputSample) -> bool {
        let sink = self.sinks.lock().get(name).cloned();
        sink.is_some_and(|s| s.push(sample))
    }
}

/// Transport that records every frame it is asked to write.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    frames: Arc<Mutex<Vec<OutputFrame>>>,
    failing: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn frames(&self) -> Vec<OutputFrame> {
        self.frames.lock().clone()
    }

    pub fn last(&self) -> Option<OutputFrame> {
        self.frames.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Make subsequent writes fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl Transport for RecordingTransport {
    fn write(&mut self, frame: &OutputFrame) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::Transport("recording transport set to fail".into()));
        }
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
