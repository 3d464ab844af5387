//! iovirt: device registry and input resolution engine.
//!
//! Keyboards, mice, HID controllers, MIDI controllers and serial light boards
//! are registered in a [`DeviceRegistry`]. Backends push raw samples into it
//! from their own threads. Client code describes what it wants with
//! [`ButtonBinding`], [`AnalogBinding`] and [`LightBinding`] and reads them
//! through a [`Resolver`] at whatever cadence it likes.
//!
//! ```
//! use iovirt::backends::virtual_input::VirtualBackend;
//! use iovirt::device::DevicePayload;
//! use iovirt::event::InputSample;
//! use iovirt::state::MouseState;
//! use iovirt::{AnalogBinding, DeviceRegistry, NullKeySource, Resolver};
//! use std::sync::Arc;
//!
//! let mut backend = VirtualBackend::new();
//! backend.add("mouse", "Virtual Mouse", DevicePayload::Mouse(MouseState::default()));
//! let feed = backend.handle();
//!
//! let registry = DeviceRegistry::default();
//! registry.add_backend(backend);
//! registry.scan().unwrap();
//!
//! feed.push("mouse", InputSample::MouseMove { x: 128, y: 0, absolute: true });
//! let resolver = Resolver::with_keys(&registry, Arc::new(NullKeySource));
//! let mut x = AnalogBinding::device("Steer", "mouse", 0);
//! assert_eq!(resolver.resolve_analog(&mut x), 0.5);
//! ```
//!
//! # Feature flags
//! - **`hid`**: hidapi backend.
//! - **`midi`**: midir backend.
//!
//! The library logs through `tracing` and never installs a subscriber.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod binding;
pub mod capability;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod filtered_listener;
mod flush;
pub mod keys;
pub mod logger;
pub mod metadata;
pub mod midi;
pub mod registry;
pub mod resolve;
pub mod snapshot;
pub mod state;

pub use backends::{Backend, DeviceSpec};
pub use binding::{
    AnalogBinding, BindingProfile, ButtonAnalogType, ButtonBinding, LightBinding, INVALID_INDEX,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use device::{Device, DeviceId, DeviceKind, DevicePayload, OutputFrame, Transport};
pub use error::{Error, Result};
pub use event::{ControlDesc, ControlKind, InputSample, KeyPrefix};
pub use eventbus::{DeviceEvent, DeviceEventKind, DeviceListener, EventFilter};
pub use filtered_listener::FilteredListener;
pub use keys::{KeyStateSource, NullKeySource};
pub use logger::LoggingListener;
pub use metadata::DeviceMeta;
pub use midi::MidiAlgorithm;
pub use registry::{DeviceRegistry, FlushMode, IngestSink};
pub use resolve::Resolver;
pub use snapshot::{DeviceSummary, RegistrySnapshot};
