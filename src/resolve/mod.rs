//! The resolution engine.
//!
//! A [`Resolver`] borrows a [`DeviceRegistry`] and turns bindings into
//! logical values: [`resolve_button`](Resolver::resolve_button),
//! [`resolve_velocity`](Resolver::resolve_velocity),
//! [`resolve_analog`](Resolver::resolve_analog),
//! [`write_light`](Resolver::write_light) and [`read_light`](Resolver::read_light).
//!
//! Resolution never fails. Missing devices, destroyed devices and
//! out-of-range indices fall back to not pressed, the binding's last state, or
//! mid-scale, as documented per accessor. Device locks are held only while the
//! raw sample is copied out; transforms run unlocked.
//!
//! # Examples
//! ```no_run
//! use iovirt::{ButtonBinding, DeviceRegistry, Resolver};
//!
//! let registry = DeviceRegistry::default();
//! registry.scan().ok();
//! let resolver = Resolver::new(&registry);
//! let mut start = ButtonBinding::device("Start", "hid0", 3);
//! if resolver.resolve_button(&mut start) {
//!     println!("start held");
//! }
//! ```

mod analog;
mod button;
mod display;
mod light;
pub mod transform;

pub use button::hat_directions;

use crate::config::EngineConfig;
use crate::keys::{self, KeyStateSource};
use crate::registry::DeviceRegistry;
use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

/// Binding resolver over one registry.
pub struct Resolver<'r> {
    registry: &'r DeviceRegistry,
    keys: Arc<dyn KeyStateSource>,
}

impl<'r> Resolver<'r> {
    /// Resolver reading naive keys from the platform key source.
    pub fn new(registry: &'r DeviceRegistry) -> Self {
        Self::with_keys(registry, keys::platform_source())
    }

    pub fn with_keys(registry: &'r DeviceRegistry, keys: Arc<dyn KeyStateSource>) -> Self {
        Self { registry, keys }
    }

    pub fn registry(&self) -> &'r DeviceRegistry {
        self.registry
    }

    fn poll(&self) -> Poll<'_> {
        Poll {
            config: self.registry.config(),
            now: self.registry.now(),
            keys: &*self.keys,
            focus: Cell::new(None),
        }
    }
}

/// Settings and time captured once per accessor call, so a binding and its
/// alternatives see the same instant.
struct Poll<'a> {
    config: EngineConfig,
    now: Duration,
    keys: &'a dyn KeyStateSource,
    focus: Cell<Option<bool>>,
}

impl Poll<'_> {
    /// Focus is queried at most once per call.
    fn has_focus(&self) -> bool {
        match self.focus.get() {
            Some(focus) => focus,
            None => {
                let focus = self.keys.has_focus();
                self.focus.set(Some(focus));
                focus
            }
        }
    }

    fn naive_blocked(&self) -> bool {
        self.config.naive_require_focus && !self.has_focus()
    }

    fn device_blocked(&self) -> bool {
        self.config.device_require_focus && !self.has_focus()
    }
}
