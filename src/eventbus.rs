use crate::device::Device;
use std::collections::BTreeMap;

/// What happened to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEventKind {
    /// First seen by a scan.
    Added,
    /// Replaced by a rescan, or destroyed.
    Changed,
}

/// Notification delivered to listeners.
#[derive(Debug, Clone, Copy)]
pub struct DeviceEvent<'a> {
    pub kind: DeviceEventKind,
    pub device: &'a Device,
}

/// Trait for reacting to device add/change notifications.
///
/// Listeners run synchronously on the scanning thread and must return quickly.
/// They must not call back into the registry that is notifying them.
pub trait DeviceListener: Send {
    fn on_device(&mut self, event: &DeviceEvent<'_>);
}

/// Determines which notifications a listener wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    AddedOnly,
    ChangedOnly,
    Custom(fn(&DeviceEvent<'_>) -> bool),
}

/// Metadata-wrapped listener with filters and control flags.
struct ListenerEntry {
    listener: Box<dyn DeviceListener>,
    enabled: bool,
    filter: EventFilter,
    tag: Option<String>, // device name
}

/// Ordered observer list. Ids increase, so iteration is registration order.
#[derive(Default)]
pub struct DeviceEventBus {
    next_id: u64,
    listeners: BTreeMap<u64, ListenerEntry>,
}

impl DeviceEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener with optional filtering and device-name tag.
    pub fn add_listener(
        &mut self,
        listener: impl DeviceListener + 'static,
        filter: EventFilter,
        tag: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
                filter,
                tag,
            },
        );
        self.next_id += 1;
        id
    }

    pub fn enable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Mutes a listener without removing it.
    pub fn disable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    pub fn remove_listener(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers one notification to all active and matching listeners.
    pub fn emit(&mut self, event: &DeviceEvent<'_>) {
        for entry in self.listeners.values_mut() {
            if !entry.enabled {
                continue;
            }
            if let Some(ref wanted) = entry.tag {
                if event.device.name() != wanted {
                    continue;
                }
            }
            let passes = match entry.filter {
                EventFilter::All => true,
                EventFilter::AddedOnly => event.kind == DeviceEventKind::Added,
                EventFilter::ChangedOnly => event.kind == DeviceEventKind::Changed,
                EventFilter::Custom(f) => f(event),
            };
            if passes {
                entry.listener.on_device(event);
            }
        }
    }
}
