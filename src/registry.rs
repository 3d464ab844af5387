//! The device registry.
//!
//! [`DeviceRegistry`] owns every live [`Device`], assigns ids, notifies
//! listeners about additions and replacements, routes ingested samples, and
//! drives output flushing. It is an explicitly constructed handle; tests can
//! run as many isolated registries as they like.
//!
//! ## Identity across rescans
//! Devices are matched by name. A rescanned device keeps its id, takes the
//! old device's slot, and the old instance is destroyed, so anybody still
//! holding the previous `Arc<Device>` observes [`DeviceKind::Destroyed`].
//!
//! ## Lookups
//! [`lookup`](DeviceRegistry::lookup) never touches the dirty flag.
//! [`lookup_updated`](DeviceRegistry::lookup_updated) returns the device only
//! if input arrived since the last such call, and clears the flag atomically.

use crate::backends::{Backend, DeviceSpec};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::device::{Device, DeviceId, DeviceKind, DevicePayload};
use crate::error::Result;
use crate::event::InputSample;
use crate::eventbus::{DeviceEvent, DeviceEventBus, DeviceEventKind, DeviceListener, EventFilter};
use crate::flush::{self, FlushSignal, FlushTarget, FlushWorker};
use crate::midi::MidiAlgorithm;
use crate::snapshot::{DeviceSummary, RegistrySnapshot};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How [`DeviceRegistry::flush`] writes output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Write pending output on the calling thread.
    Blocking,
    /// Wake the flush worker and return immediately.
    Deferred,
}

struct DeviceList {
    devices: Vec<Arc<Device>>,
    next_id: DeviceId,
}

pub(crate) struct Shared {
    list: RwLock<DeviceList>,
    clock: Arc<dyn Clock>,
    config: RwLock<EngineConfig>,
    bus: Mutex<DeviceEventBus>,
    signal: FlushSignal,
}

impl Shared {
    fn find(&self, name: &str) -> Option<Arc<Device>> {
        if name.is_empty() {
            return None;
        }
        self.list
            .read()
            .devices
            .iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    fn ingest(&self, device: &Device, sample: &InputSample) -> bool {
        let algorithm = self.config.read().midi_algorithm;
        device.ingest(sample, self.clock.now(), algorithm)
    }
}

impl FlushTarget for Shared {
    fn devices(&self) -> Vec<Arc<Device>> {
        self.list.read().devices.clone()
    }

    fn brightness(&self) -> u8 {
        self.config.read().hid_light_brightness
    }

    fn refresh_interval(&self) -> Duration {
        self.config.read().refresh_interval()
    }

    fn signal(&self) -> &FlushSignal {
        &self.signal
    }
}

/// Handle a backend uses to push samples into one registered device.
///
/// Holds only weak references: once the registry is dropped or the device is
/// replaced, pushes return `false` and readers should stop.
#[derive(Clone)]
pub struct IngestSink {
    shared: Weak<Shared>,
    device: Weak<Device>,
}

impl IngestSink {
    /// Deliver one sample. Returns false when the target is gone.
    pub fn push(&self, sample: InputSample) -> bool {
        let (Some(shared), Some(device)) = (self.shared.upgrade(), self.device.upgrade()) else {
            return false;
        };
        if device.is_destroyed() {
            return false;
        }
        shared.ingest(&device, &sample);
        true
    }

    pub fn device_name(&self) -> Option<String> {
        self.device.upgrade().map(|d| d.name().to_string())
    }
}

impl std::fmt::Debug for IngestSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestSink")
            .field("device", &self.device_name())
            .finish()
    }
}

/// Owner of all devices and backends.
pub struct DeviceRegistry {
    shared: Arc<Shared>,
    backends: Mutex<Vec<Box<dyn Backend>>>,
    worker: Mutex<Option<FlushWorker>>,
}

impl DeviceRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                list: RwLock::new(DeviceList {
                    devices: Vec::new(),
                    next_id: 0,
                }),
                clock,
                config: RwLock::new(config),
                bus: Mutex::new(DeviceEventBus::new()),
                signal: FlushSignal::default(),
            }),
            backends: Mutex::new(Vec::new()),
            worker: Mutex::new(None),
        }
    }

    pub fn add_backend(&self, backend: impl Backend + 'static) {
        self.backends.lock().push(Box::new(backend));
    }

    pub fn now(&self) -> Duration {
        self.shared.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.shared.clock.clone()
    }

    pub fn config(&self) -> EngineConfig {
        self.shared.config.read().clone()
    }

    pub fn set_config(&self, config: EngineConfig) {
        let mut cfg = self.shared.config.write();
        if cfg.midi_algorithm != config.midi_algorithm {
            info!(from = %cfg.midi_algorithm, to = %config.midi_algorithm, "MIDI algorithm changed");
        }
        *cfg = config;
    }

    pub fn midi_algorithm(&self) -> MidiAlgorithm {
        self.shared.config.read().midi_algorithm
    }

    /// Switch the engine-wide MIDI note algorithm.
    pub fn set_midi_algorithm(&self, algorithm: MidiAlgorithm) {
        let mut cfg = self.shared.config.write();
        if cfg.midi_algorithm != algorithm {
            info!(from = %cfg.midi_algorithm, to = %algorithm, "MIDI algorithm changed");
        }
        cfg.midi_algorithm = algorithm;
    }

    /// Suspend velocity thresholds on every MIDI device (binding capture).
    pub fn set_midi_freeze(&self, freeze: bool) {
        for device in self.devices() {
            if let DevicePayload::Midi(state) = &mut device.lock().payload {
                state.freeze = freeze;
            }
        }
    }

    /// Register an add/change listener.
    pub fn add_listener(
        &self,
        listener: impl DeviceListener + 'static,
        filter: EventFilter,
        tag: Option<String>,
    ) -> u64 {
        self.shared.bus.lock().add_listener(listener, filter, tag)
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        self.shared.bus.lock().remove_listener(id)
    }

    fn notify(&self, kind: DeviceEventKind, device: &Device) {
        self.shared.bus.lock().emit(&DeviceEvent { kind, device });
    }

    /// Enumerate every backend and register what it finds.
    ///
    /// Returns the number of devices added or replaced. A failing backend is
    /// logged and skipped; devices that vanished are left for `remove`.
    pub fn scan(&self) -> Result<usize> {
        let dump = self.shared.config.read().dump_devices;
        let mut backends = self.backends.lock();
        let mut total = 0;
        for backend in backends.iter_mut() {
            let specs = match backend.enumerate() {
                Ok(specs) => specs,
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "enumeration failed");
                    continue;
                }
            };
            let mut count = 0;
            for spec in specs {
                if spec.meta.should_skip() {
                    debug!(device = %spec.name, "skipping vendor-only device");
                    continue;
                }
                if dump {
                    info!(backend = backend.name(), device = %spec.name, desc = %spec.desc, meta = ?spec.meta, "enumerated device");
                }
                let device = self.upsert(spec);
                let sink = self.sink(&device);
                if let Err(e) = backend.attach(&device, sink) {
                    warn!(backend = backend.name(), device = %device.name(), error = %e, "attach failed");
                }
                count += 1;
            }
            info!(backend = backend.name(), devices = count, "scan complete");
            total += count;
        }
        Ok(total)
    }

    /// Register a device, replacing an existing one with the same name.
    pub fn upsert(&self, spec: DeviceSpec) -> Arc<Device> {
        let (device, replaced) = {
            let mut list = self.shared.list.write();
            let slot = list.devices.iter().position(|d| d.name() == spec.name);
            let id = match slot {
                Some(i) => list.devices[i].id(),
                None => {
                    let id = list.next_id;
                    list.next_id += 1;
                    id
                }
            };
            let device = Arc::new(Device::new(
                id,
                spec.name,
                spec.desc,
                spec.meta,
                spec.payload,
                spec.transport,
            ));
            match slot {
                Some(i) => {
                    let old = std::mem::replace(&mut list.devices[i], device.clone());
                    (device, Some(old))
                }
                None => {
                    list.devices.push(device.clone());
                    (device, None)
                }
            }
        };

        match replaced {
            Some(old) => {
                old.destroy();
                info!(id = device.id(), device = %device.name(), desc = %device.desc(), "replaced existing device");
                self.notify(DeviceEventKind::Changed, &device);
            }
            None => {
                info!(id = device.id(), device = %device.name(), desc = %device.desc(), kind = %device.kind(), "added device");
                self.notify(DeviceEventKind::Added, &device);
            }
        }
        device
    }

    /// Sink a backend can use to feed `device`.
    pub fn sink(&self, device: &Arc<Device>) -> IngestSink {
        IngestSink {
            shared: Arc::downgrade(&self.shared),
            device: Arc::downgrade(device),
        }
    }

    /// Device by name, regardless of its dirty flag.
    pub fn lookup(&self, name: &str) -> Option<Arc<Device>> {
        self.shared.find(name)
    }

    /// Device by name, only if it received input since the last call.
    /// Clears the dirty flag.
    pub fn lookup_updated(&self, name: &str) -> Option<Arc<Device>> {
        let device = self.shared.find(name)?;
        let was_updated = std::mem::take(&mut device.lock().updated);
        was_updated.then_some(device)
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.shared.devices()
    }

    pub fn len(&self) -> usize {
        self.shared.list.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark a device unplugged. It stays listed as `Destroyed`.
    pub fn remove(&self, name: &str) -> bool {
        let Some(device) = self.shared.find(name) else {
            return false;
        };
        if device.kind() == DeviceKind::Destroyed {
            return false;
        }
        info!(device = %device.name(), desc = %device.desc(), "destroying device");
        device.destroy();
        self.notify(DeviceEventKind::Changed, &device);
        true
    }

    /// Apply a sample to the named device. Returns true if a control changed.
    pub fn ingest(&self, name: &str, sample: InputSample) -> bool {
        match self.shared.find(name) {
            Some(device) => self.shared.ingest(&device, &sample),
            None => {
                debug!(device = name, "sample for unknown device");
                false
            }
        }
    }

    /// Write output for devices with pending changes.
    pub fn flush(&self, mode: FlushMode) -> usize {
        match mode {
            FlushMode::Blocking => flush::write_devices(
                &self.shared.devices(),
                true,
                self.shared.brightness(),
            ),
            FlushMode::Deferred => {
                self.shared.signal.request();
                0
            }
        }
    }

    /// Rewrite output for every output-enabled device, pending or not.
    pub fn refresh(&self) -> usize {
        flush::write_devices(&self.shared.devices(), false, self.shared.brightness())
    }

    /// Start the background flush worker. No-op if already running.
    pub fn start_flush_worker(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_none() {
            *worker = Some(FlushWorker::spawn(self.shared.clone())?);
        }
        Ok(())
    }

    pub fn stop_flush_worker(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.stop();
        }
    }

    /// Stop flushing, detach backends, and destroy every device.
    pub fn shutdown(&self) {
        self.stop_flush_worker();
        for backend in self.backends.lock().iter_mut() {
            backend.detach();
        }
        for device in self.shared.devices() {
            device.destroy();
        }
    }

    /// Per-device summaries for UIs.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(
            self.shared
                .devices()
                .iter()
                .map(|d| DeviceSummary::of(d))
                .collect(),
        )
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::KeyPrefix;
    use crate::metadata::DeviceMeta;
    use crate::state::{KeyboardState, MouseState};

    fn registry() -> (DeviceRegistry, ManualClock) {
        let clock = ManualClock::new(Duration::from_millis(1));
        (
            DeviceRegistry::with_clock(EngineConfig::default(), Arc::new(clock.clone())),
            clock,
        )
    }

    fn keyboard(name: &str) -> DeviceSpec {
        DeviceSpec::new(name, "Keyboard", DevicePayload::Keyboard(KeyboardState::default()))
    }

    fn key_a(pressed: bool) -> InputSample {
        InputSample::Key {
            vkey: 0x41,
            make_code: 30,
            prefix: KeyPrefix::None,
            pressed,
        }
    }

    #[test]
    fn test_lookup_edge_cases() {
        let (reg, _) = registry();
        reg.upsert(keyboard("kbd"));
        assert!(reg.lookup("").is_none());
        assert!(reg.lookup("nope").is_none());
        assert!(reg.lookup("kbd").is_some());
    }

    #[test]
    fn test_lookup_updated_consumes_flag_once() {
        let (reg, _) = registry();
        reg.upsert(keyboard("kbd"));
        assert!(reg.lookup_updated("kbd").is_none());
        assert!(reg.ingest("kbd", key_a(true)));
        // plain lookups leave the flag alone
        assert!(reg.lookup("kbd").is_some());
        assert!(reg.lookup_updated("kbd").is_some());
        assert!(reg.lookup_updated("kbd").is_none());
    }

    #[test]
    fn test_rescan_preserves_id_and_tombstones_old_instance() {
        let (reg, _) = registry();
        reg.upsert(DeviceSpec::new("m", "Mouse", DevicePayload::Mouse(MouseState::default())));
        let old = reg.upsert(keyboard("kbd"));
        let new = reg.upsert(keyboard("kbd"));
        assert_eq!(old.id(), 1);
        assert_eq!(new.id(), 1);
        assert!(old.is_destroyed());
        assert!(!new.is_destroyed());
        assert_eq!(reg.len(), 2);
        assert!(Arc::ptr_eq(&reg.lookup("kbd").unwrap(), &new));
    }

    #[test]
    fn test_remove_keeps_tombstone() {
        let (reg, _) = registry();
        reg.upsert(keyboard("kbd"));
        assert!(reg.remove("kbd"));
        assert!(!reg.remove("kbd"));
        assert_eq!(reg.lookup("kbd").unwrap().kind(), DeviceKind::Destroyed);
        assert!(!reg.ingest("kbd", key_a(true)));
    }

    #[test]
    fn test_scan_skips_vendor_only_devices() {
        struct Fixed;
        impl Backend for Fixed {
            fn name(&self) -> &'static str {
                "fixed"
            }
            fn enumerate(&mut self) -> Result<Vec<DeviceSpec>> {
                let vendor = |vid, pid| DeviceMeta {
                    vid: Some(vid),
                    pid: Some(pid),
                    usage_page: Some(0xFF00),
                    ..Default::default()
                };
                Ok(vec![
                    keyboard("a"),
                    keyboard("b").with_meta(vendor(0x1234, 0x1)),
                    keyboard("c").with_meta(vendor(0xBEEF, 0x5730)),
                ])
            }
        }
        let (reg, _) = registry();
        reg.add_backend(Fixed);
        assert_eq!(reg.scan().unwrap(), 2);
        assert!(reg.lookup("b").is_none());
        assert!(reg.lookup("c").is_some());
    }

    #[test]
    fn test_sink_stops_after_replacement() {
        let (reg, _) = registry();
        let dev = reg.upsert(keyboard("kbd"));
        let sink = reg.sink(&dev);
        assert!(sink.push(key_a(true)));
        reg.upsert(keyboard("kbd"));
        assert!(!sink.push(key_a(false)));
        drop(reg);
        assert!(!sink.push(key_a(false)));
    }

    #[test]
    fn test_midi_algorithm_switch() {
        let (reg, _) = registry();
        assert_eq!(reg.midi_algorithm(), MidiAlgorithm::V2);
        reg.set_midi_algorithm(MidiAlgorithm::Legacy);
        assert_eq!(reg.config().midi_algorithm, MidiAlgorithm::Legacy);
    }
}
