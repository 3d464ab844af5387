//! hidapi backend.
//!
//! Each accepted HID interface is opened once. Its report descriptor becomes
//! the device's [`CapabilityModel`]; a reader thread pulls input reports and
//! pushes them through the device's [`IngestSink`]; output reports go back out
//! through the same handle.
//!
//! Plain mice and keyboards on the Generic Desktop page are left alone.
//! Vendor-page interfaces are enumerated and then filtered by the registry's
//! allow-list.

use super::{Backend, DeviceSpec, IngestSink};
use crate::capability::CapabilityModel;
use crate::device::{Device, DevicePayload, OutputFrame, Transport};
use crate::error::{Error, Result};
use crate::event::InputSample;
use crate::metadata::DeviceMeta;
use crate::state::HidState;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

const MAX_REPORT_DESCRIPTOR_SIZE: usize = 4096;

/// How long one read waits before the reader rechecks its stop flag.
const READ_TIMEOUT_MS: i32 = 10;

/// Largest input report we expect; longer reports are truncated by hidapi.
const MAX_INPUT_REPORT: usize = 1024;

/// Usage pages/usages worth opening.
fn accept_usage(usage_page: u16, usage: u16) -> bool {
    // Generic Desktop mouse and keyboard
    !(usage_page == 0x01 && matches!(usage, 0x02 | 0x06))
}

fn meta_of(info: &DeviceInfo) -> DeviceMeta {
    let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
    DeviceMeta {
        bus: Some("usb".into()),
        vid: Some(info.vendor_id()),
        pid: Some(info.product_id()),
        manufacturer: non_empty(info.manufacturer_string()),
        product_string: non_empty(info.product_string()),
        serial_number: non_empty(info.serial_number()),
        usage_page: Some(info.usage_page()),
        usage: Some(info.usage()),
        path: Some(info.path().to_string_lossy().into_owned()),
    }
}

fn read_capabilities(device: &HidDevice) -> Result<CapabilityModel> {
    let mut buf = vec![0u8; MAX_REPORT_DESCRIPTOR_SIZE];
    let len = device.get_report_descriptor(&mut buf)?;
    Ok(CapabilityModel::from_descriptor(&buf[..len])?)
}

/// Output path of one HID interface, on its own handle so writes never wait
/// behind the reader's timed read.
pub struct HidTransport {
    handle: HidDevice,
}

impl Transport for HidTransport {
    fn write(&mut self, frame: &OutputFrame) -> Result<()> {
        let OutputFrame::Reports(reports) = frame else {
            return Err(Error::Transport("HID devices only accept reports".into()));
        };
        for report in reports {
            self.handle.write(report)?;
        }
        Ok(())
    }
}

/// Source of input reports for a reader thread.
trait ReportSource: Send + 'static {
    /// Bytes read into `buf`; 0 when the timeout elapsed first.
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

impl ReportSource for HidDevice {
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        Ok(self.read_timeout(buf, timeout_ms)?)
    }
}

struct Reader {
    name: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Reader {
    fn spawn(name: String, source: impl ReportSource, sink: IngestSink) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let mut source = source;
        let thread = thread::Builder::new()
            .name("iovirt-hid".into())
            .spawn(move || read_loop(&mut source, &sink, &flag))?;
        Ok(Self {
            name,
            stop,
            thread: Some(thread),
        })
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(device = %self.name, "HID reader panicked");
            }
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(source: &mut impl ReportSource, sink: &IngestSink, stop: &AtomicBool) {
    let mut buf = vec![0u8; MAX_INPUT_REPORT];
    while !stop.load(Ordering::Relaxed) {
        match source.read_report(&mut buf, READ_TIMEOUT_MS) {
            Ok(0) => {}
            Ok(n) => {
                if !sink.push(InputSample::HidReport(buf[..n].to_vec())) {
                    trace!("HID reader target gone");
                    return;
                }
            }
            Err(e) => {
                warn!(device = ?sink.device_name(), error = %e, "HID read failed; reader exiting");
                return;
            }
        }
    }
}

/// Backend over every HID interface hidapi reports.
#[derive(Default)]
pub struct HidBackend {
    opened: HashMap<String, HidDevice>,
    readers: Vec<Reader>,
}

impl HidBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for HidBackend {
    fn name(&self) -> &'static str {
        "hid"
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceSpec>> {
        // readers from the previous scan belong to devices about to be replaced
        self.detach();
        let api = HidApi::new()?;
        let mut specs = Vec::new();
        for info in api.device_list() {
            if !accept_usage(info.usage_page(), info.usage()) {
                continue;
            }
            let meta = meta_of(info);
            let name = meta.path.clone().unwrap_or_default();
            let device = match info.open_device(&api) {
                Ok(device) => device,
                Err(e) => {
                    debug!(device = %name, error = %e, "cannot open HID interface");
                    continue;
                }
            };
            let caps = match read_capabilities(&device) {
                Ok(caps) => caps,
                Err(e) => {
                    warn!(device = %name, error = %e, "unusable report descriptor");
                    continue;
                }
            };
            let desc = meta.description().unwrap_or_else(|| "HID Device".into());
            let has_outputs = caps.output_count() > 0;
            let mut spec =
                DeviceSpec::new(&name, desc, DevicePayload::Hid(Box::new(HidState::new(caps))))
                    .with_meta(meta);
            if has_outputs {
                match api.open_path(info.path()) {
                    Ok(handle) => spec = spec.with_transport(HidTransport { handle }),
                    Err(e) => warn!(device = %name, error = %e, "cannot open HID output handle"),
                }
            }
            self.opened.insert(name, device);
            specs.push(spec);
        }
        Ok(specs)
    }

    fn attach(&mut self, device: &Arc<Device>, sink: IngestSink) -> Result<()> {
        let Some(source) = self.opened.remove(device.name()) else {
            return Err(Error::Backend {
                backend: "hid",
                message: format!("{} was not opened by this scan", device.name()),
            });
        };
        self.readers
            .push(Reader::spawn(device.name().to_string(), source, sink)?);
        Ok(())
    }

    fn detach(&mut self) {
        for reader in &mut self.readers {
            reader.stop();
        }
        self.readers.clear();
        self.opened.clear();
    }
}
