//! Background output flushing.
//!
//! The worker sleeps on a condition variable. A deferred flush request wakes
//! it to write devices with pending output; independent of requests, every
//! refresh period it rewrites all output-enabled devices, since several light
//! boards fall back to their built-in pattern when not refreshed.

use crate::device::Device;
use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Flags {
    requested: bool,
    stop: bool,
}

/// Wakeup channel between flush requesters and the worker.
#[derive(Debug, Default)]
pub(crate) struct FlushSignal {
    flags: Mutex<Flags>,
    cv: Condvar,
}

impl FlushSignal {
    pub(crate) fn request(&self) {
        self.flags.lock().requested = true;
        self.cv.notify_one();
    }

    fn stop(&self) {
        self.flags.lock().stop = true;
        self.cv.notify_all();
    }

    fn reset(&self) {
        *self.flags.lock() = Flags::default();
    }
}

/// Write every device's output; returns the number of frames written.
pub(crate) fn write_devices(devices: &[Arc<Device>], only_pending: bool, brightness: u8) -> usize {
    let mut written = 0;
    for device in devices {
        match device.write_output(only_pending, brightness) {
            Ok(true) => written += 1,
            Ok(false) => {}
            Err(e) => warn!(device = %device.name(), error = %e, "output write failed"),
        }
    }
    written
}

/// Source of the device list and settings the worker flushes.
pub(crate) trait FlushTarget: Send + Sync + 'static {
    fn devices(&self) -> Vec<Arc<Device>>;
    fn brightness(&self) -> u8;
    fn refresh_interval(&self) -> Duration;
    fn signal(&self) -> &FlushSignal;
}

pub(crate) struct FlushWorker {
    handle: Option<JoinHandle<()>>,
    stop: Box<dyn Fn() + Send + Sync>,
}

impl FlushWorker {
    pub(crate) fn spawn<T: FlushTarget>(target: Arc<T>) -> Result<Self> {
        target.signal().reset();
        let worker_target = target.clone();
        let handle = thread::Builder::new()
            .name("iovirt-flush".into())
            .spawn(move || run(&*worker_target))?;
        debug!("flush worker started");
        Ok(Self {
            handle: Some(handle),
            stop: Box::new(move || target.signal().stop()),
        })
    }

    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        (self.stop)();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("flush worker panicked");
            }
            debug!("flush worker stopped");
        }
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<T: FlushTarget>(target: &T) {
    let signal = target.signal();
    let mut next_refresh = Instant::now() + target.refresh_interval();
    loop {
        let requested = {
            let mut flags = signal.flags.lock();
            while !flags.requested && !flags.stop {
                if signal.cv.wait_until(&mut flags, next_refresh).timed_out() {
                    break;
                }
            }
            if flags.stop {
                return;
            }
            std::mem::take(&mut flags.requested)
        };

        let now = Instant::now();
        if now >= next_refresh {
            write_devices(&target.devices(), false, target.brightness());
            next_refresh = now + target.refresh_interval();
        } else if requested {
            write_devices(&target.devices(), true, target.brightness());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DevicePayload, OutputFrame, Transport};
    use crate::metadata::DeviceMeta;
    use crate::state::LightBoardState;

    struct Count(Arc<Mutex<usize>>);

    impl Transport for Count {
        fn write(&mut self, _frame: &OutputFrame) -> Result<()> {
            *self.0.lock() += 1;
            Ok(())
        }
    }

    struct Target {
        devices: Vec<Arc<Device>>,
        signal: FlushSignal,
        refresh: Duration,
    }

    impl FlushTarget for Target {
        fn devices(&self) -> Vec<Arc<Device>> {
            self.devices.clone()
        }
        fn brightness(&self) -> u8 {
            100
        }
        fn refresh_interval(&self) -> Duration {
            self.refresh
        }
        fn signal(&self) -> &FlushSignal {
            &self.signal
        }
    }

    fn target(refresh: Duration) -> (Arc<Target>, Arc<Mutex<usize>>) {
        let writes = Arc::new(Mutex::new(0));
        let dev = Arc::new(Device::new(
            0,
            "board",
            "Board",
            DeviceMeta::default(),
            DevicePayload::SerialLightBoard(LightBoardState::new(2)),
            Some(Box::new(Count(writes.clone()))),
        ));
        let t = Arc::new(Target {
            devices: vec![dev],
            signal: FlushSignal::default(),
            refresh,
        });
        (t, writes)
    }

    fn wait_for(writes: &Mutex<usize>, at_least: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if *writes.lock() >= at_least {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_deferred_request_writes_pending_output() {
        let (t, writes) = target(Duration::from_secs(3600));
        let worker = FlushWorker::spawn(t.clone()).unwrap();
        t.devices[0].set_output(0, 1.0);
        t.signal.request();
        assert!(wait_for(&writes, 1));
        worker.stop();
        assert_eq!(*writes.lock(), 1);
    }

    #[test]
    fn test_periodic_refresh_rewrites_without_changes() {
        let (t, writes) = target(Duration::from_millis(10));
        t.devices[0].set_output(0, 1.0);
        let worker = FlushWorker::spawn(t.clone()).unwrap();
        assert!(wait_for(&writes, 3));
        worker.stop();
    }

    #[test]
    fn test_write_devices_skips_disabled_output() {
        let (t, writes) = target(Duration::from_secs(1));
        assert_eq!(write_devices(&t.devices, false, 100), 0);
        t.devices[0].set_output(1, 1.0);
        assert_eq!(write_devices(&t.devices, true, 100), 1);
        assert_eq!(write_devices(&t.devices, true, 100), 0);
        assert_eq!(*writes.lock(), 1);
    }
}
