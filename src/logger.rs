use crate::eventbus::{DeviceEvent, DeviceEventKind, DeviceListener};
use tracing::info;

/// A listener that logs every add/change notification through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl LoggingListener {
    pub fn new() -> Self {
        LoggingListener
    }
}

impl DeviceListener for LoggingListener {
    fn on_device(&mut self, event: &DeviceEvent<'_>) {
        let dev = event.device;
        match event.kind {
            DeviceEventKind::Added => {
                info!(id = dev.id(), device = %dev.name(), desc = %dev.desc(), kind = %dev.kind(), "device added")
            }
            DeviceEventKind::Changed => {
                info!(id = dev.id(), device = %dev.name(), desc = %dev.desc(), kind = %dev.kind(), "device changed")
            }
        }
    }
}
