use crate::eventbus::{DeviceEvent, DeviceListener};

/// Wraps a listener and filters notifications with a user-supplied predicate.
pub struct FilteredListener {
    predicate: Box<dyn Fn(&DeviceEvent<'_>) -> bool + Send + Sync>,
    inner: Box<dyn DeviceListener>,
}

impl FilteredListener {
    pub fn new(
        predicate: impl Fn(&DeviceEvent<'_>) -> bool + Send + Sync + 'static,
        inner: Box<dyn DeviceListener>,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }
}

impl DeviceListener for FilteredListener {
    fn on_device(&mut self, event: &DeviceEvent<'_>) {
        if (self.predicate)(event) {
            self.inner.on_device(event);
        }
    }
}
