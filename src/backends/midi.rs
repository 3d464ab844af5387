//! midir backend.
//!
//! Every MIDI input port becomes a `Midi` device named `;MIDI;{port};{port name}`.
//! On attach the port is connected and midir's callback thread pushes each
//! short message into the device.

use super::{Backend, DeviceSpec, IngestSink};
use crate::device::{Device, DevicePayload};
use crate::error::{Error, Result};
use crate::event::InputSample;
use crate::metadata::DeviceMeta;
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

const CLIENT_NAME: &str = "iovirt";

fn midi_err(e: impl std::fmt::Display) -> Error {
    Error::Midi(e.to_string())
}

/// Registry name of a port.
pub fn port_device_name(index: usize, port_name: &str) -> String {
    format!(";MIDI;{index};{port_name}")
}

/// Backend over every MIDI input port.
#[derive(Default)]
pub struct MidiBackend {
    ports: HashMap<String, MidiInputPort>,
    connections: Vec<MidiInputConnection<()>>,
}

impl MidiBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MidiBackend {
    fn name(&self) -> &'static str {
        "midi"
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceSpec>> {
        self.detach();
        let input = MidiInput::new(CLIENT_NAME).map_err(midi_err)?;
        let mut specs = Vec::new();
        for (index, port) in input.ports().into_iter().enumerate() {
            let port_name = match input.port_name(&port) {
                Ok(name) => name,
                Err(e) => {
                    debug!(port = index, error = %e, "unnamed MIDI port skipped");
                    continue;
                }
            };
            let name = port_device_name(index, &port_name);
            let meta = DeviceMeta {
                bus: Some("midi".into()),
                product_string: Some(port_name.clone()),
                ..DeviceMeta::default()
            };
            self.ports.insert(name.clone(), port);
            specs.push(
                DeviceSpec::new(name, port_name, DevicePayload::Midi(Box::default()))
                    .with_meta(meta),
            );
        }
        Ok(specs)
    }

    fn attach(&mut self, device: &Arc<Device>, sink: IngestSink) -> Result<()> {
        let Some(port) = self.ports.remove(device.name()) else {
            return Err(Error::Backend {
                backend: "midi",
                message: format!("{} was not enumerated by this scan", device.name()),
            });
        };
        let input = MidiInput::new(CLIENT_NAME).map_err(midi_err)?;
        let connection = input
            .connect(
                &port,
                "iovirt-in",
                move |_stamp, message, _| {
                    if !sink.push(InputSample::Midi(message.to_vec())) {
                        trace!("MIDI message for a device that is gone");
                    }
                },
                (),
            )
            .map_err(midi_err)?;
        debug!(device = %device.name(), "MIDI port connected");
        self.connections.push(connection);
        Ok(())
    }

    fn detach(&mut self) {
        for connection in self.connections.drain(..) {
            connection.close();
        }
        self.ports.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_device_name() {
        assert_eq!(port_device_name(2, "Launchpad"), ";MIDI;2;Launchpad");
    }
}
