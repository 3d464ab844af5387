//! Scan real HID and MIDI hardware and print control changes.
//!
//! `RUST_LOG=iovirt=debug cargo run --example poll --features hid,midi`

use iovirt::backends::hid::HidBackend;
use iovirt::backends::midi::MidiBackend;
use iovirt::{
    AnalogBinding, ButtonBinding, ControlKind, DeviceRegistry, EventFilter, LoggingListener,
    Resolver,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

enum Watched {
    Button(ButtonBinding, bool),
    Analog(AnalogBinding, f32),
}

fn main() -> iovirt::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "iovirt=info".into()))
        .init();

    let registry = DeviceRegistry::default();
    registry.add_listener(LoggingListener::new(), EventFilter::All, None);
    registry.add_backend(HidBackend::new());
    registry.add_backend(MidiBackend::new());
    registry.scan()?;

    let snapshot = registry.snapshot();
    println!("Discovered {} device(s)", snapshot.len());

    // one binding per input control
    let mut watched: HashMap<String, Vec<(String, Watched)>> = HashMap::new();
    for device in registry.devices() {
        println!("== {} ({}) ==", device.desc(), device.name());
        let mut list = Vec::new();
        for ctl in device.controls() {
            println!(
                "  {:?} #{:02} name={:?} logical=[{}..{}]",
                ctl.kind, ctl.idx, ctl.name, ctl.logical_min, ctl.logical_max
            );
            let idx = ctl.idx as u16;
            match ctl.kind {
                ControlKind::Button => list.push((
                    ctl.name,
                    Watched::Button(ButtonBinding::device("", device.name(), idx), false),
                )),
                ControlKind::Value | ControlKind::Hat => list.push((
                    ctl.name,
                    Watched::Analog(AnalogBinding::device("", device.name(), idx), f32::NAN),
                )),
                _ => {}
            }
        }
        watched.insert(device.name().to_string(), list);
    }

    let resolver = Resolver::new(&registry);
    loop {
        for (name, list) in watched.iter_mut() {
            let Some(device) = registry.lookup_updated(name) else {
                continue;
            };
            let mut parts = Vec::new();
            for (label, w) in list.iter_mut() {
                match w {
                    Watched::Button(binding, last) => {
                        let pressed = resolver.resolve_button(binding);
                        if pressed != *last {
                            parts.push(format!("{}{label}", if pressed { '+' } else { '-' }));
                            *last = pressed;
                        }
                    }
                    Watched::Analog(binding, last) => {
                        let value = resolver.resolve_analog(binding);
                        if (value - *last).abs() > 0.002 || last.is_nan() {
                            parts.push(format!("{label}={value:.3}"));
                            *last = value;
                        }
                    }
                }
            }
            if !parts.is_empty() {
                println!("{}: {}", device.id(), parts.join(" "));
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
