//! Drive virtual devices through bindings without any hardware.
//!
//! `cargo run --example virtual_demo`

use iovirt::backends::virtual_input::{RecordingTransport, VirtualBackend};
use iovirt::event::{InputSample, KeyPrefix};
use iovirt::state::{KeyboardState, LightBoardState};
use iovirt::{
    ButtonBinding, DevicePayload, DeviceRegistry, EventFilter, FlushMode, LightBinding,
    LoggingListener, NullKeySource, Resolver,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> iovirt::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "iovirt=info".into()))
        .init();

    let mut backend = VirtualBackend::new();
    backend.add(
        "kbd",
        "Demo Keyboard",
        DevicePayload::Keyboard(KeyboardState::default()),
    );
    let lamps = RecordingTransport::default();
    backend.add_with_transport(
        "lamps",
        "Demo Light Board",
        DevicePayload::SerialLightBoard(LightBoardState::new(4)),
        lamps.clone(),
    );
    let feed = backend.handle();

    let registry = DeviceRegistry::default();
    registry.add_listener(LoggingListener::new(), EventFilter::AddedOnly, None);
    registry.add_backend(backend);
    registry.scan()?;

    let resolver = Resolver::with_keys(&registry, Arc::new(NullKeySource));
    let mut start = ButtonBinding::device("Start", "kbd", 0x20);
    let mut start_lamp = LightBinding::device("Start Lamp", "lamps", 0);
    println!("{}", resolver.button_display(&start));
    println!("{}", resolver.light_display(&start_lamp));

    for pressed in [true, false] {
        feed.push(
            "kbd",
            InputSample::Key {
                vkey: 0x20,
                make_code: 0x39,
                prefix: KeyPrefix::None,
                pressed,
            },
        );
        let held = resolver.resolve_button(&mut start);
        resolver.write_light(&mut start_lamp, if held { 1.0 } else { 0.0 });
        registry.flush(FlushMode::Blocking);
        println!("Start held={held} lamp frame={:?}", lamps.last());
    }

    registry.shutdown();
    Ok(())
}
