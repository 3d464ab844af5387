use iovirt::device::DevicePayload;
use iovirt::state::{KeyboardState, LightBoardState};
use iovirt::{
    BindingProfile, ButtonBinding, DeviceRegistry, DeviceSpec, EngineConfig, InputSample,
    KeyPrefix, LightBinding, ManualClock, NullKeySource, Resolver,
};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (DeviceRegistry, ManualClock) {
    let clock = ManualClock::new(Duration::from_secs(1));
    let registry = DeviceRegistry::with_clock(EngineConfig::default(), Arc::new(clock.clone()));
    registry.upsert(DeviceSpec::new(
        "kbd",
        "Keyboard",
        DevicePayload::Keyboard(KeyboardState::default()),
    ));
    registry.upsert(DeviceSpec::new("keys", "Keys", DevicePayload::Midi(Box::default())));
    registry.upsert(DeviceSpec::new(
        "board",
        "Board",
        DevicePayload::SerialLightBoard(LightBoardState::new(4)),
    ));
    (registry, clock)
}

fn key(registry: &DeviceRegistry, vkey: u16, pressed: bool) {
    registry.ingest(
        "kbd",
        InputSample::Key {
            vkey,
            make_code: 0,
            prefix: KeyPrefix::None,
            pressed,
        },
    );
}

#[test]
fn second_alternative_supplies_press_and_velocity() {
    let (registry, _) = setup();
    let resolver = Resolver::with_keys(&registry, Arc::new(NullKeySource));
    let mut start = ButtonBinding::device("Start", "kbd", 0x53)
        .with_alternative(ButtonBinding::device("Start", "keys", 61))
        .with_alternative(ButtonBinding::device("Start", "keys", 62));

    registry.ingest("keys", InputSample::Midi(vec![0x90, 62, 90]));
    assert!(resolver.resolve_button(&mut start));
    let velocity = resolver.resolve_velocity(&mut start);
    assert!((velocity - 90.0 / 127.0).abs() < 1e-6, "{velocity}");
}

#[test]
fn primary_override_beats_everything() {
    let (registry, _) = setup();
    let resolver = Resolver::with_keys(&registry, Arc::new(NullKeySource));
    let mut start = ButtonBinding::device("Start", "kbd", 0x53)
        .with_alternative(ButtonBinding::device("Start", "kbd", 0x54));
    key(&registry, 0x54, true);
    assert!(resolver.resolve_button(&mut start));

    start.set_override(false, 0.0);
    assert!(!resolver.resolve_button(&mut start));
    assert_eq!(resolver.resolve_velocity(&mut start), 0.0);
    start.set_override(true, 0.25);
    assert_eq!(resolver.resolve_velocity(&mut start), 0.25);
    start.clear_override();
    assert_eq!(resolver.resolve_velocity(&mut start), 1.0);
}

#[test]
fn release_is_debounced() {
    let (registry, clock) = setup();
    let resolver = Resolver::with_keys(&registry, Arc::new(NullKeySource));
    let mut fire = ButtonBinding::device("Fire", "kbd", 0x46);
    fire.debounce_up = 0.05;

    key(&registry, 0x46, true);
    assert!(resolver.resolve_button(&mut fire));
    clock.advance(Duration::from_millis(100));
    key(&registry, 0x46, false);

    clock.advance(Duration::from_millis(30));
    assert!(resolver.resolve_button(&mut fire));
    clock.advance(Duration::from_millis(21));
    assert!(!resolver.resolve_button(&mut fire));
}

#[test]
fn light_override_reaches_alternatives() {
    let (registry, _) = setup();
    let resolver = Resolver::with_keys(&registry, Arc::new(NullKeySource));
    let board = registry.lookup("board").unwrap();
    let mut lamp = LightBinding::device("Lamp", "board", 0)
        .with_alternative(LightBinding::device("Lamp", "board", 2));

    lamp.set_override(1.0);
    resolver.write_light(&mut lamp, 0.0);
    assert_eq!(board.output(0), Some(1.0));
    assert_eq!(board.output(2), Some(1.0));
    assert_eq!(resolver.read_light(&lamp.alternatives[0]), 1.0);
}

#[test]
fn profile_round_trip_keeps_alternatives() {
    let (registry, _) = setup();
    let resolver = Resolver::with_keys(&registry, Arc::new(NullKeySource));
    let dir = tempfile::tempdir().unwrap();

    let mut profile = BindingProfile::new("arcade");
    profile.buttons.push(
        ButtonBinding::device("Start", "kbd", 0x53)
            .with_alternative(ButtonBinding::device("Start", "keys", 62)),
    );
    for file in ["arcade.toml", "arcade.json"] {
        let path = dir.path().join(file);
        profile.save(&path).unwrap();
        assert_eq!(BindingProfile::load(&path).unwrap(), profile);
    }

    let loaded = BindingProfile::load(dir.path().join("arcade.toml")).unwrap();
    let mut bindings = loaded.sorted_buttons(&["Coin", "Start"]);
    assert!(!bindings[0].is_set());
    registry.ingest("keys", InputSample::Midi(vec![0x90, 62, 127]));
    assert!(resolver.resolve_button(&mut bindings[1]));
}
