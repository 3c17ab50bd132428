use chrono::{DateTime, Duration, Utc};
use evociv::{
    components::ResourceKind,
    config::SimulationConfig,
    engine::{EngineBuilder, EngineSettings},
    persistence::{self, SaveEnvelope},
    rng::RngManager,
};
use tempfile::tempdir;

const LEGACY_BLOB: &str = r#"{
    "timestamp": 1000000,
    "state": {
        "resources": { "FOOD": 80.0, "WOOD": 20.0 },
        "agents": [
            { "id": "a", "state": "GATHERING", "homeId": "h", "inventory": { "type": "WOOD", "amount": 4.0 } },
            { "id": 7, "state": "FLEEING", "stats": { "speed": 2.0 } }
        ],
        "buildings": [
            { "id": "h", "type": "HOUSE", "level": 1, "occupants": ["a"] },
            { "id": "s", "type": "STORAGE", "position": { "x": 800.0, "y": 600.0 } }
        ],
        "nodes": [ { "id": "n", "type": "FOOD", "amount": 30.0 } ],
        "disasterActive": true,
        "disasterType": "FLOOD"
    }
}"#;

fn saved_at() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).expect("valid timestamp")
}

#[test]
fn save_round_trips_through_migration() {
    let config = SimulationConfig::default();
    let mut engine = EngineBuilder::new(EngineSettings::new("save", 21), config.clone())
        .with_default_systems()
        .build();
    let mut state = engine.initialize_game();
    engine.run(&mut state, 250).expect("run");

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("saves/slot1.json");
    persistence::save_to_path(&path, &state, saved_at()).expect("save");

    let mut rng = RngManager::new(99);
    let loaded = persistence::load_from_path(&path, &config, &mut rng, saved_at()).expect("load");
    assert_eq!(loaded, state);
}

#[test]
fn long_absence_credits_food_and_wood() {
    let config = SimulationConfig::default();
    let mut rng = RngManager::new(22);
    let mut state = evociv::GameState::initialize(&config, &mut rng);
    state.resources.food = 10.0;
    state.resources.wood = 10.0;

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("slot.json");
    persistence::save_to_path(&path, &state, saved_at()).expect("save");

    let later = saved_at() + Duration::minutes(10);
    let loaded = persistence::load_from_path(&path, &config, &mut rng, later).expect("load");
    assert_eq!(loaded.resources.get(ResourceKind::Food), 310.0);
    assert_eq!(loaded.resources.get(ResourceKind::Wood), 130.0);
    assert_eq!(loaded.lore.len(), state.lore.len() + 1);
    assert_eq!(loaded.agents, state.agents);
}

#[test]
fn envelope_carries_millisecond_timestamp() {
    let config = SimulationConfig::default();
    let state = evociv::GameState::initialize(&config, &mut RngManager::new(23));
    let envelope = SaveEnvelope::new(state, saved_at());
    let json = serde_json::to_value(&envelope).expect("serialize");
    assert_eq!(json["timestamp"], 1_700_000_000_000_i64);
    assert!(json["state"]["terrain"].is_array());
}

#[test]
fn garbage_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "not json").expect("write");
    let config = SimulationConfig::default();
    let err = persistence::load_from_path(&path, &config, &mut RngManager::new(1), saved_at())
        .expect_err("should fail");
    assert!(matches!(err, persistence::PersistenceError::Malformed(_)));

    let missing = persistence::load_from_path(
        dir.path().join("absent.json"),
        &config,
        &mut RngManager::new(1),
        saved_at(),
    );
    assert!(matches!(missing, Err(persistence::PersistenceError::Read { .. })));
}

#[test]
fn partial_saves_keep_ticking() {
    let config = SimulationConfig::default();
    for blob in ["{}", r#"{"state":{"agents":[{"id":"x"}]}}"#, LEGACY_BLOB] {
        let mut engine = EngineBuilder::new(EngineSettings::new("partial", 31), config.clone())
            .with_default_systems()
            .build();
        let raw = persistence::parse_save(blob).expect("parse");
        let mut state = persistence::migrate(raw.state, &config, engine.rng_mut());
        engine.run(&mut state, 300).expect("run");
        assert_eq!(state.total_ticks, 300);
        assert!(state.population() >= config.agents.population_floor);
    }
}
