use evociv::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    systems::{EconomySystem, EnvironmentSystem},
    terrain::TerrainGrid,
};
use tempfile::tempdir;

fn loader() -> ScenarioLoader {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn engine_runs_hook_each_tick() {
    let scenario = loader()
        .load("scenarios/default.yaml")
        .expect("scenario should load");
    let temp = tempdir().expect("tempdir");
    let mut settings = scenario.engine_settings();
    settings.snapshot_dir = temp.path().to_path_buf();
    let mut engine = EngineBuilder::new(settings, scenario.simulation.clone())
        .with_default_systems()
        .build();
    let mut world = engine.initialize_game();

    let mut ticks = Vec::new();
    engine
        .run_with_hook(&mut world, 6, |snapshot| ticks.push(snapshot.total_ticks))
        .expect("run succeeds");

    assert_eq!(ticks, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(world.total_ticks, 6);
}

#[test]
fn snapshots_land_under_scenario_dir() {
    let scenario = loader().load("scenarios/default.yaml").expect("scenario");
    let temp = tempdir().expect("tempdir");
    let mut settings = scenario.engine_settings();
    settings.snapshot_interval_ticks = 3;
    settings.snapshot_dir = temp.path().to_path_buf();
    let mut engine = EngineBuilder::new(settings, scenario.simulation.clone())
        .with_default_systems()
        .build();
    let mut world = engine.initialize_game();
    engine.run(&mut world, 7).expect("run succeeds");

    let dir = temp.path().join("default");
    assert!(dir.join("tick_000003.json").exists());
    assert!(dir.join("tick_000006.json").exists());
    assert!(!dir.join("tick_000007.json").exists());
}

#[test]
fn tick_leaves_input_untouched_and_is_deterministic() {
    let scenario = loader().load("scenarios/default.yaml").expect("scenario");
    let build = || {
        EngineBuilder::new(
            EngineSettings::new("det", scenario.seed),
            scenario.simulation.clone(),
        )
        .with_default_systems()
        .build()
    };
    let mut a = build();
    let mut b = build();
    let start_a = a.initialize_game();
    let start_b = b.initialize_game();
    assert_eq!(start_a, start_b);

    let before = start_a.clone();
    let mut next_a = a.tick_simulation(&start_a);
    let mut next_b = b.tick_simulation(&start_b);
    assert_eq!(start_a, before);
    assert_eq!(next_a.total_ticks, 1);

    for _ in 0..300 {
        next_a = a.tick_simulation(&next_a);
        next_b = b.tick_simulation(&next_b);
    }
    assert_eq!(next_a, next_b);
}

#[test]
fn mismatched_terrain_is_regenerated() {
    let scenario = loader().load("scenarios/default.yaml").expect("scenario");
    let mut engine = EngineBuilder::new(
        EngineSettings::new("terrain", 11),
        scenario.simulation.clone(),
    )
    .with_system(EnvironmentSystem::new())
    .with_system(EconomySystem::new())
    .build();
    let mut world = engine.initialize_game();
    world.terrain = TerrainGrid::filled(10, 10, 0.5);

    let next = engine.tick_simulation(&world);
    assert!(next.terrain.matches(
        scenario.simulation.world.grid_width(),
        scenario.simulation.world.grid_height()
    ));
}
