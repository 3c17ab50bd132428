use evociv::{
    components::{AgentState, ResourceKind},
    config::{SimulationConfig, StoragePolicy},
    engine::{Engine, EngineBuilder, EngineSettings},
    spatial::Spatial,
    systems::EnvironmentSystem,
    terrain::TerrainGrid,
    world::GameState,
};

fn engine(config: SimulationConfig, seed: u64) -> Engine {
    EngineBuilder::new(EngineSettings::new("simulation", seed), config)
        .with_default_systems()
        .build()
}

fn assert_bounded(state: &GameState, config: &SimulationConfig) {
    let cap = state.storage_cap(&config.economy.storage);
    for kind in ResourceKind::ALL {
        let amount = state.resources.get(kind);
        assert!(amount >= 0.0, "{} went negative", kind.label());
        if let Some(cap) = cap {
            assert!(amount <= cap + 1e-9, "{} exceeds storage", kind.label());
        }
    }
    for agent in &state.agents {
        assert!(agent.carried() >= 0.0 && agent.carried() <= agent.stats.max_carry + 1e-9);
        assert!(agent.energy >= 0.0 && agent.energy <= agent.stats.stamina);
        if let Some(inv) = agent.inventory {
            assert!(inv.amount > 0.0);
        }
    }
    for node in &state.nodes {
        assert!(node.amount >= 0.0 && node.amount <= node.max_amount);
    }
    assert!(state.lore.len() <= config.lore.capacity);
    assert!(state.population_peak >= state.population());
}

#[test]
fn new_game_founds_a_settlement() {
    let config = SimulationConfig::default();
    let mut engine = engine(config.clone(), 1);
    let state = engine.initialize_game();

    assert_eq!(state.population(), 6);
    assert_eq!(state.buildings.iter().filter(|b| b.is_storage()).count(), 1);
    assert_eq!(state.buildings.iter().filter(|b| b.is_house()).count(), 6);
    assert_eq!(state.nodes.len(), 24);
    assert!(state.homeless().is_empty());

    let spatial = Spatial::new(&state.terrain, &config);
    assert!(state.agents.iter().all(|a| spatial.is_passable(a.position)));
    assert!(state
        .agents
        .iter()
        .all(|a| a.state == AgentState::Idle && a.energy == a.stats.stamina));
}

#[test]
fn long_run_keeps_every_bound() {
    let config = SimulationConfig::default();
    let mut engine = engine(config.clone(), 2);
    let mut state = engine.initialize_game();
    let mut foraged = false;
    engine
        .run_with_hook(&mut state, 2000, |snapshot| {
            assert_bounded(snapshot, &config);
            foraged |= snapshot
                .agents
                .iter()
                .any(|a| a.state == AgentState::Gathering);
        })
        .expect("run");
    assert!(foraged, "someone should have gathered in 2000 ticks");
    assert!(state.population() >= config.agents.population_floor);
}

#[test]
fn unbounded_storage_never_clips() {
    let mut config = SimulationConfig::default();
    config.economy.storage = StoragePolicy::Unbounded;
    let mut engine = engine(config.clone(), 3);
    let mut state = engine.initialize_game();
    state.resources.stone = 50_000.0;
    engine.run(&mut state, 20).expect("run");
    assert!(state.resources.stone > 2000.0);
    assert_eq!(state.max_storage(&config.economy.storage), 2000.0);
}

#[test]
fn floor_holds_through_disasters_and_old_age() {
    let mut config = SimulationConfig::default();
    config.disaster.onset_chance = 1.0;
    config.disaster.end_chance = 0.0;
    config.disaster.wall_collapse_chance = 1.0;
    config.agents.lifespan_ticks = Some(50);
    let floor = config.agents.population_floor;
    let mut engine = engine(config, 4);
    let mut state = engine.initialize_game();

    engine
        .run_with_hook(&mut state, 400, |snapshot| {
            assert!(snapshot.population() >= floor);
            assert!(snapshot.disaster.is_some());
        })
        .expect("run");
    assert!(state
        .agents
        .iter()
        .all(|a| a.stats.lifespan.map(|l| a.age <= u64::from(l)).unwrap_or(true)));
}

#[test]
fn empty_node_respawns_on_suitable_ground() {
    let mut config = SimulationConfig::default();
    config.resources.respawn_chance = 1.0;
    config.resources.regen_chance = 0.0;
    let mut engine = EngineBuilder::new(EngineSettings::new("respawn", 5), config.clone())
        .with_system(EnvironmentSystem::new())
        .build();
    let mut state = engine.initialize_game();
    state.terrain = TerrainGrid::filled(
        config.world.grid_width(),
        config.world.grid_height(),
        0.45,
    );
    let food = state
        .nodes
        .iter()
        .position(|n| n.kind == ResourceKind::Food)
        .expect("food node");
    state.nodes[food].amount = 0.0;
    let old_position = state.nodes[food].position;

    let next = engine.tick_simulation(&state);
    let node = &next.nodes[food];
    assert_eq!(node.amount, 200.0);
    assert_ne!(node.position, old_position);
    let spatial = Spatial::new(&next.terrain, &config);
    assert!(spatial.suits(ResourceKind::Food, node.position));
}

#[test]
fn exhausted_agent_goes_home_in_one_tick() {
    let config = SimulationConfig::default();
    let mut engine = engine(config, 6);
    let mut state = engine.initialize_game();
    let stamina = state.agents[0].stats.stamina;
    state.agents[0].energy = stamina * 0.05;
    let home = state.agents[0].home.and_then(|id| state.building(id)).map(|b| b.position);

    let next = engine.tick_simulation(&state);
    let agent = next
        .agents
        .iter()
        .find(|a| a.id == state.agents[0].id)
        .expect("agent survives");
    assert!(matches!(agent.state, AgentState::MovingHome | AgentState::Resting));
    if agent.state == AgentState::MovingHome {
        assert_eq!(agent.target, home);
    }
}

#[test]
fn fed_settlement_grows() {
    let mut config = SimulationConfig::default();
    config.resources.starting_stockpile.food = 1500.0;
    let mut engine = engine(config, 7);
    let mut state = engine.initialize_game();
    engine.run(&mut state, 200).expect("run");
    assert!(state.population() > 6);
    assert!(state.population_peak >= state.population());
    assert!(state.homeless().len() <= state.population());
}
