use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::{
    components::Vector2,
    config::SimulationConfig,
    narrative::{ChronicleRequest, NarrativeBridge},
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    systems::{
        BehaviorSystem, BookkeepingSystem, ConstructionSystem, DisasterSystem, EconomySystem,
        EnvironmentSystem, PopulationSystem,
    },
    terrain::TerrainGrid,
    world::GameState,
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
    pub lore_interval_ticks: u64,
    /// Sleep between ticks; `None` runs flat out.
    pub tick_pacing: Option<Duration>,
}

impl EngineSettings {
    pub fn new(scenario_name: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            seed,
            snapshot_interval_ticks: 0,
            snapshot_dir: PathBuf::from("snapshots"),
            lore_interval_ticks: 3000,
            tick_pacing: None,
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    config: SimulationConfig,
    systems: Vec<Box<dyn System>>,
    narrative: Option<NarrativeBridge>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, config: SimulationConfig) -> Self {
        Self {
            settings,
            config,
            systems: Vec::new(),
            narrative: None,
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// The full tick pipeline in its canonical order.
    pub fn with_default_systems(self) -> Self {
        self.with_system(DisasterSystem::new())
            .with_system(EnvironmentSystem::new())
            .with_system(EconomySystem::new())
            .with_system(ConstructionSystem::new())
            .with_system(PopulationSystem::new())
            .with_system(BehaviorSystem::new())
            .with_system(BookkeepingSystem::new())
    }

    pub fn with_narrative(mut self, bridge: NarrativeBridge) -> Self {
        self.narrative = Some(bridge);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            narrative: self.narrative,
            config: self.config,
            settings: self.settings,
        }
    }
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    narrative: Option<NarrativeBridge>,
    config: SimulationConfig,
    settings: EngineSettings,
}

impl Engine {
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn rng_mut(&mut self) -> &mut RngManager {
        &mut self.rng
    }

    pub fn initialize_game(&mut self) -> GameState {
        GameState::initialize(&self.config, &mut self.rng)
    }

    /// Advances the world by one tick. The input is left untouched, but the
    /// result also depends on the engine's RNG streams, so ticking the same
    /// state twice on one engine gives different worlds.
    pub fn tick_simulation(&mut self, state: &GameState) -> GameState {
        let mut next = state.clone();
        next.total_ticks += 1;

        let (width, height) = (self.config.world.grid_width(), self.config.world.grid_height());
        if !next.terrain.matches(width, height) {
            tracing::warn!(width, height, "terrain does not fit the world, regenerating");
            next.terrain = TerrainGrid::generate(
                width,
                height,
                &self.config.terrain,
                &mut self.rng.stream("terrain"),
            );
        }

        let ctx = SystemContext {
            tick: next.total_ticks,
            center: next.settlement_center(&self.config.world),
            config: &self.config,
        };
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            system.run(&ctx, &mut next, &mut rng_stream);
        }
        next
    }

    pub fn run(&mut self, state: &mut GameState, ticks: u64) -> Result<()> {
        self.run_with_hook(state, ticks, |_| {})
    }

    /// Runs `ticks` ticks, handing every new state to `hook`.
    pub fn run_with_hook<F>(&mut self, state: &mut GameState, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(&GameState),
    {
        for _ in 0..ticks {
            *state = self.tick_simulation(state);
            self.exchange_lore(state);
            self.snapshot_writer
                .maybe_write(state, &self.settings.scenario_name)
                .with_context(|| format!("failed to snapshot tick {}", state.total_ticks))?;
            hook(state);
            if let Some(pause) = self.settings.tick_pacing {
                std::thread::sleep(pause);
            }
        }
        Ok(())
    }

    fn exchange_lore(&mut self, state: &mut GameState) {
        let Some(bridge) = self.narrative.as_mut() else {
            return;
        };
        let every = self.settings.lore_interval_ticks;
        if every > 0 && state.total_ticks > 0 && state.total_ticks % every == 0 {
            bridge.request(ChronicleRequest::from_state(state));
        }
        bridge.drain_into(state, self.config.lore.capacity);
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    /// Where foragers deliver goods and new buildings cluster around.
    pub center: Vector2,
    pub config: &'a SimulationConfig,
}

/// One stage of the tick pipeline. Stages never fail: every shortfall has a
/// fallback that keeps the world running.
pub trait System: Send {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng<'_>);
}
