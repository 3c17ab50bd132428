//! Simulation tunables.
//!
//! Every field has a default, so scenario files only list what they override.

use serde::{Deserialize, Serialize};

use crate::components::{ResourceKind, Stats, Stockpile};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub world: WorldConfig,
    pub terrain: TerrainConfig,
    pub pathfinding: PathfindingConfig,
    pub agents: AgentConfig,
    pub economy: EconomyConfig,
    pub costs: CostTable,
    pub population: PopulationConfig,
    pub disaster: DisasterConfig,
    pub resources: ResourceConfig,
    pub lore: LoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
    pub tile_size: f64,
}

impl WorldConfig {
    pub fn grid_width(&self) -> usize {
        (self.width / self.tile_size).floor().max(1.0) as usize
    }

    pub fn grid_height(&self) -> usize {
        (self.height / self.tile_size).floor().max(1.0) as usize
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 1200.0,
            tile_size: 20.0,
        }
    }
}

/// Biome bands are upper bounds: a cell belongs to the first band whose
/// threshold it is below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub smoothing_passes: u32,
    pub contrast: f64,
    pub deep_water: f64,
    pub water: f64,
    pub sand: f64,
    pub grass: f64,
    pub forest: f64,
    pub mountain: f64,
    pub snow: f64,
    pub spawn_attempts: u32,
    pub fertile_below: f64,
    pub rocky_above: f64,
    pub gold_above: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            smoothing_passes: 5,
            contrast: 2.0,
            deep_water: 0.2,
            water: 0.3,
            sand: 0.35,
            grass: 0.52,
            forest: 0.6,
            mountain: 0.7,
            snow: 0.85,
            spawn_attempts: 50,
            fertile_below: 0.5,
            rocky_above: 0.5,
            gold_above: 0.55,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    pub max_iterations: usize,
    pub direct_cutoff: f64,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 800,
            direct_cutoff: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub initial_population: usize,
    pub base_stats: Stats,
    /// `None` keeps agents alive forever; `Some(n)` gives founders an `n`-tick lifespan.
    pub lifespan_ticks: Option<u32>,
    pub energy_drain: f64,
    pub rest_threshold: f64,
    pub rest_recovery: f64,
    pub flee_speed_multiplier: f64,
    pub flee_arrival_radius: f64,
    pub gather_radius: f64,
    pub gather_reach: f64,
    pub deposit_radius: f64,
    pub home_radius: f64,
    pub wander_distance: f64,
    pub nearby_node_radius: f64,
    pub candidate_nodes: usize,
    pub population_floor: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            initial_population: 6,
            base_stats: Stats::default(),
            lifespan_ticks: None,
            energy_drain: 0.5,
            rest_threshold: 0.2,
            rest_recovery: 8.0,
            flee_speed_multiplier: 1.5,
            flee_arrival_radius: 50.0,
            gather_radius: 10.0,
            gather_reach: 20.0,
            deposit_radius: 15.0,
            home_radius: 10.0,
            wander_distance: 30.0,
            nearby_node_radius: 300.0,
            candidate_nodes: 3,
            population_floor: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StoragePolicy {
    Unbounded,
    Capped { per_level: f64 },
}

impl Default for StoragePolicy {
    fn default() -> Self {
        StoragePolicy::Capped { per_level: 2000.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub food_goal_per_agent: f64,
    pub food_goal_base: f64,
    pub farm_interval: u64,
    pub farm_base_production: f64,
    pub farm_production_per_level: f64,
    pub construction_interval: u64,
    pub house_upgrade_interval: u64,
    pub house_capacity: usize,
    pub farms_per_agent: f64,
    pub storage: StoragePolicy,
    pub storage_upgrade_wood: f64,
    pub storage_upgrade_stone: f64,
    pub storage_pressure: f64,
    pub wall_wood_threshold: f64,
    pub wall_stone_threshold: f64,
    pub wall_chance: f64,
    pub wall_min_radius: f64,
    pub wall_attempts: u32,
    pub wall_footprint: f64,
    pub wall_clearance: f64,
    pub wall_upgrade_stone: f64,
    pub towers_per_agents: usize,
    pub tower_min_walls: usize,
    pub footprint_radius: f64,
    pub clearance: f64,
    pub max_spiral_radius: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            food_goal_per_agent: 30.0,
            food_goal_base: 200.0,
            farm_interval: 200,
            farm_base_production: 20.0,
            farm_production_per_level: 10.0,
            construction_interval: 10,
            house_upgrade_interval: 100,
            house_capacity: 2,
            farms_per_agent: 1.0 / 2.5,
            storage: StoragePolicy::default(),
            storage_upgrade_wood: 1000.0,
            storage_upgrade_stone: 500.0,
            storage_pressure: 0.9,
            wall_wood_threshold: 400.0,
            wall_stone_threshold: 100.0,
            wall_chance: 0.1,
            wall_min_radius: 150.0,
            wall_attempts: 5,
            wall_footprint: 5.0,
            wall_clearance: 15.0,
            wall_upgrade_stone: 300.0,
            towers_per_agents: 10,
            tower_min_walls: 4,
            footprint_radius: 15.0,
            clearance: 25.0,
            max_spiral_radius: 2000.0,
        }
    }
}

/// Construction prices. Upgrade prices are base prices, scaled by
/// `1.5^(level-1)` at the time of purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTable {
    pub house: Stockpile,
    pub storage: Stockpile,
    pub farm: Stockpile,
    pub tower: Stockpile,
    pub wall_wood: Stockpile,
    pub wall_stone: Stockpile,
    pub upgrade_house: Stockpile,
    pub upgrade_storage: Stockpile,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            house: Stockpile::of(&[(ResourceKind::Wood, 60.0), (ResourceKind::Stone, 10.0)]),
            storage: Stockpile::of(&[(ResourceKind::Wood, 150.0), (ResourceKind::Stone, 50.0)]),
            farm: Stockpile::of(&[(ResourceKind::Wood, 80.0), (ResourceKind::Stone, 20.0)]),
            tower: Stockpile::of(&[(ResourceKind::Stone, 150.0), (ResourceKind::Iron, 50.0)]),
            wall_wood: Stockpile::of(&[(ResourceKind::Wood, 15.0)]),
            wall_stone: Stockpile::of(&[(ResourceKind::Stone, 15.0)]),
            upgrade_house: Stockpile::of(&[
                (ResourceKind::Wood, 100.0),
                (ResourceKind::Stone, 50.0),
            ]),
            upgrade_storage: Stockpile::of(&[
                (ResourceKind::Wood, 150.0),
                (ResourceKind::Stone, 100.0),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub safety_food_buffer: f64,
    pub growth_per_tick: f64,
    pub spawn_cost: f64,
    pub mutation_rate: f64,
    pub resilience_nudge: f64,
    pub max_resilience: f64,
    pub milestone_every: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            safety_food_buffer: 150.0,
            growth_per_tick: 0.8,
            spawn_cost: 25.0,
            mutation_rate: 0.1,
            resilience_nudge: 0.025,
            max_resilience: 0.9,
            milestone_every: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisasterConfig {
    pub onset_chance: f64,
    pub end_chance: f64,
    pub wall_collapse_chance: f64,
}

impl Default for DisasterConfig {
    fn default() -> Self {
        Self {
            onset_chance: 0.00002,
            end_chance: 0.005,
            wall_collapse_chance: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeSeed {
    pub kind: ResourceKind,
    pub count: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub seeds: Vec<NodeSeed>,
    pub starting_stockpile: Stockpile,
    pub regen_chance: f64,
    pub respawn_chance: f64,
    pub respawn_amount: f64,
    pub gold_respawn_amount: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            seeds: vec![
                NodeSeed { kind: ResourceKind::Food, count: 8, amount: 2000.0 },
                NodeSeed { kind: ResourceKind::Wood, count: 6, amount: 5000.0 },
                NodeSeed { kind: ResourceKind::Stone, count: 5, amount: 5000.0 },
                NodeSeed { kind: ResourceKind::Iron, count: 3, amount: 3000.0 },
                NodeSeed { kind: ResourceKind::Gold, count: 2, amount: 1000.0 },
            ],
            starting_stockpile: Stockpile::of(&[
                (ResourceKind::Food, 50.0),
                (ResourceKind::Wood, 100.0),
            ]),
            regen_chance: 0.01,
            respawn_chance: 0.001,
            respawn_amount: 200.0,
            gold_respawn_amount: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoreConfig {
    pub capacity: usize,
    pub founding_entry: String,
}

impl Default for LoreConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            founding_entry: "The first fire is lit; the pioneers raise a settlement in the wilds."
                .to_string(),
        }
    }
}
