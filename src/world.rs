use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{
    Agent, AgentId, Building, BuildingId, BuildingKind, Hue, NodeId, ResourceKind, ResourceNode,
    Stats, Stockpile, Vector2,
};
use crate::config::{SimulationConfig, StoragePolicy, WorldConfig};
use crate::rng::{RngExt, RngManager};
use crate::spatial::Spatial;
use crate::terrain::TerrainGrid;

/// Storage ceiling reported to gauges when stockpiles are unbounded.
pub const UNBOUNDED_STORAGE_HINT: f64 = 2000.0;

const HOUSE_RING_RADIUS: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisasterKind {
    Earthquake,
    Blizzard,
}

impl DisasterKind {
    pub fn label(self) -> &'static str {
        match self {
            DisasterKind::Earthquake => "earthquake",
            DisasterKind::Blizzard => "blizzard",
        }
    }
}

/// Per-kind demand weights the settlement publishes to foragers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Needs {
    pub food: f64,
    pub wood: f64,
    pub stone: f64,
    pub iron: f64,
    pub gold: f64,
}

impl Needs {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Iron => self.iron,
            ResourceKind::Gold => self.gold,
        }
    }
}

/// The whole simulated world. Each tick produces a fresh value from the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub resources: Stockpile,
    pub agents: Vec<Agent>,
    pub buildings: Vec<Building>,
    pub nodes: Vec<ResourceNode>,
    pub terrain: TerrainGrid,
    pub total_ticks: u64,
    pub population_peak: usize,
    pub disaster: Option<DisasterKind>,
    /// Newest entry first.
    pub lore: Vec<String>,
    pub reproduction_progress: f64,
    pub needs: Needs,
    pub next_id: u64,
}

impl GameState {
    /// A fresh settlement: terrain, seeded nodes, one storage at a buildable
    /// center and the founding population, each with a house of their own.
    pub fn initialize(config: &SimulationConfig, rng: &mut RngManager) -> GameState {
        let terrain = TerrainGrid::generate(
            config.world.grid_width(),
            config.world.grid_height(),
            &config.terrain,
            &mut rng.stream("terrain"),
        );
        let mut world_rng = rng.stream("world");
        let spatial = Spatial::new(&terrain, config);
        let center = spatial.find_settlement_center();

        let mut next_id = 0;
        let mut allocate = || {
            let id = next_id;
            next_id += 1;
            id
        };

        let mut nodes = Vec::new();
        for seed in &config.resources.seeds {
            for _ in 0..seed.count {
                nodes.push(ResourceNode {
                    id: NodeId(allocate()),
                    kind: seed.kind,
                    position: spatial.find_spawn_position(seed.kind, &mut world_rng),
                    amount: seed.amount,
                    max_amount: seed.amount,
                });
            }
        }

        let mut buildings = vec![Building::new(
            BuildingId(allocate()),
            BuildingKind::Storage,
            center,
        )];

        let founders = config.agents.initial_population;
        let stats = Stats {
            lifespan: config.agents.lifespan_ticks,
            ..config.agents.base_stats
        };
        let mut agents = Vec::with_capacity(founders);
        for _ in 0..founders {
            let spot =
                spatial.find_construction_spot(center, &buildings, HOUSE_RING_RADIUS, &mut world_rng);
            let mut house = Building::new(BuildingId(allocate()), BuildingKind::house(), spot);

            let jittered = center + Vector2::new(world_rng.spread(10.0), world_rng.spread(10.0));
            let position = if spatial.is_passable(jittered) { jittered } else { center };
            let mut agent = Agent::new(
                AgentId(allocate()),
                position,
                stats,
                1,
                Hue(world_rng.gen_range(0..360)),
            );
            agent.home = Some(house.id);
            if let Some(occupants) = house.occupants_mut() {
                occupants.push(agent.id);
            }
            buildings.push(house);
            agents.push(agent);
        }

        GameState {
            resources: config.resources.starting_stockpile,
            agents,
            buildings,
            nodes,
            terrain,
            total_ticks: 0,
            population_peak: founders,
            disaster: None,
            lore: vec![config.lore.founding_entry.clone()],
            reproduction_progress: 0.0,
            needs: Needs::default(),
            next_id,
        }
    }

    pub fn population(&self) -> usize {
        self.agents.len()
    }

    pub fn disaster_active(&self) -> bool {
        self.disaster.is_some()
    }

    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// First storage, else the first building, else the world middle.
    pub fn settlement_center(&self, world: &WorldConfig) -> Vector2 {
        self.buildings
            .iter()
            .find(|b| b.is_storage())
            .or_else(|| self.buildings.first())
            .map(|b| b.position)
            .unwrap_or_else(|| Vector2::new(world.width / 2.0, world.height / 2.0))
    }

    /// Per-resource ceiling, or `None` when stockpiles grow without bound.
    pub fn storage_cap(&self, policy: &StoragePolicy) -> Option<f64> {
        match *policy {
            StoragePolicy::Unbounded => None,
            StoragePolicy::Capped { per_level } => {
                let total: f64 = self
                    .buildings
                    .iter()
                    .map(|b| b.storage_capacity(per_level))
                    .sum();
                Some(total.max(per_level))
            }
        }
    }

    /// Ceiling shown by gauges; unbounded stockpiles report a nominal value.
    pub fn max_storage(&self, policy: &StoragePolicy) -> f64 {
        self.storage_cap(policy).unwrap_or(UNBOUNDED_STORAGE_HINT)
    }

    /// Adds to the stockpile, clipping at the storage ceiling.
    pub fn deposit(&mut self, kind: ResourceKind, amount: f64, policy: &StoragePolicy) {
        let cap = self.storage_cap(policy);
        deposit_into(&mut self.resources, kind, amount, cap);
    }

    pub fn push_lore(&mut self, entry: impl Into<String>, capacity: usize) {
        self.lore.insert(0, entry.into());
        self.lore.truncate(capacity.max(1));
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn farm_count(&self) -> usize {
        self.buildings.iter().filter(|b| b.is_farm()).count()
    }

    pub fn wall_count(&self) -> usize {
        self.buildings.iter().filter(|b| b.is_wall()).count()
    }

    /// Agents without a house that still stands.
    pub fn homeless(&self) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|a| {
                a.home
                    .and_then(|id| self.building(id))
                    .map(|b| !b.is_house())
                    .unwrap_or(true)
            })
            .map(|a| a.id)
            .collect()
    }

    pub fn free_house_slots(&self, house_capacity: usize) -> usize {
        self.buildings
            .iter()
            .map(|b| b.capacity(house_capacity).saturating_sub(b.occupants().len()))
            .sum()
    }

    /// Moves `agent` into the first house with room. Returns the house, if any.
    pub fn assign_home(&mut self, agent: AgentId, house_capacity: usize) -> Option<BuildingId> {
        let house = self
            .buildings
            .iter_mut()
            .find(|b| b.has_vacancy(house_capacity))?;
        let house_id = house.id;
        if let Some(occupants) = house.occupants_mut() {
            occupants.push(agent);
        }
        if let Some(resident) = self.agents.iter_mut().find(|a| a.id == agent) {
            resident.home = Some(house_id);
        }
        Some(house_id)
    }

    /// Removes agents and their house registrations in one step.
    pub fn remove_agents(&mut self, doomed: &[AgentId]) {
        if doomed.is_empty() {
            return;
        }
        self.agents.retain(|a| !doomed.contains(&a.id));
        for building in &mut self.buildings {
            if let Some(occupants) = building.occupants_mut() {
                occupants.retain(|id| !doomed.contains(id));
            }
        }
    }
}

pub(crate) fn deposit_into(stock: &mut Stockpile, kind: ResourceKind, amount: f64, cap: Option<f64>) {
    let slot = stock.get_mut(kind);
    *slot = (*slot + amount).max(0.0);
    if let Some(cap) = cap {
        *slot = slot.min(cap);
    }
}
