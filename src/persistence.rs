//! Save files and the load-time migration that fills in whatever an older
//! or foreign save left out.
//!
//! Loading never trusts the file: every field is optional on the way in and
//! [`migrate`] rebuilds a complete [`GameState`] from what is there.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::components::{
    Agent, AgentId, AgentState, Building, BuildingId, BuildingKind, Hue, Inventory, NodeId,
    ResourceKind, ResourceNode, Stats, Stockpile, Vector2,
};
use crate::config::SimulationConfig;
use crate::rng::RngManager;
use crate::spatial::Spatial;
use crate::systems::sanitize_stats;
use crate::terrain::TerrainGrid;
use crate::world::{DisasterKind, GameState, Needs};

/// Offline time beyond this is ignored.
pub const OFFLINE_LIMIT: Duration = Duration::from_secs(12 * 3600);
const OFFLINE_THRESHOLD_SECS: f64 = 60.0;
const OFFLINE_FOOD_PER_SEC: f64 = 0.5;
const OFFLINE_WOOD_PER_SEC: f64 = 0.2;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read save file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write save file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("save data is not valid JSON")]
    Malformed(#[from] serde_json::Error),
}

/// What goes to disk: the state plus the wall-clock time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveEnvelope {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub state: GameState,
}

impl SaveEnvelope {
    pub fn new(state: GameState, saved_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: saved_at.timestamp_millis(),
            state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSaveEnvelope {
    pub timestamp: Option<f64>,
    pub state: RawGameState,
}

impl RawSaveEnvelope {
    /// Wall time between the save and `now`; zero for missing or future stamps.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let Some(saved) = self.timestamp.filter(|t| t.is_finite()) else {
            return Duration::ZERO;
        };
        let diff = now.timestamp_millis() as f64 - saved;
        if diff > 0.0 {
            Duration::from_millis(diff as u64)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawColor {
    Hue(u16),
    Css(String),
}

impl RawColor {
    fn hue(&self) -> Option<Hue> {
        match self {
            RawColor::Hue(h) => Some(Hue(h % 360)),
            RawColor::Css(css) => {
                let inner = css.trim().strip_prefix("hsl(")?;
                let degrees = inner.split(',').next()?.trim().parse::<f64>().ok()?;
                Some(Hue(degrees.rem_euclid(360.0) as u16))
            }
        }
    }
}

/// A save as read from disk, with every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawGameState {
    resources: Option<Stockpile>,
    agents: Option<Vec<RawAgent>>,
    buildings: Option<Vec<RawBuilding>>,
    nodes: Option<Vec<RawNode>>,
    terrain: Option<Value>,
    #[serde(alias = "totalTime")]
    total_ticks: Option<f64>,
    #[serde(alias = "populationPeak")]
    population_peak: Option<f64>,
    #[serde(alias = "disasterType")]
    disaster: Option<Value>,
    lore: Option<Vec<String>>,
    #[serde(alias = "reproductionProgress")]
    reproduction_progress: Option<f64>,
    needs: Option<Needs>,
    next_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAgent {
    id: Option<RawId>,
    position: Option<Vector2>,
    target: Option<Vector2>,
    target_node: Option<RawId>,
    path: Option<Vec<Vector2>>,
    state: Option<Value>,
    inventory: Option<Value>,
    stats: Option<RawStats>,
    energy: Option<f64>,
    age: Option<f64>,
    #[serde(alias = "gen")]
    generation: Option<u32>,
    color: Option<RawColor>,
    #[serde(alias = "homeId")]
    home: Option<RawId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStats {
    speed: Option<f64>,
    #[serde(alias = "gatheringSpeed")]
    gathering_speed: Option<f64>,
    #[serde(alias = "maxCarry")]
    max_carry: Option<f64>,
    lifespan: Option<f64>,
    resilience: Option<f64>,
    stamina: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBuilding {
    id: Option<RawId>,
    #[serde(rename = "type")]
    kind: Option<String>,
    position: Option<Vector2>,
    level: Option<u32>,
    #[serde(alias = "lastLevelUpTime")]
    last_upgraded: Option<f64>,
    occupants: Option<Vec<RawId>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNode {
    id: Option<RawId>,
    #[serde(alias = "type")]
    kind: Option<Value>,
    position: Option<Vector2>,
    amount: Option<f64>,
    #[serde(alias = "maxAmount")]
    max_amount: Option<f64>,
}

impl RawGameState {
    /// First id guaranteed unused by any numeric id in the save.
    fn id_floor(&self) -> u64 {
        let numeric = |id: &Option<RawId>| match id {
            Some(RawId::Number(n)) => Some(*n),
            _ => None,
        };
        let agents = self.agents.iter().flatten().filter_map(|a| numeric(&a.id));
        let buildings = self.buildings.iter().flatten().filter_map(|b| numeric(&b.id));
        let nodes = self.nodes.iter().flatten().filter_map(|n| numeric(&n.id));
        let highest = agents.chain(buildings).chain(nodes).max();
        let floor = highest.map(|n| n.saturating_add(1)).unwrap_or(0);
        floor.max(self.next_id.unwrap_or(0))
    }
}

/// Keeps numeric ids and hands string ids fresh numbers above every numeric one.
struct IdMap {
    known: HashMap<String, u64>,
    next: u64,
}

impl IdMap {
    fn new(floor: u64) -> Self {
        Self {
            known: HashMap::new(),
            next: floor,
        }
    }

    fn fresh(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    fn resolve(&mut self, raw: &RawId) -> u64 {
        match raw {
            RawId::Number(n) => *n,
            RawId::Text(text) => {
                if let Some(&id) = self.known.get(text) {
                    return id;
                }
                let id = self.fresh();
                self.known.insert(text.clone(), id);
                id
            }
        }
    }

    fn resolve_or_fresh(&mut self, raw: Option<&RawId>) -> u64 {
        match raw {
            Some(raw) => self.resolve(raw),
            None => self.fresh(),
        }
    }
}

fn lenient<T: DeserializeOwned>(value: Option<Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v).ok())
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| v.max(0.0))
}

fn building_kind(tag: &str) -> Option<BuildingKind> {
    match tag.to_ascii_uppercase().as_str() {
        "HOUSE" => Some(BuildingKind::house()),
        "STORAGE" => Some(BuildingKind::Storage),
        "FARM" => Some(BuildingKind::Farm),
        "TOWER" => Some(BuildingKind::Tower),
        "WALL" => Some(BuildingKind::Wall),
        _ => None,
    }
}

/// Rebuilds a complete state from a raw save.
///
/// Terrain that is missing or sized for a different world is regenerated.
/// Unknown building types are dropped, unknown agent states become idle, and
/// residence links are reconciled so houses and agents agree.
pub fn migrate(raw: RawGameState, config: &SimulationConfig, rng: &mut RngManager) -> GameState {
    let mut ids = IdMap::new(raw.id_floor());
    let (width, height) = (config.world.grid_width(), config.world.grid_height());

    let terrain = lenient::<TerrainGrid>(raw.terrain)
        .filter(|grid| grid.matches(width, height))
        .unwrap_or_else(|| {
            tracing::info!(width, height, "save terrain missing or mismatched, regenerating");
            TerrainGrid::generate(width, height, &config.terrain, &mut rng.stream("terrain"))
        });
    let mut migration_rng = rng.stream("migration");
    let spatial = Spatial::new(&terrain, config);

    let mut buildings = Vec::new();
    let mut resident_refs: Vec<(BuildingId, Vec<RawId>)> = Vec::new();
    for raw_building in raw.buildings.unwrap_or_default() {
        let tag = raw_building.kind.as_deref().unwrap_or_default();
        let Some(kind) = building_kind(tag) else {
            tracing::warn!(kind = tag, "dropping building of unknown type from save");
            continue;
        };
        let id = BuildingId(ids.resolve_or_fresh(raw_building.id.as_ref()));
        let position = raw_building.position.unwrap_or_else(|| spatial.world_center());
        let mut building = Building::new(id, kind, position);
        building.level = raw_building
            .level
            .unwrap_or(1)
            .clamp(1, building.kind.max_level());
        building.last_upgraded = non_negative(raw_building.last_upgraded).map(|t| t as u64);
        if let Some(occupants) = raw_building.occupants {
            resident_refs.push((id, occupants));
        }
        buildings.push(building);
    }

    let mut nodes = Vec::new();
    for raw_node in raw.nodes.unwrap_or_default() {
        let Some(kind) = lenient::<ResourceKind>(raw_node.kind) else {
            continue;
        };
        let amount = non_negative(raw_node.amount).unwrap_or(0.0);
        let refill = match kind {
            ResourceKind::Gold => config.resources.gold_respawn_amount,
            _ => config.resources.respawn_amount,
        };
        let max_amount = non_negative(raw_node.max_amount)
            .filter(|max| *max > 0.0)
            .unwrap_or(refill)
            .max(amount);
        let position = raw_node
            .position
            .unwrap_or_else(|| spatial.find_spawn_position(kind, &mut migration_rng));
        nodes.push(ResourceNode {
            id: NodeId(ids.resolve_or_fresh(raw_node.id.as_ref())),
            kind,
            position,
            amount,
            max_amount,
        });
    }

    let center = buildings
        .iter()
        .find(|b| b.is_storage())
        .or_else(|| buildings.first())
        .map(|b| b.position)
        .unwrap_or_else(|| spatial.world_center());
    let founder = Stats {
        lifespan: config.agents.lifespan_ticks,
        ..config.agents.base_stats
    };

    let mut agents = Vec::new();
    for raw_agent in raw.agents.unwrap_or_default() {
        let stats = raw_agent
            .stats
            .map(|s| {
                let read = Stats {
                    speed: s.speed.unwrap_or(founder.speed),
                    gathering_speed: s.gathering_speed.unwrap_or(founder.gathering_speed),
                    max_carry: s.max_carry.unwrap_or(founder.max_carry),
                    lifespan: s
                        .lifespan
                        .filter(|v| v.is_finite() && *v > 0.0)
                        .map(|v| v.round().min(f64::from(u32::MAX)) as u32),
                    resilience: s.resilience.unwrap_or(founder.resilience),
                    stamina: s.stamina.unwrap_or(founder.stamina),
                };
                sanitize_stats(read, &founder, &config.population)
            })
            .unwrap_or(founder);
        let color = raw_agent
            .color
            .as_ref()
            .and_then(RawColor::hue)
            .unwrap_or_else(|| Hue(migration_rng.gen_range(0..360)));

        let id = AgentId(ids.resolve_or_fresh(raw_agent.id.as_ref()));
        let position = raw_agent.position.unwrap_or(center);
        let mut agent = Agent::new(id, position, stats, raw_agent.generation.unwrap_or(1).max(1), color);
        agent.state = lenient::<AgentState>(raw_agent.state).unwrap_or_default();
        agent.target = raw_agent.target;
        agent.target_node = raw_agent.target_node.as_ref().map(|r| NodeId(ids.resolve(r)));
        agent.path = raw_agent.path.unwrap_or_default().into();
        agent.inventory = lenient::<Inventory>(raw_agent.inventory)
            .filter(|inv| inv.amount.is_finite() && inv.amount > 0.0)
            .map(|inv| Inventory {
                amount: inv.amount.min(stats.max_carry),
                ..inv
            });
        agent.energy = raw_agent
            .energy
            .filter(|e| e.is_finite())
            .unwrap_or(stats.stamina)
            .clamp(0.0, stats.stamina.max(0.0));
        agent.age = non_negative(raw_agent.age).unwrap_or(0.0) as u64;
        agent.home = raw_agent.home.as_ref().map(|r| BuildingId(ids.resolve(r)));
        agents.push(agent);
    }

    for (house_id, refs) in resident_refs {
        let residents: Vec<AgentId> = refs.iter().map(|r| AgentId(ids.resolve(r))).collect();
        if let Some(house) = buildings.iter_mut().find(|b| b.id == house_id) {
            if let Some(occupants) = house.occupants_mut() {
                *occupants = residents;
            }
        }
    }

    let resources = {
        let mut stock = raw.resources.unwrap_or(config.resources.starting_stockpile);
        stock.clamp_to(None);
        stock
    };
    let population = agents.len();
    let mut lore = raw
        .lore
        .unwrap_or_else(|| vec![config.lore.founding_entry.clone()]);
    lore.truncate(config.lore.capacity.max(1));

    let mut state = GameState {
        resources,
        agents,
        buildings,
        nodes,
        terrain,
        total_ticks: non_negative(raw.total_ticks).unwrap_or(0.0) as u64,
        population_peak: (non_negative(raw.population_peak).unwrap_or(0.0) as usize).max(population),
        disaster: lenient::<DisasterKind>(raw.disaster),
        lore,
        reproduction_progress: non_negative(raw.reproduction_progress).unwrap_or(0.0),
        needs: raw.needs.unwrap_or_default(),
        next_id: 0,
    };
    state.next_id = ids.next;
    reconcile_homes(&mut state);
    state
}

/// Makes house occupant lists and agent `home` links describe the same thing.
/// An agent's own link wins; a house listing is used when the agent has none.
/// Listed order is kept.
fn reconcile_homes(state: &mut GameState) {
    let GameState {
        agents, buildings, ..
    } = state;
    let houses: HashSet<BuildingId> = buildings.iter().filter(|b| b.is_house()).map(|b| b.id).collect();

    for agent in agents.iter_mut() {
        let listed = buildings
            .iter()
            .find(|b| b.is_house() && b.occupants().contains(&agent.id))
            .map(|b| b.id);
        agent.home = agent.home.filter(|id| houses.contains(id)).or(listed);
    }
    for building in buildings.iter_mut() {
        let id = building.id;
        let Some(occupants) = building.occupants_mut() else {
            continue;
        };
        let mut seen = HashSet::new();
        occupants.retain(|resident| {
            seen.insert(*resident)
                && agents
                    .iter()
                    .any(|a| a.id == *resident && a.home == Some(id))
        });
        for agent in agents.iter().filter(|a| a.home == Some(id)) {
            if !occupants.contains(&agent.id) {
                occupants.push(agent.id);
            }
        }
    }
}

/// Credits food and wood for time spent away. Returns whether anything was
/// applied; short absences are ignored and stockpiles never shrink.
pub fn apply_offline_progress(state: &mut GameState, elapsed: Duration, config: &SimulationConfig) -> bool {
    let seconds = elapsed.min(OFFLINE_LIMIT).as_secs_f64();
    if seconds <= OFFLINE_THRESHOLD_SECS {
        return false;
    }
    let ceiling = state.max_storage(&config.economy.storage);
    credit(&mut state.resources.food, seconds * OFFLINE_FOOD_PER_SEC, ceiling);
    credit(&mut state.resources.wood, seconds * OFFLINE_WOOD_PER_SEC, ceiling);
    state.push_lore(
        format!(
            "While the settlement slept, {} moments slipped by.",
            seconds.floor() as u64
        ),
        config.lore.capacity,
    );
    tracing::info!(seconds, "applied offline progress");
    true
}

fn credit(slot: &mut f64, gain: f64, ceiling: f64) {
    *slot = slot.max((*slot + gain).min(ceiling));
}

pub fn parse_save(json: &str) -> Result<RawSaveEnvelope, PersistenceError> {
    Ok(serde_json::from_str(json)?)
}

/// Migrates a parsed save and applies offline progress up to `now`.
pub fn restore(
    envelope: RawSaveEnvelope,
    config: &SimulationConfig,
    rng: &mut RngManager,
    now: DateTime<Utc>,
) -> GameState {
    let elapsed = envelope.elapsed(now);
    let mut state = migrate(envelope.state, config, rng);
    apply_offline_progress(&mut state, elapsed, config);
    state
}

pub fn load_from_path(
    path: impl AsRef<Path>,
    config: &SimulationConfig,
    rng: &mut RngManager,
    now: DateTime<Utc>,
) -> Result<GameState, PersistenceError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let envelope = parse_save(&json)?;
    Ok(restore(envelope, config, rng, now))
}

pub fn save_to_path(
    path: impl AsRef<Path>,
    state: &GameState,
    saved_at: DateTime<Utc>,
) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let envelope = SaveEnvelope::new(state.clone(), saved_at);
    let json = serde_json::to_string(&envelope)?;
    fs::write(path, json).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_save() -> Value {
        json!({
            "timestamp": 1_000_000.0,
            "state": {
                "resources": { "FOOD": 120.0, "WOOD": -5.0, "STONE": 30.0 },
                "agents": [
                    {
                        "id": "agent-a",
                        "position": { "x": 400.0, "y": 300.0 },
                        "state": "BUILDING",
                        "inventory": { "type": "WOOD", "amount": 40.0 },
                        "stats": { "speed": 2.0, "gatheringSpeed": 0.7, "maxCarry": 12.0,
                                   "lifespan": 3000, "resilience": 0.2, "stamina": 900.0 },
                        "energy": 5000.0,
                        "age": 12,
                        "gen": 3,
                        "color": "hsl(210, 70%, 60%)",
                        "homeId": "house-1"
                    },
                    { "id": "agent-b", "state": "RESTING" }
                ],
                "buildings": [
                    { "id": "store", "type": "STORAGE", "position": { "x": 410.0, "y": 310.0 }, "level": 2 },
                    { "id": "house-1", "type": "HOUSE", "position": { "x": 450.0, "y": 310.0 },
                      "level": 1, "occupants": ["agent-a", "agent-b", "ghost"] },
                    { "id": "monument", "type": "MONUMENT", "position": { "x": 0.0, "y": 0.0 }, "level": 1 }
                ],
                "nodes": [
                    { "id": "n1", "type": "GOLD", "position": { "x": 10.0, "y": 10.0 },
                      "amount": 40.0, "maxAmount": 1000.0 }
                ],
                "totalTime": 5400,
                "populationPeak": 1,
                "disasterActive": true,
                "disasterType": "BLIZZARD",
                "lore": ["old tale"],
                "reproductionProgress": 12.5
            }
        })
    }

    #[test]
    fn legacy_save_migrates_into_complete_state() {
        let config = SimulationConfig::default();
        let mut rng = RngManager::new(3);
        let raw: RawSaveEnvelope = serde_json::from_value(legacy_save()).unwrap();
        let state = migrate(raw.state, &config, &mut rng);

        assert!(state.terrain.matches(80, 60));
        assert_eq!(state.resources.food, 120.0);
        assert_eq!(state.resources.wood, 0.0);
        assert_eq!(state.buildings.len(), 2, "monument is dropped");
        assert_eq!(state.buildings[0].level, 2);
        assert_eq!(state.total_ticks, 5400);
        assert_eq!(state.population_peak, 2);
        assert_eq!(state.disaster, Some(DisasterKind::Blizzard));
        assert_eq!(state.reproduction_progress, 12.5);

        let a = &state.agents[0];
        assert_eq!(a.state, AgentState::Idle);
        assert_eq!(a.generation, 3);
        assert_eq!(a.color, Hue(210));
        assert_eq!(a.energy, 900.0);
        assert_eq!(a.stats.lifespan, Some(3000));
        assert_eq!(a.carried(), 12.0);
        assert_eq!(a.home, Some(state.buildings[1].id));

        let b = &state.agents[1];
        assert_eq!(b.state, AgentState::Resting);
        assert_eq!(b.stats, Stats::default());
        assert_eq!(b.home, Some(state.buildings[1].id), "house listing fills a missing link");
        assert_eq!(state.buildings[1].occupants(), &[a.id, b.id]);

        let mut seen = HashSet::new();
        let all_ids = state
            .agents
            .iter()
            .map(|x| x.id.0)
            .chain(state.buildings.iter().map(|x| x.id.0))
            .chain(state.nodes.iter().map(|x| x.id.0));
        for id in all_ids {
            assert!(seen.insert(id), "id {id} reused");
            assert!(id < state.next_id);
        }
    }

    #[test]
    fn empty_save_still_yields_a_world() {
        let config = SimulationConfig::default();
        let mut rng = RngManager::new(4);
        let raw = parse_save("{}").unwrap();
        let state = migrate(raw.state, &config, &mut rng);
        assert!(state.agents.is_empty());
        assert_eq!(state.resources, config.resources.starting_stockpile);
        assert_eq!(state.lore, vec![config.lore.founding_entry.clone()]);
    }

    #[test]
    fn hostile_stats_are_repaired_on_load() {
        let config = SimulationConfig::default();
        let mut rng = RngManager::new(6);
        let raw = parse_save(
            r#"{"state":{"agents":[
                {"id":"a","stats":{"stamina":-5.0,"maxCarry":-1.0,"speed":0.0,"resilience":7.0,"lifespan":3},
                 "energy":10.0,"inventory":{"type":"FOOD","amount":50.0}}
            ]}}"#,
        )
        .unwrap();
        let state = migrate(raw.state, &config, &mut rng);
        let agent = &state.agents[0];

        assert_eq!(agent.stats.stamina, 500.0);
        assert_eq!(agent.stats.max_carry, 5.0);
        assert_eq!(agent.stats.speed, 0.5);
        assert_eq!(agent.stats.resilience, config.population.max_resilience);
        assert_eq!(agent.stats.lifespan, Some(500));
        assert_eq!(agent.energy, 10.0);
        assert_eq!(agent.carried(), 5.0);
    }

    #[test]
    fn nodes_without_capacity_get_a_refill_amount() {
        let config = SimulationConfig::default();
        let mut rng = RngManager::new(7);
        let raw = parse_save(
            r#"{"state":{"nodes":[
                {"id":"g","type":"GOLD","amount":0.0},
                {"id":"w","type":"WOOD","amount":0.0,"maxAmount":0.0}
            ]}}"#,
        )
        .unwrap();
        let state = migrate(raw.state, &config, &mut rng);
        assert_eq!(state.nodes[0].max_amount, config.resources.gold_respawn_amount);
        assert_eq!(state.nodes[1].max_amount, config.resources.respawn_amount);
    }

    #[test]
    fn offline_progress_is_capped_and_never_reduces() {
        let config = SimulationConfig::default();
        let mut rng = RngManager::new(5);
        let mut state = GameState::initialize(&config, &mut rng);
        state.resources.food = 100.0;
        state.resources.wood = 2500.0;

        assert!(!apply_offline_progress(&mut state, Duration::from_secs(60), &config));
        assert_eq!(state.resources.food, 100.0);

        assert!(apply_offline_progress(&mut state, Duration::from_secs(600), &config));
        assert_eq!(state.resources.food, 400.0);
        assert_eq!(state.resources.wood, 2500.0);
        assert!(state.lore[0].contains("600"));

        state.resources.food = 0.0;
        apply_offline_progress(&mut state, Duration::from_secs(48 * 3600), &config);
        assert_eq!(state.resources.food, 2000.0);
        assert!(state.lore[0].contains(&(12 * 3600).to_string()));
    }

    #[test]
    fn elapsed_ignores_future_stamps() {
        let now = DateTime::<Utc>::from_timestamp_millis(10_000).unwrap();
        let envelope = RawSaveEnvelope {
            timestamp: Some(20_000.0),
            state: RawGameState::default(),
        };
        assert_eq!(envelope.elapsed(now), Duration::ZERO);
        let envelope = RawSaveEnvelope {
            timestamp: Some(4_000.0),
            state: RawGameState::default(),
        };
        assert_eq!(envelope.elapsed(now), Duration::from_secs(6));
    }
}
