use std::collections::VecDeque;
use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector rotated `angle` radians from +x, scaled to `length`.
    pub fn from_angle(angle: f64, length: f64) -> Self {
        Self::new(angle.cos() * length, angle.sin() * length)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Vector2) -> f64 {
        (other - self).length()
    }

    /// Heading from `self` toward `other`.
    pub fn angle_to(self, other: Vector2) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[serde(alias = "FOOD")]
    Food,
    #[serde(alias = "WOOD")]
    Wood,
    #[serde(alias = "STONE")]
    Stone,
    #[serde(alias = "IRON")]
    Iron,
    #[serde(alias = "GOLD")]
    Gold,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Food,
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Iron,
        ResourceKind::Gold,
    ];

    pub fn index(self) -> usize {
        match self {
            ResourceKind::Food => 0,
            ResourceKind::Wood => 1,
            ResourceKind::Stone => 2,
            ResourceKind::Iron => 3,
            ResourceKind::Gold => 4,
        }
    }

    /// Extraction difficulty: harder materials yield less per gathering tick.
    pub fn gather_modifier(self) -> f64 {
        match self {
            ResourceKind::Food | ResourceKind::Wood => 1.0,
            ResourceKind::Stone => 0.8,
            ResourceKind::Iron => 0.6,
            ResourceKind::Gold => 0.4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Food => "food",
            ResourceKind::Wood => "wood",
            ResourceKind::Stone => "stone",
            ResourceKind::Iron => "iron",
            ResourceKind::Gold => "gold",
        }
    }
}

/// Quantities keyed by resource kind. Used both for the settlement stockpile
/// and for construction prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stockpile {
    #[serde(alias = "FOOD")]
    pub food: f64,
    #[serde(alias = "WOOD")]
    pub wood: f64,
    #[serde(alias = "STONE")]
    pub stone: f64,
    #[serde(alias = "IRON")]
    pub iron: f64,
    #[serde(alias = "GOLD")]
    pub gold: f64,
}

impl Stockpile {
    pub fn of(entries: &[(ResourceKind, f64)]) -> Self {
        let mut stock = Stockpile::default();
        for &(kind, amount) in entries {
            *stock.get_mut(kind) += amount;
        }
        stock
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Iron => self.iron,
            ResourceKind::Gold => self.gold,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut f64 {
        match kind {
            ResourceKind::Food => &mut self.food,
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
            ResourceKind::Iron => &mut self.iron,
            ResourceKind::Gold => &mut self.gold,
        }
    }

    pub fn can_afford(&self, cost: &Stockpile) -> bool {
        ResourceKind::ALL
            .iter()
            .all(|&kind| self.get(kind) >= cost.get(kind))
    }

    /// Deducts `cost` if affordable. Returns whether anything was spent.
    pub fn spend(&mut self, cost: &Stockpile) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for kind in ResourceKind::ALL {
            *self.get_mut(kind) -= cost.get(kind);
        }
        true
    }

    /// Prices rounded down after scaling.
    pub fn scaled(&self, factor: f64) -> Stockpile {
        let mut out = Stockpile::default();
        for kind in ResourceKind::ALL {
            *out.get_mut(kind) = (self.get(kind) * factor).floor();
        }
        out
    }

    pub fn clamp_to(&mut self, max: Option<f64>) {
        for kind in ResourceKind::ALL {
            let value = self.get_mut(kind);
            *value = value.max(0.0);
            if let Some(max) = max {
                *value = value.min(max);
            }
        }
    }

    pub fn max_value(&self) -> f64 {
        ResourceKind::ALL
            .iter()
            .map(|&kind| self.get(kind))
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub speed: f64,
    pub gathering_speed: f64,
    pub max_carry: f64,
    /// Ticks until death; `None` means the agent never ages out.
    pub lifespan: Option<u32>,
    pub resilience: f64,
    pub stamina: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            speed: 1.5,
            gathering_speed: 0.5,
            max_carry: 10.0,
            lifespan: None,
            resilience: 0.1,
            stamina: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(alias = "type")]
    pub kind: ResourceKind,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    #[default]
    Idle,
    MovingToResource,
    Gathering,
    Returning,
    MovingHome,
    Resting,
    Fleeing,
}

/// Display hue in degrees, inherited along a lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hue(pub u16);

impl fmt::Display for Hue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsl({}, 70%, 60%)", self.0 % 360)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub position: Vector2,
    #[serde(default)]
    pub target: Option<Vector2>,
    #[serde(default)]
    pub target_node: Option<NodeId>,
    #[serde(default)]
    pub path: VecDeque<Vector2>,
    pub state: AgentState,
    #[serde(default)]
    pub inventory: Option<Inventory>,
    pub stats: Stats,
    pub energy: f64,
    pub age: u64,
    pub generation: u32,
    pub color: Hue,
    #[serde(default)]
    pub home: Option<BuildingId>,
}

impl Agent {
    pub fn new(id: AgentId, position: Vector2, stats: Stats, generation: u32, color: Hue) -> Self {
        Self {
            id,
            position,
            target: None,
            target_node: None,
            path: VecDeque::new(),
            state: AgentState::Idle,
            inventory: None,
            energy: stats.stamina,
            stats,
            age: 0,
            generation,
            color,
            home: None,
        }
    }

    pub fn carried(&self) -> f64 {
        self.inventory.map(|inv| inv.amount).unwrap_or(0.0)
    }

    pub fn carry_room(&self) -> f64 {
        (self.stats.max_carry - self.carried()).max(0.0)
    }

    /// Switches state and drops the target, node and cached path.
    pub fn reset_to(&mut self, state: AgentState) {
        self.state = state;
        self.target = None;
        self.target_node = None;
        self.path.clear();
    }

    pub fn is_expired(&self) -> bool {
        self.stats
            .lifespan
            .map(|lifespan| self.age >= u64::from(lifespan))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildingKind {
    House {
        #[serde(default)]
        occupants: Vec<AgentId>,
    },
    Storage,
    Farm,
    Tower,
    Wall,
}

impl BuildingKind {
    pub fn house() -> Self {
        BuildingKind::House {
            occupants: Vec::new(),
        }
    }

    pub fn max_level(&self) -> u32 {
        match self {
            BuildingKind::House { .. } => 3,
            BuildingKind::Storage => 5,
            BuildingKind::Farm => 3,
            BuildingKind::Tower => 1,
            BuildingKind::Wall => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuildingKind::House { .. } => "house",
            BuildingKind::Storage => "storage",
            BuildingKind::Farm => "farm",
            BuildingKind::Tower => "tower",
            BuildingKind::Wall => "wall",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallTier {
    Wood,
    Stone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    #[serde(flatten)]
    pub kind: BuildingKind,
    pub position: Vector2,
    pub level: u32,
    #[serde(default)]
    pub last_upgraded: Option<u64>,
}

impl Building {
    pub fn new(id: BuildingId, kind: BuildingKind, position: Vector2) -> Self {
        Self {
            id,
            kind,
            position,
            level: 1,
            last_upgraded: None,
        }
    }

    pub fn is_house(&self) -> bool {
        matches!(self.kind, BuildingKind::House { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self.kind, BuildingKind::Storage)
    }

    pub fn is_farm(&self) -> bool {
        matches!(self.kind, BuildingKind::Farm)
    }

    pub fn is_wall(&self) -> bool {
        matches!(self.kind, BuildingKind::Wall)
    }

    pub fn is_tower(&self) -> bool {
        matches!(self.kind, BuildingKind::Tower)
    }

    /// Resident slots; only houses hold residents.
    pub fn capacity(&self, house_capacity: usize) -> usize {
        match self.kind {
            BuildingKind::House { .. } => house_capacity * self.level as usize,
            BuildingKind::Storage | BuildingKind::Farm | BuildingKind::Tower | BuildingKind::Wall => 0,
        }
    }

    pub fn occupants(&self) -> &[AgentId] {
        match &self.kind {
            BuildingKind::House { occupants } => occupants,
            _ => &[],
        }
    }

    pub fn occupants_mut(&mut self) -> Option<&mut Vec<AgentId>> {
        match &mut self.kind {
            BuildingKind::House { occupants } => Some(occupants),
            _ => None,
        }
    }

    pub fn has_vacancy(&self, house_capacity: usize) -> bool {
        self.occupants().len() < self.capacity(house_capacity)
    }

    /// Food yielded per production cycle.
    pub fn farm_output(&self, base: f64, per_level: f64) -> f64 {
        match self.kind {
            BuildingKind::Farm => base + f64::from(self.level.saturating_sub(1)) * per_level,
            BuildingKind::House { .. }
            | BuildingKind::Storage
            | BuildingKind::Tower
            | BuildingKind::Wall => 0.0,
        }
    }

    /// Per-resource capacity this building contributes under a capped policy.
    pub fn storage_capacity(&self, per_level: f64) -> f64 {
        match self.kind {
            BuildingKind::Storage => per_level * f64::from(self.level),
            BuildingKind::House { .. }
            | BuildingKind::Farm
            | BuildingKind::Tower
            | BuildingKind::Wall => 0.0,
        }
    }

    pub fn wall_tier(&self) -> Option<WallTier> {
        match self.kind {
            BuildingKind::Wall if self.level >= 2 => Some(WallTier::Stone),
            BuildingKind::Wall => Some(WallTier::Wood),
            _ => None,
        }
    }

    pub fn can_upgrade(&self) -> bool {
        self.level < self.kind.max_level()
    }

    pub fn upgrade(&mut self, now: u64) {
        if self.can_upgrade() {
            self.level += 1;
            self.last_upgraded = Some(now);
        }
    }

    pub fn recently_upgraded(&self, now: u64, window: u64) -> bool {
        self.last_upgraded
            .map(|at| now.saturating_sub(at) < window)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: NodeId,
    pub kind: ResourceKind,
    pub position: Vector2,
    pub amount: f64,
    pub max_amount: f64,
}

impl ResourceNode {
    pub fn is_depleted(&self) -> bool {
        self.amount <= 0.0
    }
}
