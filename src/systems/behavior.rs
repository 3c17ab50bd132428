//! Per-agent state machine.
//!
//! Agents are stepped in collection order against the shared node list, so a
//! node drained by one agent is already drained for the next.

use rand::Rng;

use crate::{
    components::{Agent, AgentState, Building, Inventory, ResourceKind, ResourceNode, Stockpile, Vector2},
    config::{AgentConfig, SimulationConfig},
    engine::{System, SystemContext},
    movement::{follow_path, move_towards},
    rng::{RngExt, SystemRng},
    spatial::Spatial,
    world::{deposit_into, GameState, Needs},
};

const NEARBY_NODE_BONUS: f64 = 1.5;

pub struct BehaviorSystem;

impl BehaviorSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BehaviorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BehaviorSystem {
    fn name(&self) -> &str {
        "behavior"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng<'_>) {
        let storage_cap = state.storage_cap(&ctx.config.economy.storage);
        let disaster = state.disaster_active();
        let GameState {
            agents,
            buildings,
            nodes,
            terrain,
            resources,
            needs,
            ..
        } = state;

        let mut surroundings = Surroundings {
            spatial: Spatial::new(terrain, ctx.config),
            config: ctx.config,
            buildings,
            nodes,
            stockpile: resources,
            needs: *needs,
            disaster,
            center: ctx.center,
            storage_cap,
        };
        for agent in agents.iter_mut() {
            surroundings.step(agent, rng);
        }
    }
}

/// Everything an agent can see or touch during its turn.
struct Surroundings<'a> {
    spatial: Spatial<'a>,
    config: &'a SimulationConfig,
    buildings: &'a [Building],
    nodes: &'a mut [ResourceNode],
    stockpile: &'a mut Stockpile,
    needs: Needs,
    disaster: bool,
    center: Vector2,
    storage_cap: Option<f64>,
}

impl Surroundings<'_> {
    fn rules(&self) -> &AgentConfig {
        &self.config.agents
    }

    fn step<R: Rng>(&mut self, agent: &mut Agent, rng: &mut R) {
        let rules = self.rules();
        let drain = rules.energy_drain;
        let rest_threshold = rules.rest_threshold;

        agent.age += 1;
        if !matches!(agent.state, AgentState::Resting | AgentState::MovingHome) {
            agent.energy -= drain;
        }
        agent.energy = agent.energy.clamp(0.0, agent.stats.stamina);

        let exhausted = agent.energy < rest_threshold * agent.stats.stamina;
        if exhausted
            && !self.disaster
            && !matches!(agent.state, AgentState::Resting | AgentState::MovingHome)
        {
            let home = agent
                .home
                .and_then(|id| self.buildings.iter().find(|b| b.id == id))
                .map(|b| b.position)
                .unwrap_or(self.center);
            agent.reset_to(AgentState::MovingHome);
            agent.target = Some(home);
        }

        if self.disaster && rng.gen::<f64>() > agent.stats.resilience {
            agent.reset_to(AgentState::Fleeing);
        }

        match agent.state {
            AgentState::Idle => self.idle(agent, rng),
            AgentState::MovingToResource => self.approach(agent, rng),
            AgentState::Gathering => self.gather(agent),
            AgentState::Returning => self.deliver(agent, rng),
            AgentState::MovingHome => self.head_home(agent, rng),
            AgentState::Resting => self.rest(agent),
            AgentState::Fleeing => self.flee(agent, rng),
        }
    }

    fn idle<R: Rng>(&mut self, agent: &mut Agent, rng: &mut R) {
        if agent.carried() > 0.0 {
            agent.reset_to(AgentState::Returning);
            agent.target = Some(self.center);
            return;
        }

        let kind = self.pick_kind(agent.position, rng);
        let mut candidates: Vec<&ResourceNode> = self
            .nodes
            .iter()
            .filter(|n| n.kind == kind && !n.is_depleted())
            .collect();
        if candidates.is_empty() {
            let step = agent.position + Vector2::from_angle(rng.angle(), self.rules().wander_distance);
            if self.spatial.is_passable(step) {
                move_towards(&self.spatial, agent, step, agent.stats.speed, rng);
            }
            return;
        }

        let here = agent.position;
        candidates.sort_by(|a, b| {
            here.distance(a.position)
                .total_cmp(&here.distance(b.position))
        });
        let shortlist = candidates.len().min(self.rules().candidate_nodes.max(1));
        let chosen = candidates[rng.gen_range(0..shortlist)];
        let (node_id, node_pos) = (chosen.id, chosen.position);

        agent.reset_to(AgentState::MovingToResource);
        agent.target = Some(node_pos);
        agent.target_node = Some(node_id);
    }

    /// Weighted draw over resource kinds: published need, a bonus when a
    /// live node of that kind is close by, and per-agent noise.
    fn pick_kind<R: Rng>(&self, from: Vector2, rng: &mut R) -> ResourceKind {
        let radius = self.rules().nearby_node_radius;
        let weights: Vec<(ResourceKind, f64)> = ResourceKind::ALL
            .iter()
            .map(|&kind| {
                let mut weight = self.needs.get(kind).max(0.0);
                let nearby = self
                    .nodes
                    .iter()
                    .any(|n| n.kind == kind && !n.is_depleted() && n.position.distance(from) < radius);
                if nearby {
                    weight *= NEARBY_NODE_BONUS;
                }
                (kind, weight * rng.gen_range(0.8..1.2))
            })
            .collect();

        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return ResourceKind::Food;
        }
        let mut roll = rng.gen::<f64>() * total;
        for (kind, weight) in weights {
            roll -= weight;
            if roll <= 0.0 {
                return kind;
            }
        }
        ResourceKind::Food
    }

    fn approach<R: Rng>(&mut self, agent: &mut Agent, rng: &mut R) {
        let node = agent
            .target_node
            .and_then(|id| self.nodes.iter().find(|n| n.id == id))
            .filter(|n| !n.is_depleted())
            .map(|n| n.position);
        let Some(node_pos) = node else {
            agent.reset_to(AgentState::Idle);
            return;
        };
        agent.target = Some(node_pos);
        if agent.position.distance(node_pos) < self.rules().gather_radius {
            agent.state = AgentState::Gathering;
            agent.path.clear();
        } else {
            follow_path(&self.spatial, agent, node_pos, agent.stats.speed, rng);
        }
    }

    fn gather(&mut self, agent: &mut Agent) {
        let reach = self.rules().gather_reach;
        let here = agent.position;
        let carried_kind = agent.inventory.filter(|inv| inv.amount > 0.0).map(|inv| inv.kind);

        let targeted = agent.target_node.and_then(|id| {
            self.nodes
                .iter()
                .position(|n| n.id == id && n.position.distance(here) < reach)
        });
        let slot = targeted.or_else(|| {
            self.nodes
                .iter()
                .position(|n| !n.is_depleted() && n.position.distance(here) < reach)
        });

        let node = slot
            .map(|idx| &mut self.nodes[idx])
            .filter(|n| !n.is_depleted())
            .filter(|n| carried_kind.map(|kind| kind == n.kind).unwrap_or(true));
        let Some(node) = node else {
            let next = if carried_kind.is_some() {
                AgentState::Returning
            } else {
                AgentState::Idle
            };
            agent.reset_to(next);
            if next == AgentState::Returning {
                agent.target = Some(self.center);
            }
            return;
        };

        let take = (agent.stats.gathering_speed * node.kind.gather_modifier())
            .min(node.amount)
            .min(agent.carry_room());
        node.amount = (node.amount - take).max(0.0);
        let held = agent.carried() + take;
        agent.inventory = Some(Inventory {
            kind: node.kind,
            amount: held.min(agent.stats.max_carry),
        });

        if agent.carry_room() <= f64::EPSILON || node.is_depleted() {
            agent.reset_to(AgentState::Returning);
            agent.target = Some(self.center);
        }
    }

    fn deliver<R: Rng>(&mut self, agent: &mut Agent, rng: &mut R) {
        if agent.position.distance(self.center) < self.rules().deposit_radius {
            if let Some(load) = agent.inventory.take() {
                deposit_into(self.stockpile, load.kind, load.amount, self.storage_cap);
            }
            agent.reset_to(AgentState::Idle);
        } else {
            follow_path(&self.spatial, agent, self.center, agent.stats.speed, rng);
        }
    }

    fn head_home<R: Rng>(&mut self, agent: &mut Agent, rng: &mut R) {
        let Some(home) = agent.target else {
            agent.reset_to(AgentState::Idle);
            return;
        };
        if agent.position.distance(home) < self.rules().home_radius {
            agent.reset_to(AgentState::Resting);
        } else {
            follow_path(&self.spatial, agent, home, agent.stats.speed, rng);
        }
    }

    fn rest(&mut self, agent: &mut Agent) {
        agent.energy += self.rules().rest_recovery;
        if agent.energy >= agent.stats.stamina {
            agent.energy = agent.stats.stamina;
            agent.reset_to(AgentState::Idle);
        }
    }

    fn flee<R: Rng>(&mut self, agent: &mut Agent, rng: &mut R) {
        let rules = self.rules();
        if agent.position.distance(self.center) > rules.flee_arrival_radius {
            let speed = agent.stats.speed * rules.flee_speed_multiplier;
            follow_path(&self.spatial, agent, self.center, speed, rng);
        } else if !self.disaster {
            agent.reset_to(AgentState::Idle);
        }
    }
}
