use std::collections::HashSet;

use crate::{
    components::AgentId,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::GameState,
};

/// End-of-tick cleanup that keeps the state within its bounds.
pub struct BookkeepingSystem;

impl BookkeepingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookkeepingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BookkeepingSystem {
    fn name(&self) -> &str {
        "bookkeeping"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, _rng: &mut SystemRng<'_>) {
        let cap = state.storage_cap(&ctx.config.economy.storage);
        state.resources.clamp_to(cap);

        for agent in &mut state.agents {
            agent.energy = agent.energy.clamp(0.0, agent.stats.stamina);
            if let Some(load) = agent.inventory.as_mut() {
                load.amount = load.amount.clamp(0.0, agent.stats.max_carry);
            }
            if agent.inventory.map(|load| load.amount <= 0.0).unwrap_or(false) {
                agent.inventory = None;
            }
        }

        let living: HashSet<AgentId> = state.agents.iter().map(|a| a.id).collect();
        for building in &mut state.buildings {
            if let Some(occupants) = building.occupants_mut() {
                occupants.retain(|id| living.contains(id));
            }
        }
        let houses: HashSet<_> = state
            .buildings
            .iter()
            .filter(|b| b.is_house())
            .map(|b| b.id)
            .collect();
        for agent in &mut state.agents {
            if agent.home.map(|id| !houses.contains(&id)).unwrap_or(false) {
                agent.home = None;
            }
        }

        for node in &mut state.nodes {
            node.amount = node.amount.clamp(0.0, node.max_amount.max(0.0));
        }

        state.population_peak = state.population_peak.max(state.population());
        state.lore.truncate(ctx.config.lore.capacity.max(1));
    }
}
