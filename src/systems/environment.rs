use crate::{
    components::ResourceKind,
    engine::{System, SystemContext},
    rng::{RngExt, SystemRng},
    spatial::Spatial,
    world::GameState,
};

/// Slow regrowth of partly harvested nodes and relocation of exhausted ones.
pub struct EnvironmentSystem;

impl EnvironmentSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvironmentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EnvironmentSystem {
    fn name(&self) -> &str {
        "environment"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng<'_>) {
        let settings = &ctx.config.resources;
        let calm = state.disaster.is_none();
        let spatial = Spatial::new(&state.terrain, ctx.config);

        for node in &mut state.nodes {
            if calm && node.amount < node.max_amount && rng.chance(settings.regen_chance) {
                node.amount = (node.amount + 1.0).min(node.max_amount);
            }
            if node.is_depleted() && rng.chance(settings.respawn_chance) {
                let fresh = match node.kind {
                    ResourceKind::Gold => settings.gold_respawn_amount,
                    _ => settings.respawn_amount,
                };
                node.amount = fresh.min(node.max_amount);
                node.position = spatial.find_spawn_position(node.kind, rng);
                tracing::trace!(node = node.id.0, kind = node.kind.label(), "node respawned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::rng::RngManager;
    use crate::world::DisasterKind;

    #[test]
    fn regrowth_is_capped_and_suppressed_by_disaster() {
        let mut config = SimulationConfig::default();
        config.resources.regen_chance = 1.0;
        let mut rng = RngManager::new(3);
        let mut state = GameState::initialize(&config, &mut rng);
        state.nodes[0].amount = state.nodes[0].max_amount - 0.5;
        state.nodes[1].amount = 10.0;
        let ctx = SystemContext { tick: 1, center: state.settlement_center(&config.world), config: &config };

        EnvironmentSystem::new().run(&ctx, &mut state, &mut rng.stream("environment"));
        assert_eq!(state.nodes[0].amount, state.nodes[0].max_amount);
        assert_eq!(state.nodes[1].amount, 11.0);

        state.disaster = Some(DisasterKind::Blizzard);
        EnvironmentSystem::new().run(&ctx, &mut state, &mut rng.stream("environment"));
        assert_eq!(state.nodes[1].amount, 11.0);
    }
}
