use crate::{
    components::ResourceKind,
    config::SimulationConfig,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{GameState, Needs},
};

const FOOD_NEED_SCALE: f64 = 50.0;
const FOOD_NEED_CAP: f64 = 15.0;
const WOOD_STONE_CAP: f64 = 10.0;
const IRON_CAP: f64 = 8.0;
const GOLD_CAP: f64 = 5.0;

/// Publishes resource needs every tick and collects farm harvests.
pub struct EconomySystem;

impl EconomySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EconomySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EconomySystem {
    fn name(&self) -> &str {
        "economy"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, _rng: &mut SystemRng<'_>) {
        let economy = &ctx.config.economy;
        state.needs = compute_needs(state, ctx.config);

        if economy.farm_interval > 0 && ctx.tick % economy.farm_interval == 0 {
            let harvest: f64 = state
                .buildings
                .iter()
                .map(|b| b.farm_output(economy.farm_base_production, economy.farm_production_per_level))
                .sum();
            if harvest > 0.0 {
                state.deposit(ResourceKind::Food, harvest, &economy.storage);
                tracing::trace!(tick = ctx.tick, harvest, "farms harvested");
            }
        }
    }
}

/// Demand weights derived from the stockpile and the building mix.
///
/// Food need tracks the shortfall against a population-scaled goal. Wood and
/// stone rise when farms are scarce or storage is filling up; iron and gold
/// only matter once wood and stone are plentiful.
pub fn compute_needs(state: &GameState, config: &SimulationConfig) -> Needs {
    let economy = &config.economy;
    let stock = &state.resources;
    let population = state.population() as f64;

    let food_goal = population * economy.food_goal_per_agent + economy.food_goal_base;
    let food_shortfall = ((food_goal - stock.food) / FOOD_NEED_SCALE).max(0.0);

    let mut wood = 1.0;
    let mut stone = 0.5;
    let mut iron = 0.1;
    let mut gold = 0.05;

    if stock.food < food_goal && (state.farm_count() as f64) < population / 2.0 {
        wood += 5.0;
        stone += 2.0;
    }
    if stock.wood > 800.0 || stock.stone > 500.0 {
        wood += 3.0;
        stone += 3.0;
    }
    if stock.wood > 300.0 && stock.stone > 200.0 {
        iron += 2.0;
        gold += 1.0;
        stone += 1.0;
    }

    Needs {
        food: (food_shortfall * 2.0).min(FOOD_NEED_CAP),
        wood: f64::min(wood, WOOD_STONE_CAP),
        stone: f64::min(stone, WOOD_STONE_CAP),
        iron: f64::min(iron, IRON_CAP),
        gold: f64::min(gold, GOLD_CAP),
    }
}
