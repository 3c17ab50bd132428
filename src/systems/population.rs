use rand::Rng;

use crate::{
    components::{Agent, AgentId, Building, BuildingId, BuildingKind, Hue, Stats},
    config::{PopulationConfig, SimulationConfig},
    engine::{System, SystemContext},
    rng::{RngExt, SystemRng},
    spatial::Spatial,
    world::GameState,
};

const NEWBORN_HOUSE_RING: f64 = 40.0;
const MIN_SPEED: f64 = 0.5;
const MIN_GATHERING: f64 = 0.1;
const MIN_CARRY: f64 = 5.0;
const MIN_STAMINA: f64 = 500.0;
const MIN_LIFESPAN: f64 = 500.0;

/// Births funded by surplus food, old-age removal and the nomad floor.
pub struct PopulationSystem;

impl PopulationSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PopulationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for PopulationSystem {
    fn name(&self) -> &str {
        "population"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng<'_>) {
        let settings = &ctx.config.population;
        if state.resources.food > settings.safety_food_buffer {
            state.resources.food -= settings.growth_per_tick;
            state.reproduction_progress += settings.growth_per_tick;
        }
        if state.reproduction_progress >= settings.spawn_cost {
            state.reproduction_progress = 0.0;
            give_birth(ctx, state, rng);
        }

        retire_expired(ctx, state);
        enforce_floor(ctx, state, rng);
    }
}

/// Inherited stats: each numeric stat scaled by a factor drawn from
/// `[1 - rate, 1 + rate]` and floored, resilience nudged and clamped.
pub fn mutate_stats<R: Rng>(parent: &Stats, settings: &PopulationConfig, rng: &mut R) -> Stats {
    let rate = settings.mutation_rate.abs();
    let mut vary = |value: f64, floor: f64| {
        let factor = if rate > 0.0 { rng.gen_range(1.0 - rate..=1.0 + rate) } else { 1.0 };
        (value * factor).max(floor)
    };
    let speed = vary(parent.speed, MIN_SPEED);
    let gathering_speed = vary(parent.gathering_speed, MIN_GATHERING);
    let max_carry = vary(parent.max_carry, MIN_CARRY);
    let stamina = vary(parent.stamina, MIN_STAMINA);
    let lifespan = parent
        .lifespan
        .map(|ticks| vary(f64::from(ticks), MIN_LIFESPAN).round() as u32);
    let resilience = (parent.resilience + rng.spread(settings.resilience_nudge))
        .clamp(0.0, settings.max_resilience);

    Stats {
        speed,
        gathering_speed,
        max_carry,
        lifespan,
        resilience,
        stamina,
    }
}

/// Repairs stats read from outside the simulation. Non-finite fields take the
/// founder's value; the rest are held to the same floors births use, or to the
/// founder's own value when a scenario sets it lower.
pub(crate) fn sanitize_stats(raw: Stats, founder: &Stats, settings: &PopulationConfig) -> Stats {
    let floored = |value: f64, fallback: f64, floor: f64| {
        let value = if value.is_finite() { value } else { fallback };
        value.max(floor.min(fallback))
    };
    let lifespan_floor = founder
        .lifespan
        .map_or(MIN_LIFESPAN, |ticks| MIN_LIFESPAN.min(f64::from(ticks)))
        .max(1.0) as u32;
    let resilience = if raw.resilience.is_finite() { raw.resilience } else { founder.resilience };

    Stats {
        speed: floored(raw.speed, founder.speed, MIN_SPEED),
        gathering_speed: floored(raw.gathering_speed, founder.gathering_speed, MIN_GATHERING),
        max_carry: floored(raw.max_carry, founder.max_carry, MIN_CARRY),
        lifespan: raw.lifespan.map(|ticks| ticks.max(lifespan_floor)),
        resilience: resilience.clamp(0.0, settings.max_resilience.max(founder.resilience).max(0.0)),
        stamina: floored(raw.stamina, founder.stamina, MIN_STAMINA),
    }
}

fn founder_stats(config: &SimulationConfig) -> Stats {
    Stats {
        lifespan: config.agents.lifespan_ticks,
        ..config.agents.base_stats
    }
}

fn give_birth(ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng<'_>) {
    let config = ctx.config;
    let parent = if state.agents.is_empty() {
        None
    } else {
        Some(&state.agents[rng.gen_range(0..state.agents.len())])
    };
    let (stats, generation, color) = match parent {
        Some(parent) => (
            mutate_stats(&parent.stats, &config.population, rng),
            parent.generation + 1,
            parent.color,
        ),
        None => (founder_stats(config), 1, Hue(rng.gen_range(0..360))),
    };

    let id = AgentId(state.allocate_id());
    state
        .agents
        .push(Agent::new(id, ctx.center, stats, generation, color));

    let house_capacity = config.economy.house_capacity;
    if state.assign_home(id, house_capacity).is_none() {
        let spot = Spatial::new(&state.terrain, config).find_construction_spot(
            ctx.center,
            &state.buildings,
            NEWBORN_HOUSE_RING,
            rng,
        );
        let house_id = BuildingId(state.allocate_id());
        state
            .buildings
            .push(Building::new(house_id, BuildingKind::house(), spot));
        state.assign_home(id, house_capacity);
    }

    let population = state.population();
    state.population_peak = state.population_peak.max(population);
    tracing::debug!(tick = ctx.tick, agent = id.0, generation, "agent born");
    let every = config.population.milestone_every;
    if every > 0 && population % every == 0 {
        tracing::info!(tick = ctx.tick, population, "population milestone");
        state.push_lore(
            format!("The people now number {population}; new families take root."),
            config.lore.capacity,
        );
    }
}

/// Collects expired agents first, then removes them and their residences.
fn retire_expired(ctx: &SystemContext, state: &mut GameState) {
    let expired: Vec<AgentId> = state
        .agents
        .iter()
        .filter(|a| a.is_expired())
        .map(|a| a.id)
        .collect();
    if expired.is_empty() {
        return;
    }
    tracing::debug!(tick = ctx.tick, count = expired.len(), "agents died of old age");
    state.remove_agents(&expired);
}

fn enforce_floor(ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng<'_>) {
    let floor = ctx.config.agents.population_floor;
    while state.population() < floor {
        let id = AgentId(state.allocate_id());
        let nomad = Agent::new(
            id,
            ctx.center,
            founder_stats(ctx.config),
            1,
            Hue(rng.gen_range(0..360)),
        );
        tracing::info!(tick = ctx.tick, agent = id.0, "nomads join the settlement");
        state.agents.push(nomad);
    }
}
