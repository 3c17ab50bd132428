use rand::Rng;

use crate::{
    engine::{System, SystemContext},
    rng::{RngExt, SystemRng},
    world::{DisasterKind, GameState},
};

/// Toggles earthquakes and blizzards, and lets earthquakes topple walls.
pub struct DisasterSystem;

impl DisasterSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DisasterSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DisasterSystem {
    fn name(&self) -> &str {
        "disaster"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng<'_>) {
        let settings = &ctx.config.disaster;
        let lore_capacity = ctx.config.lore.capacity;

        match state.disaster {
            None => {
                if rng.chance(settings.onset_chance) {
                    let kind = if rng.gen_bool(0.5) {
                        DisasterKind::Earthquake
                    } else {
                        DisasterKind::Blizzard
                    };
                    state.disaster = Some(kind);
                    tracing::info!(tick = ctx.tick, kind = kind.label(), "disaster struck");
                    state.push_lore(format!("Alarm: a {} is upon us!", kind.label()), lore_capacity);
                }
            }
            Some(kind) => {
                if rng.chance(settings.end_chance) {
                    state.disaster = None;
                    tracing::info!(tick = ctx.tick, kind = kind.label(), "disaster ended");
                    state.push_lore(
                        format!("The {} passes and the settlers return to their work.", kind.label()),
                        lore_capacity,
                    );
                } else if kind == DisasterKind::Earthquake && rng.chance(settings.wall_collapse_chance) {
                    let walls: Vec<usize> = state
                        .buildings
                        .iter()
                        .enumerate()
                        .filter(|(_, b)| b.is_wall())
                        .map(|(idx, _)| idx)
                        .collect();
                    if !walls.is_empty() {
                        let victim = walls[rng.gen_range(0..walls.len())];
                        let wall = state.buildings.remove(victim);
                        tracing::debug!(tick = ctx.tick, wall = wall.id.0, "earthquake toppled a wall");
                    }
                }
            }
        }
    }
}
