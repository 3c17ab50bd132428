//! World-space queries over the terrain grid.

use std::f64::consts::TAU;

use rand::Rng;

use crate::components::{Building, ResourceKind, Vector2};
use crate::config::SimulationConfig;
use crate::rng::RngExt;
use crate::terrain::TerrainGrid;

/// Cell coordinate on the terrain grid. Signed so neighbours of edge cells
/// can be represented and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn chebyshev(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The 8 surrounding cells, paired with whether the step is diagonal.
    pub fn neighbors(self) -> impl Iterator<Item = (GridPos, bool)> {
        NEIGHBOR_OFFSETS
            .into_iter()
            .map(move |(dx, dy)| (GridPos::new(self.x + dx, self.y + dy), dx != 0 && dy != 0))
    }
}

pub struct Spatial<'a> {
    terrain: &'a TerrainGrid,
    config: &'a SimulationConfig,
}

impl<'a> Spatial<'a> {
    pub fn new(terrain: &'a TerrainGrid, config: &'a SimulationConfig) -> Self {
        Self { terrain, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        self.config
    }

    pub fn tile_size(&self) -> f64 {
        self.config.world.tile_size
    }

    pub fn world_center(&self) -> Vector2 {
        Vector2::new(self.config.world.width / 2.0, self.config.world.height / 2.0)
    }

    pub fn cell_of(&self, pos: Vector2) -> GridPos {
        let tile = self.tile_size();
        GridPos::new((pos.x / tile).floor() as i32, (pos.y / tile).floor() as i32)
    }

    pub fn cell_center(&self, cell: GridPos) -> Vector2 {
        let tile = self.tile_size();
        Vector2::new(
            f64::from(cell.x) * tile + tile / 2.0,
            f64::from(cell.y) * tile + tile / 2.0,
        )
    }

    pub fn in_world(&self, pos: Vector2) -> bool {
        pos.x >= 0.0
            && pos.y >= 0.0
            && pos.x < self.config.world.width
            && pos.y < self.config.world.height
    }

    fn cell_value(&self, cell: GridPos) -> Option<f64> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        self.terrain.get(cell.x as usize, cell.y as usize)
    }

    fn value_passable(&self, value: f64) -> bool {
        value > self.config.terrain.water && value < self.config.terrain.mountain
    }

    pub fn is_cell_passable(&self, cell: GridPos) -> bool {
        self.cell_value(cell)
            .map(|value| self.value_passable(value))
            .unwrap_or(false)
    }

    pub fn is_passable(&self, pos: Vector2) -> bool {
        self.in_world(pos) && self.is_cell_passable(self.cell_of(pos))
    }

    /// Center and the four footprint corners must all be passable.
    pub fn is_buildable(&self, pos: Vector2, radius: f64) -> bool {
        self.is_passable(pos)
            && [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)]
                .iter()
                .all(|&(sx, sy)| self.is_passable(pos + Vector2::new(sx * radius, sy * radius)))
    }

    fn prefers(&self, kind: ResourceKind, value: f64) -> bool {
        let bands = &self.config.terrain;
        match kind {
            ResourceKind::Food => value < bands.fertile_below,
            ResourceKind::Stone | ResourceKind::Iron => value > bands.rocky_above,
            ResourceKind::Gold => value > bands.gold_above,
            ResourceKind::Wood => true,
        }
    }

    /// Whether `pos` is a legal, biome-appropriate site for a `kind` node.
    pub fn suits(&self, kind: ResourceKind, pos: Vector2) -> bool {
        self.is_passable(pos)
            && self
                .cell_value(self.cell_of(pos))
                .map(|value| self.prefers(kind, value))
                .unwrap_or(false)
    }

    /// Random biome-appropriate position for a new `kind` node. Falls back to
    /// the last passable sample, then the last sample, once attempts run out.
    pub fn find_spawn_position<R: Rng>(&self, kind: ResourceKind, rng: &mut R) -> Vector2 {
        let tile = self.tile_size();
        let (width, height) = (self.terrain.width(), self.terrain.height());
        if width == 0 || height == 0 {
            return self.world_center();
        }
        let (lo_x, hi_x) = if width > 2 { (1, width - 1) } else { (0, width) };
        let (lo_y, hi_y) = if height > 2 { (1, height - 1) } else { (0, height) };

        let mut last_sample = self.world_center();
        let mut last_passable = None;
        for _ in 0..self.config.terrain.spawn_attempts.max(1) {
            let gx = rng.gen_range(lo_x..hi_x);
            let gy = rng.gen_range(lo_y..hi_y);
            let pos = Vector2::new(
                gx as f64 * tile + rng.gen::<f64>() * tile,
                gy as f64 * tile + rng.gen::<f64>() * tile,
            );
            last_sample = pos;
            let Some(value) = self.terrain.get(gx, gy) else {
                continue;
            };
            if !self.value_passable(value) || !self.in_world(pos) {
                continue;
            }
            if self.prefers(kind, value) {
                return pos;
            }
            last_passable = Some(pos);
        }
        last_passable.unwrap_or(last_sample)
    }

    /// Spiral outward from `center` until a buildable, uncrowded site turns up.
    /// Gives back `center` itself once the radius cap is exceeded.
    pub fn find_construction_spot<R: Rng>(
        &self,
        center: Vector2,
        buildings: &[Building],
        min_radius: f64,
        rng: &mut R,
    ) -> Vector2 {
        let economy = &self.config.economy;
        let margin = 50.0;
        let angle_step = 0.5;
        let radius_step = 20.0;
        let mut radius = min_radius.max(0.0);
        let mut angle = rng.angle();

        while radius < economy.max_spiral_radius {
            let candidate = center + Vector2::from_angle(angle, radius);
            let inside = candidate.x > margin
                && candidate.x < self.config.world.width - margin
                && candidate.y > margin
                && candidate.y < self.config.world.height - margin;
            if inside
                && self.is_buildable(candidate, economy.footprint_radius)
                && !buildings
                    .iter()
                    .any(|b| b.position.distance(candidate) < economy.clearance)
            {
                return candidate;
            }

            angle += angle_step;
            if angle > TAU + rng.gen::<f64>() * 2.0 {
                angle = 0.0;
                radius += radius_step;
            }
        }
        center
    }

    /// Buildable site closest to the world middle, searched on a spiral, then
    /// by scanning every cell. Falls back to the middle on fully blocked maps.
    pub fn find_settlement_center(&self) -> Vector2 {
        let middle = self.world_center();
        let footprint = 20.0;
        let mut radius = 0.0;
        let mut angle: f64 = 0.0;
        while radius < 800.0 {
            let candidate = middle + Vector2::from_angle(angle, radius);
            if self.is_buildable(candidate, footprint) {
                return candidate;
            }
            angle += 0.5;
            if angle > TAU {
                angle = 0.0;
                radius += 20.0;
            }
        }

        let mut best: Option<(f64, Vector2)> = None;
        for y in 0..self.terrain.height() as i32 {
            for x in 0..self.terrain.width() as i32 {
                let candidate = self.cell_center(GridPos::new(x, y));
                if !self.is_buildable(candidate, footprint) {
                    continue;
                }
                let dist = candidate.distance(middle);
                if best.map(|(d, _)| dist < d).unwrap_or(true) {
                    best = Some((dist, candidate));
                }
            }
        }
        best.map(|(_, pos)| pos).unwrap_or(middle)
    }
}
