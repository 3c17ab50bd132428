//! Grid A* for agent travel.
//!
//! The search is bounded: it gives up after a fixed number of expansions and
//! hands back a straight line to the goal instead. Long trips skip the search
//! entirely, and movement's sliding collision handles whatever is in the way.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f64::consts::SQRT_2;

use crate::components::Vector2;
use crate::spatial::{GridPos, Spatial};

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    cell: GridPos,
    f_cost: f64,
    g_cost: f64,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties broken on cell for a stable order.
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Waypoints from `start` toward `end`, oldest first, excluding the start
/// cell. Never empty: trivial, distant or unreachable goals yield `[end]`.
pub fn find_path(spatial: &Spatial<'_>, start: Vector2, end: Vector2) -> Vec<Vector2> {
    let settings = &spatial.config().pathfinding;
    let start_cell = spatial.cell_of(start);
    let end_cell = spatial.cell_of(end);

    if start_cell.chebyshev(end_cell) <= 1 || start.distance(end) > settings.direct_cutoff {
        return vec![end];
    }

    let mut open = BinaryHeap::new();
    let mut closed: HashSet<GridPos> = HashSet::new();
    let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
    let mut g_scores: HashMap<GridPos, f64> = HashMap::new();

    g_scores.insert(start_cell, 0.0);
    open.push(OpenNode {
        cell: start_cell,
        f_cost: f64::from(start_cell.manhattan(end_cell)),
        g_cost: 0.0,
    });

    let mut iterations = 0;
    while let Some(current) = open.pop() {
        if iterations >= settings.max_iterations {
            break;
        }
        // Stale heap entries for cells already expanded via a cheaper route.
        if !closed.insert(current.cell) {
            continue;
        }
        iterations += 1;

        if current.cell.chebyshev(end_cell) <= 1 {
            return reconstruct(spatial, &came_from, current.cell);
        }

        for (neighbor, diagonal) in current.cell.neighbors() {
            if closed.contains(&neighbor) || !spatial.is_cell_passable(neighbor) {
                continue;
            }
            let step = if diagonal { SQRT_2 } else { 1.0 };
            let tentative = current.g_cost + step;
            let known = g_scores.get(&neighbor).copied().unwrap_or(f64::INFINITY);
            if tentative < known {
                came_from.insert(neighbor, current.cell);
                g_scores.insert(neighbor, tentative);
                open.push(OpenNode {
                    cell: neighbor,
                    f_cost: tentative + f64::from(neighbor.manhattan(end_cell)),
                    g_cost: tentative,
                });
            }
        }
    }

    vec![end]
}

fn reconstruct(
    spatial: &Spatial<'_>,
    came_from: &HashMap<GridPos, GridPos>,
    mut current: GridPos,
) -> Vec<Vector2> {
    let mut path = Vec::new();
    while let Some(&prev) = came_from.get(&current) {
        path.push(spatial.cell_center(current));
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::terrain::TerrainGrid;

    fn open_map(config: &SimulationConfig) -> TerrainGrid {
        TerrainGrid::filled(config.world.grid_width(), config.world.grid_height(), 0.45)
    }

    #[test]
    fn adjacent_and_distant_goals_go_direct() {
        let config = SimulationConfig::default();
        let terrain = open_map(&config);
        let spatial = Spatial::new(&terrain, &config);
        let start = Vector2::new(100.0, 100.0);
        let near = Vector2::new(125.0, 110.0);
        let far = Vector2::new(700.0, 100.0);
        assert_eq!(find_path(&spatial, start, near), vec![near]);
        assert_eq!(find_path(&spatial, start, far), vec![far]);
    }

    #[test]
    fn path_ends_next_to_goal_and_skips_start_cell() {
        let config = SimulationConfig::default();
        let terrain = open_map(&config);
        let spatial = Spatial::new(&terrain, &config);
        let start = Vector2::new(110.0, 110.0);
        let end = Vector2::new(310.0, 110.0);
        let path = find_path(&spatial, start, end);
        assert!(!path.is_empty());
        assert_ne!(spatial.cell_of(path[0]), spatial.cell_of(start));
        let last = path[path.len() - 1];
        assert!(spatial.cell_of(last).chebyshev(spatial.cell_of(end)) <= 1);
    }

    #[test]
    fn routes_around_a_wall_of_water() {
        let config = SimulationConfig::default();
        let mut terrain = open_map(&config);
        for y in 0..12 {
            terrain.set(10, y, 0.1);
        }
        let spatial = Spatial::new(&terrain, &config);
        let start = Vector2::new(110.0, 110.0);
        let end = Vector2::new(310.0, 110.0);
        let path = find_path(&spatial, start, end);
        assert!(path.len() > 1);
        assert!(path.iter().all(|p| spatial.is_passable(*p)));
        assert!(path.iter().any(|p| spatial.cell_of(*p).y >= 12));
    }

    #[test]
    fn unreachable_goal_falls_back_to_straight_line() {
        let config = SimulationConfig::default();
        let mut terrain = open_map(&config);
        for y in 0..terrain.height() {
            terrain.set(10, y, 0.1);
        }
        let spatial = Spatial::new(&terrain, &config);
        let end = Vector2::new(310.0, 110.0);
        assert_eq!(find_path(&spatial, Vector2::new(110.0, 110.0), end), vec![end]);
    }
}
