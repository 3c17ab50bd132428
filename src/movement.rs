//! Agent stepping with sliding collision.

use rand::Rng;

use crate::components::{Agent, Vector2};
use crate::pathfinding::find_path;
use crate::spatial::Spatial;

const JITTER_ANGLE: f64 = 1.5;
const MIN_WAYPOINT_RADIUS: f64 = 5.0;

/// Advances `agent` up to `speed` units toward `target`.
///
/// A blocked step slides along X, then Y, then tries a sideways jitter at half
/// speed. The agent never ends up on an impassable position it was not
/// already standing on.
pub fn move_towards<R: Rng>(
    spatial: &Spatial<'_>,
    agent: &mut Agent,
    target: Vector2,
    speed: f64,
    rng: &mut R,
) {
    let here = agent.position;
    if here.distance(target) <= speed {
        if spatial.is_passable(target) {
            agent.position = target;
        }
        return;
    }

    let heading = here.angle_to(target);
    let next = here + Vector2::from_angle(heading, speed);
    if spatial.is_passable(next) {
        agent.position = next;
        return;
    }

    let slide_x = Vector2::new(next.x, here.y);
    if spatial.is_passable(slide_x) {
        agent.position = slide_x;
        return;
    }
    let slide_y = Vector2::new(here.x, next.y);
    if spatial.is_passable(slide_y) {
        agent.position = slide_y;
        return;
    }

    let turn = if rng.gen_bool(0.5) { JITTER_ANGLE } else { -JITTER_ANGLE };
    let jitter = here + Vector2::from_angle(heading + turn, speed * 0.5);
    if spatial.is_passable(jitter) {
        agent.position = jitter;
    }
}

/// Moves along the cached path toward `target`, planning one on demand.
pub fn follow_path<R: Rng>(
    spatial: &Spatial<'_>,
    agent: &mut Agent,
    target: Vector2,
    speed: f64,
    rng: &mut R,
) {
    if agent.path.is_empty() {
        if agent.position.distance(target) > spatial.tile_size() {
            agent.path = find_path(spatial, agent.position, target).into();
        } else {
            agent.path.push_back(target);
        }
    }

    let Some(&waypoint) = agent.path.front() else {
        move_towards(spatial, agent, target, speed, rng);
        return;
    };
    move_towards(spatial, agent, waypoint, speed, rng);
    if agent.position.distance(waypoint) < MIN_WAYPOINT_RADIUS.max(speed * 1.5) {
        agent.path.pop_front();
    }
}
