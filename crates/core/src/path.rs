//! Grid pathfinding for planners.
//!
//! Breadth-first search over cardinal steps; blocking terrain and solid
//! entities are impassable (the origin itself is exempt). Neighbor
//! expansion order is fixed, so equal-length paths resolve identically on
//! every run. The engine never calls this to validate a MOVE — declared
//! paths are validated step by step on their own.

use std::collections::{BTreeMap, VecDeque};

use crate::state::{EntityId, GameState, Position};

/// Fixed expansion order: north, east, south, west.
const NEIGHBOR_STEPS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Shortest cardinal path from `origin` to `goal`, excluding the origin and
/// including the goal. `None` when unreachable. `moving` is the entity the
/// path is planned for; it never blocks itself.
pub fn find_path(
    state: &GameState,
    origin: Position,
    goal: Position,
    moving: Option<&EntityId>,
) -> Option<Vec<Position>> {
    if origin == goal {
        return Some(Vec::new());
    }
    if !state.can_enter(&goal, moving) {
        return None;
    }

    bfs(state, origin, moving, |cell| cell == goal)
}

/// Shortest path ending on any cell adjacent (Chebyshev 1) to the target
/// entity. An attacker already adjacent gets an empty path.
pub fn find_path_to_adjacent(
    state: &GameState,
    attacker_id: &EntityId,
    target_id: &EntityId,
) -> Option<Vec<Position>> {
    let attacker = state.entity(attacker_id)?;
    let target = state.entity(target_id)?;

    if attacker.position.chebyshev(&target.position) == 1 {
        return Some(Vec::new());
    }

    let target_position = target.position;
    bfs(state, attacker.position, Some(attacker_id), |cell| {
        cell.chebyshev(&target_position) == 1
    })
}

fn bfs(
    state: &GameState,
    origin: Position,
    moving: Option<&EntityId>,
    is_goal: impl Fn(Position) -> bool,
) -> Option<Vec<Position>> {
    let mut came_from: BTreeMap<Position, Position> = BTreeMap::new();
    let mut frontier = VecDeque::new();
    frontier.push_back(origin);

    while let Some(current) = frontier.pop_front() {
        for (dx, dy) in NEIGHBOR_STEPS {
            let next = Position::new(current.x + dx, current.y + dy);
            if came_from.contains_key(&next) || next == origin {
                continue;
            }
            if !state.can_enter(&next, moving) {
                continue;
            }
            came_from.insert(next, current);
            if is_goal(next) {
                return Some(reconstruct(&came_from, origin, next));
            }
            frontier.push_back(next);
        }
    }
    None
}

fn reconstruct(
    came_from: &BTreeMap<Position, Position>,
    origin: Position,
    goal: Position,
) -> Vec<Position> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(previous) = came_from.get(&current) {
        if *previous == origin {
            break;
        }
        path.push(*previous);
        current = *previous;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        Entity, EntityKind, MapState, SizeClass, Stats, TerrainCell,
    };

    fn walker(id: &str, position: Position) -> Entity {
        Entity {
            id: EntityId::from(id),
            kind: EntityKind::Player,
            name: id.to_owned(),
            size: SizeClass::M,
            position,
            stats: Stats {
                hp_current: 10,
                hp_max: 10,
                ac: 10,
                movement_speed: 6,
                attack_bonus: None,
                damage_die: None,
            },
            conditions: Vec::new(),
            condition_durations: Default::default(),
            ability_cooldowns: Default::default(),
            resources: Default::default(),
            inventory: Vec::new(),
            ability_ids: Vec::new(),
            controller: None,
        }
    }

    fn state_10x10() -> GameState {
        let mut state = GameState::new(MapState::open(10, 10));
        state.entities.players.push(walker("pc", Position::new(0, 0)));
        state
    }

    #[test]
    fn straight_line_path() {
        let state = state_10x10();
        let path = find_path(
            &state,
            Position::new(0, 0),
            Position::new(3, 0),
            Some(&EntityId::from("pc")),
        )
        .unwrap();
        assert_eq!(
            path,
            vec![Position::new(1, 0), Position::new(2, 0), Position::new(3, 0)]
        );
    }

    #[test]
    fn routes_around_walls() {
        let mut state = state_10x10();
        for y in 0..3 {
            state.map.terrain.push(TerrainCell {
                x: 1,
                y,
                kind: "wall".to_owned(),
                blocks_movement: true,
                blocks_vision: true,
            });
        }
        let path = find_path(
            &state,
            Position::new(0, 0),
            Position::new(2, 0),
            Some(&EntityId::from("pc")),
        )
        .unwrap();
        // Must dip below the three-cell wall: 4 down, across, 4 up = 2 + 2*3.
        assert_eq!(path.len(), 8);
        assert_eq!(*path.last().unwrap(), Position::new(2, 0));
    }

    #[test]
    fn occupied_goal_is_unreachable() {
        let mut state = state_10x10();
        state.entities.players.push(walker("other", Position::new(3, 0)));
        assert!(
            find_path(
                &state,
                Position::new(0, 0),
                Position::new(3, 0),
                Some(&EntityId::from("pc")),
            )
            .is_none()
        );
    }

    #[test]
    fn adjacent_goal_stops_next_to_target() {
        let mut state = state_10x10();
        state.entities.npcs.push({
            let mut npc = walker("npc", Position::new(4, 4));
            npc.kind = EntityKind::Npc;
            npc
        });
        let path =
            find_path_to_adjacent(&state, &EntityId::from("pc"), &EntityId::from("npc")).unwrap();
        let last = *path.last().unwrap();
        assert_eq!(last.chebyshev(&Position::new(4, 4)), 1);
    }

    #[test]
    fn ties_resolve_identically_across_runs() {
        let state = state_10x10();
        let a = find_path(
            &state,
            Position::new(0, 0),
            Position::new(2, 2),
            Some(&EntityId::from("pc")),
        )
        .unwrap();
        let b = find_path(
            &state,
            Position::new(0, 0),
            Position::new(2, 2),
            Some(&EntityId::from("pc")),
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
