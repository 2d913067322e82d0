//! MOVE resolution: step-by-step path validation and commitment.

use crate::event::{self, EngineEvent, EventSeq};
use crate::state::GameState;

use super::{ActionErrorCode, MoveAction, Rejection};

pub(super) fn resolve_move(
    state: &mut GameState,
    action: &MoveAction,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, Rejection> {
    let entity = state.entity(&action.entity_id).ok_or_else(|| {
        Rejection::new(
            ActionErrorCode::EntityUnknown,
            format!("entity '{}' does not exist", action.entity_id),
        )
    })?;
    if !entity.is_alive() {
        return Err(Rejection::new(
            ActionErrorCode::EntityDead,
            format!("entity '{}' is dead", action.entity_id),
        ));
    }
    super::turn::require_turn(state, &action.entity_id)?;

    if action.path.is_empty() {
        return Err(Rejection::new(
            ActionErrorCode::MovePathEmpty,
            "move path is empty",
        ));
    }

    let entity = state
        .entity(&action.entity_id)
        .expect("entity checked above");
    let from = entity.position;
    let speed = entity.stats.movement_speed;

    // Validate the declared path step by step, then the total budget.
    let mut previous = from;
    let mut cost: u32 = 0;
    for step in &action.path {
        if !step.is_cardinal_neighbor(&previous) {
            return Err(Rejection::new(
                ActionErrorCode::MovePathDiscontiguous,
                format!("step {step} is not a cardinal neighbor of {previous}"),
            ));
        }
        if !state.map.in_bounds(step) {
            return Err(Rejection::new(
                ActionErrorCode::MoveOutOfBounds,
                format!("step {step} is outside the map"),
            ));
        }
        if state.map.blocks_movement(step) {
            return Err(Rejection::new(
                ActionErrorCode::MoveBlocked,
                format!("step {step} is blocked by terrain"),
            ));
        }
        if state.solid_occupant(step, Some(&action.entity_id)).is_some() {
            return Err(Rejection::new(
                ActionErrorCode::MoveTileOccupied,
                format!("step {step} is occupied by another entity"),
            ));
        }
        cost += state.map.step_cost(step);
        previous = *step;
    }

    if cost > speed {
        return Err(Rejection::new(
            ActionErrorCode::MoveExceedsBudget,
            format!("path costs {cost} movement, speed is {speed}"),
        ));
    }

    let final_position = *action.path.last().expect("path checked non-empty");
    state
        .entity_mut(&action.entity_id)
        .expect("entity checked above")
        .position = final_position;

    let (id, timestamp) = seq.next();
    Ok(vec![EngineEvent::MoveApplied(event::MoveApplied {
        id,
        timestamp,
        entity_id: action.entity_id.clone(),
        from,
        path: action.path.clone(),
        final_position,
    })])
}
