//! DEFEND, SET_SEED, SPAWN, and REMOVE resolution.

use crate::condition;
use crate::event::{self, EngineEvent, EventSeq};
use crate::state::{GameState, RngState};

use super::{
    ActionErrorCode, DefendAction, Rejection, RemoveAction, SetSeedAction, SpawnAction,
};

pub(super) fn resolve_defend(
    state: &mut GameState,
    action: &DefendAction,
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

    let entity = state
        .entity_mut(&action.entity_id)
        .expect("entity checked above");
    condition::apply(entity, "defending", None);

    let (id, timestamp) = seq.next();
    Ok(vec![EngineEvent::ConditionApplied(event::ConditionApplied {
        id,
        timestamp,
        entity_id: action.entity_id.clone(),
        status: "defending".to_owned(),
        duration: 1,
    })])
}

pub(super) fn resolve_set_seed(
    state: &mut GameState,
    action: &SetSeedAction,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, Rejection> {
    if action.seed.is_empty() {
        return Err(Rejection::new(
            ActionErrorCode::SeedEmpty,
            "seed must be a non-empty string",
        ));
    }

    state.rng = RngState::seeded(action.seed.clone());

    let (id, timestamp) = seq.next();
    Ok(vec![EngineEvent::SeedSet(event::SeedSet {
        id,
        timestamp,
        seed: action.seed.clone(),
    })])
}

pub(super) fn resolve_spawn(
    state: &mut GameState,
    action: &SpawnAction,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, Rejection> {
    let entity = &action.entity;

    if entity.id.as_str().is_empty() || state.entities.contains(&entity.id) {
        return Err(Rejection::new(
            ActionErrorCode::SpawnIdTaken,
            format!("entity id '{}' is empty or already taken", entity.id),
        ));
    }
    if entity.stats.hp_max < 1
        || entity.stats.hp_current < 0
        || entity.stats.hp_current > entity.stats.hp_max
    {
        return Err(Rejection::new(
            ActionErrorCode::SpawnInvalidStats,
            format!(
                "hp {}/{} is out of bounds",
                entity.stats.hp_current, entity.stats.hp_max
            ),
        ));
    }
    if !state.map.in_bounds(&entity.position)
        || state.map.blocks_movement(&entity.position)
        || (entity.is_solid() && state.solid_occupant(&entity.position, None).is_some())
    {
        return Err(Rejection::new(
            ActionErrorCode::SpawnCellUnavailable,
            format!("cell {} cannot take a new entity", entity.position),
        ));
    }

    state.entities.bucket_mut(entity.kind).push(entity.clone());

    let (id, timestamp) = seq.next();
    Ok(vec![EngineEvent::EntitySpawned(event::EntitySpawned {
        id,
        timestamp,
        entity_id: entity.id.clone(),
        position: entity.position,
    })])
}

pub(super) fn resolve_remove(
    state: &mut GameState,
    action: &RemoveAction,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, Rejection> {
    let entity = state.entity(&action.entity_id).ok_or_else(|| {
        Rejection::new(
            ActionErrorCode::EntityUnknown,
            format!("entity '{}' does not exist", action.entity_id),
        )
    })?;

    // Only corpses leave the board without GM say-so.
    if entity.is_alive() && !action.gm_authorized {
        return Err(Rejection::new(
            ActionErrorCode::RemoveNotAuthorized,
            format!("entity '{}' is alive and removal is not GM-authorized", entity.id),
        ));
    }

    let mut events = Vec::new();

    let was_active = state.combat.active_entity_id.as_ref() == Some(&action.entity_id);
    let initiative_index = state
        .combat
        .initiative_order
        .iter()
        .position(|id| id == &action.entity_id);

    state.entities.remove(&action.entity_id);
    if state.ui.selected_entity_id.as_ref() == Some(&action.entity_id) {
        state.ui.selected_entity_id = None;
    }

    let (id, timestamp) = seq.next();
    events.push(EngineEvent::EntityRemoved(event::EntityRemoved {
        id,
        timestamp,
        entity_id: action.entity_id.clone(),
    }));

    if let Some(index) = initiative_index {
        state.combat.initiative_order.remove(index);

        if state.combat.initiative_order.is_empty() {
            state.combat.end_combat();
        } else if was_active {
            // Hand the turn to the entity now sitting at this index,
            // wrapping if the removed entity was last.
            let next_index = index % state.combat.initiative_order.len();
            state.combat.active_entity_id = None;
            super::turn::start_turn_at(state, next_index, true, seq, &mut events)?;

            // Nobody left standing to take the turn: combat is over.
            if state.combat.in_combat() && state.combat.active_entity_id.is_none() {
                state.combat.end_combat();
            }
        }
    }

    Ok(events)
}
