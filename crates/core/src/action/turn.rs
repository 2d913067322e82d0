//! Turn order: END_TURN, ROLL_INITIATIVE, and the shared advance logic.

use crate::condition;
use crate::event::{self, EngineEvent, EventSeq};
use crate::rng::{self, RollMode};
use crate::state::{CombatMode, EntityId, EntityKind, GameState};

use super::{ActionErrorCode, EndTurnAction, Rejection};

/// In combat, only the active entity may act. Exploration is free-form.
pub(super) fn require_turn(state: &GameState, entity_id: &EntityId) -> Result<(), Rejection> {
    if state.combat.in_combat() && state.combat.active_entity_id.as_ref() != Some(entity_id) {
        return Err(Rejection::new(
            ActionErrorCode::NotYourTurn,
            format!("entity '{entity_id}' is not the active entity"),
        ));
    }
    Ok(())
}

/// Victory check: a faction with no living members ends the fight.
fn combat_result(state: &GameState) -> Option<&'static str> {
    let players_alive = state.living_of_kind(EntityKind::Player).count() > 0;
    let npcs_alive = state.living_of_kind(EntityKind::Npc).count() > 0;
    match (players_alive, npcs_alive) {
        (true, true) => None,
        (true, false) => Some("victory"),
        (false, true) => Some("defeat"),
        (false, false) => Some("draw"),
    }
}

fn end_combat(state: &mut GameState, result: &str, seq: &mut EventSeq, events: &mut Vec<EngineEvent>) {
    let (id, timestamp) = seq.next();
    events.push(EngineEvent::CombatEnded(event::CombatEnded {
        id,
        timestamp,
        result: result.to_owned(),
    }));
    state.combat.end_combat();
}

/// Decrement every non-zero ability cooldown on the entity.
fn tick_cooldowns(state: &mut GameState, entity_id: &EntityId) {
    if let Some(entity) = state.entity_mut(entity_id) {
        for remaining in entity.ability_cooldowns.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        entity.ability_cooldowns.retain(|_, remaining| *remaining > 0);
    }
}

/// Begin the turn of the entity at `index` in the initiative order,
/// skipping entities that are dead or whose conditions force a skip.
///
/// Wrapping past the end of the order increments the round. Bounded by two
/// full cycles so an all-skip order cannot loop forever; in that degenerate
/// case the last candidate stays active.
pub(super) fn start_turn_at(
    state: &mut GameState,
    mut index: usize,
    mut wrapped: bool,
    seq: &mut EventSeq,
    events: &mut Vec<EngineEvent>,
) -> Result<(), Rejection> {
    let order_len = state.combat.initiative_order.len();
    if order_len == 0 {
        return Ok(());
    }

    let advance = |state: &mut GameState,
                       index: &mut usize,
                       wrapped: &mut bool,
                       seq: &mut EventSeq,
                       events: &mut Vec<EngineEvent>| {
        *index += 1;
        if *index >= order_len {
            *index = 0;
            if !*wrapped {
                // Round boundary: count it once per advance chain.
                state.combat.round += 1;
                let (id, timestamp) = seq.next();
                events.push(EngineEvent::RoundStarted(event::RoundStarted {
                    id,
                    timestamp,
                    round: state.combat.round,
                }));
            }
            *wrapped = true;
        }
    };

    // Already-wrapped entry (initiative roll) never increments the round.
    if index >= order_len {
        index = 0;
    }

    for _ in 0..(order_len * 2) {
        let entity_id = state.combat.initiative_order[index].clone();

        let alive = state
            .entity(&entity_id)
            .map(|entity| entity.is_alive())
            .unwrap_or(false);
        if !alive {
            advance(state, &mut index, &mut wrapped, seq, events);
            continue;
        }

        state.combat.active_entity_id = Some(entity_id.clone());
        let (id, timestamp) = seq.next();
        events.push(EngineEvent::TurnStarted(event::TurnMarker {
            id,
            timestamp,
            entity_id: entity_id.clone(),
            round: state.combat.round,
        }));

        // Start-of-turn damage may kill the entity or end the fight.
        let dot_events = condition::process_start_of_turn(state, &entity_id, seq)?;
        events.extend(dot_events);

        if let Some(result) = combat_result(state) {
            end_combat(state, result, seq, events);
            return Ok(());
        }

        let entity = state
            .entity(&entity_id)
            .expect("active entity exists in initiative");
        let skip_status = if !entity.is_alive() {
            Some("dead")
        } else {
            condition::forced_skip(entity)
        };

        let Some(status) = skip_status else {
            return Ok(());
        };

        let (id, timestamp) = seq.next();
        events.push(EngineEvent::TurnSkipped(event::TurnSkipped {
            id,
            timestamp,
            entity_id: entity_id.clone(),
            status: status.to_owned(),
        }));
        // Skipped turns still age conditions and cooldowns, otherwise a
        // stunned entity would never recover.
        events.extend(condition::process_end_of_turn(state, &entity_id, seq));
        tick_cooldowns(state, &entity_id);
        advance(state, &mut index, &mut wrapped, seq, events);
    }

    Ok(())
}

pub(super) fn resolve_end_turn(
    state: &mut GameState,
    action: &EndTurnAction,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, Rejection> {
    if !state.combat.in_combat() {
        return Err(Rejection::new(
            ActionErrorCode::CombatNotActive,
            "END_TURN requires combat mode",
        ));
    }
    if state.combat.active_entity_id.as_ref() != Some(&action.entity_id) {
        return Err(Rejection::new(
            ActionErrorCode::NotYourTurn,
            format!("entity '{}' is not the active entity", action.entity_id),
        ));
    }

    let mut events = Vec::new();
    let ending_index = state
        .combat
        .active_index()
        .expect("active entity is in the initiative order");

    events.extend(condition::process_end_of_turn(state, &action.entity_id, seq));
    tick_cooldowns(state, &action.entity_id);

    let (id, timestamp) = seq.next();
    events.push(EngineEvent::TurnEnded(event::TurnMarker {
        id,
        timestamp,
        entity_id: action.entity_id.clone(),
        round: state.combat.round,
    }));

    if let Some(result) = combat_result(state) {
        end_combat(state, result, seq, &mut events);
        return Ok(events);
    }

    let order_len = state.combat.initiative_order.len();
    let next_index = (ending_index + 1) % order_len;
    let wrapped_now = ending_index + 1 >= order_len;
    if wrapped_now {
        state.combat.round += 1;
        let (id, timestamp) = seq.next();
        events.push(EngineEvent::RoundStarted(event::RoundStarted {
            id,
            timestamp,
            round: state.combat.round,
        }));
    }
    start_turn_at(state, next_index, wrapped_now, seq, &mut events)?;

    Ok(events)
}

pub(super) fn resolve_roll_initiative(
    state: &mut GameState,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, Rejection> {
    if state.combat.in_combat() {
        return Err(Rejection::new(
            ActionErrorCode::CombatAlreadyActive,
            "initiative is already rolled",
        ));
    }

    // Living players and NPCs, in deterministic bucket order.
    let participants: Vec<EntityId> = state
        .living_of_kind(EntityKind::Player)
        .chain(state.living_of_kind(EntityKind::Npc))
        .map(|entity| entity.id.clone())
        .collect();
    if participants.is_empty() {
        return Err(Rejection::new(
            ActionErrorCode::NoCombatants,
            "no living combatants to roll initiative for",
        ));
    }

    let mut rolls = Vec::with_capacity(participants.len());
    for entity_id in &participants {
        let modifier = state
            .entity(entity_id)
            .expect("participant listed from state")
            .stats
            .attack_bonus
            .unwrap_or(0);
        let check = rng::roll_check(&mut state.rng, modifier, RollMode::Normal)?;
        rolls.push(event::InitiativeRoll {
            entity_id: entity_id.clone(),
            roll: check.natural,
            modifier,
            total: check.total,
        });
    }

    // Ties break on (total desc, modifier desc, id asc).
    let mut ordered = rolls.clone();
    ordered.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| b.modifier.cmp(&a.modifier))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    let order: Vec<EntityId> = ordered.iter().map(|roll| roll.entity_id.clone()).collect();

    state.combat.mode = CombatMode::Combat;
    state.combat.round = 1;
    state.combat.initiative_order = order.clone();
    state.combat.active_entity_id = Some(order[0].clone());

    let mut events = Vec::new();
    let (id, timestamp) = seq.next();
    events.push(EngineEvent::InitiativeSet(event::InitiativeSet {
        id,
        timestamp,
        order,
        rolls,
    }));

    start_turn_at(state, 0, true, seq, &mut events)?;

    Ok(events)
}
