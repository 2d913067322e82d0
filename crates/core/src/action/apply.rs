//! The central action dispatcher.

use crate::ability::{self, AbilityCatalogue, AbilityUse};
use crate::event::EventSeq;
use crate::invariant;
use crate::state::GameState;

use super::{
    Action, ActionErrorCode, ActionOutcome, Rejection, UseAbilityAction,
};

/// Apply a declared action to a state.
///
/// Pure: the input state is never mutated. A rejected action returns the
/// input state unchanged with a non-empty error list; a successful action
/// returns the new state with the emitted events appended to its log.
///
/// An invariant violation after a successful resolution is a resolver bug,
/// asserted in debug builds and surfaced as `INTERNAL_ERROR` in release so
/// the broken state is never committed.
pub fn apply_action(state: &GameState, action: &Action) -> ActionOutcome {
    let mut next = state.clone();
    let mut seq = next.log.sequence();

    let result = match action {
        Action::Move(move_action) => super::movement::resolve_move(&mut next, move_action, &mut seq),
        Action::Attack(attack) => super::combat::resolve_attack(&mut next, attack, &mut seq),
        Action::UseAbility(use_ability) => resolve_use_ability(&mut next, use_ability, &mut seq),
        Action::Defend(defend) => super::lifecycle::resolve_defend(&mut next, defend, &mut seq),
        Action::EndTurn(end_turn) => super::turn::resolve_end_turn(&mut next, end_turn, &mut seq),
        Action::RollInitiative => super::turn::resolve_roll_initiative(&mut next, &mut seq),
        Action::SetSeed(set_seed) => super::lifecycle::resolve_set_seed(&mut next, set_seed, &mut seq),
        Action::Spawn(spawn) => super::lifecycle::resolve_spawn(&mut next, spawn, &mut seq),
        Action::Remove(remove) => super::lifecycle::resolve_remove(&mut next, remove, &mut seq),
    };

    match result {
        Ok(events) => {
            next.log.append(&events);

            let violations = invariant::check_invariants(&next);
            debug_assert!(
                violations.is_empty(),
                "invariants violated after {}: {:?}",
                action.action_type(),
                violations
            );
            if !violations.is_empty() {
                let summary = violations
                    .iter()
                    .map(|violation| violation.code.as_ref())
                    .collect::<Vec<_>>()
                    .join(", ");
                return ActionOutcome::rejected(
                    state.clone(),
                    Rejection::new(
                        ActionErrorCode::InternalError,
                        format!("post-transition invariant failure: {summary}"),
                    ),
                );
            }

            ActionOutcome::accepted(next, events)
        }
        Err(rejection) => ActionOutcome::rejected(state.clone(), rejection),
    }
}

fn resolve_use_ability(
    state: &mut GameState,
    action: &UseAbilityAction,
    seq: &mut EventSeq,
) -> Result<Vec<crate::event::EngineEvent>, Rejection> {
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

    let catalogue = AbilityCatalogue::for_state(state);
    let ability_use = AbilityUse {
        use_id: format!("use-{}", seq.peek()),
        actor_id: action.entity_id.clone(),
        ability_id: action.ability_id.clone(),
        target_ids: action.target_id.iter().cloned().collect(),
        target_positions: action.target_positions.clone(),
    };

    let uses = [ability_use];
    let violations = ability::validate_uses(state, &catalogue, &uses);
    if let Some(violation) = violations.first() {
        return Err(Rejection::new(
            violation.code.into(),
            violation.message.clone(),
        ));
    }

    let (resolved, events) = ability::resolve_uses(state, &catalogue, &uses, seq)
        .map_err(|err| Rejection::new(ActionErrorCode::InternalError, err.to_string()))?;
    *state = resolved;
    Ok(events)
}
