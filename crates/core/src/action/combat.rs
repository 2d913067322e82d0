//! ATTACK resolution: to-hit roll, damage, and death handling.

use crate::condition;
use crate::event::{self, EngineEvent, EventSeq};
use crate::rng::{self, DiceExpr, RollMode};
use crate::state::GameState;

use super::{ActionErrorCode, AttackAction, Rejection};

pub(super) fn resolve_attack(
    state: &mut GameState,
    action: &AttackAction,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, Rejection> {
    let attacker = state.entity(&action.attacker_id).ok_or_else(|| {
        Rejection::new(
            ActionErrorCode::EntityUnknown,
            format!("attacker '{}' does not exist", action.attacker_id),
        )
    })?;
    if !attacker.is_alive() {
        return Err(Rejection::new(
            ActionErrorCode::EntityDead,
            format!("attacker '{}' is dead", action.attacker_id),
        ));
    }
    let target = state.entity(&action.target_id).ok_or_else(|| {
        Rejection::new(
            ActionErrorCode::TargetUnknown,
            format!("target '{}' does not exist", action.target_id),
        )
    })?;
    if !target.is_alive() {
        return Err(Rejection::new(
            ActionErrorCode::TargetDead,
            format!("target '{}' is already dead", action.target_id),
        ));
    }
    super::turn::require_turn(state, &action.attacker_id)?;

    let distance = attacker.position.chebyshev(&target.position);
    if distance != 1 {
        return Err(Rejection::new(
            ActionErrorCode::OutOfRange,
            format!("target at distance {distance}, melee attacks require 1"),
        ));
    }

    let attack_modifier =
        attacker.stats.attack_bonus.unwrap_or(0) + condition::attack_mod(attacker);
    let mode = if condition::attack_disadvantage(attacker) {
        RollMode::Disadvantage
    } else {
        RollMode::Normal
    };
    let damage_die = attacker
        .stats
        .damage_die
        .clone()
        .unwrap_or_else(|| "1d4".to_owned());
    let effective_ac = target.stats.ac + condition::ac_mod(target);
    let target_hp_before = target.stats.hp_current;

    let check = rng::roll_check(&mut state.rng, attack_modifier, mode)?;
    let crit = check.natural == 20;
    let auto_miss = check.natural == 1;
    let hit = !auto_miss && (crit || check.total >= effective_ac);

    let mut damage: i64 = 0;
    if hit {
        let expr = DiceExpr::parse(&damage_die)?;
        // Critical hits double the dice, never the modifier.
        let rolled = if crit {
            DiceExpr::new(expr.count * 2, expr.sides, expr.modifier)
        } else {
            expr
        };
        damage = rng::roll_dice(&mut state.rng, &rolled)?.total.max(0);
    }

    let target_hp_after = (target_hp_before - damage).max(0);
    state
        .entity_mut(&action.target_id)
        .expect("target checked above")
        .stats
        .hp_current = target_hp_after;

    let mut events = Vec::new();
    let (id, timestamp) = seq.next();
    events.push(EngineEvent::AttackResolved(event::AttackResolved {
        id,
        timestamp,
        attacker_id: action.attacker_id.clone(),
        target_id: action.target_id.clone(),
        raw_roll: check.natural,
        attack_modifier,
        attack_roll: check.total,
        effective_ac,
        hit,
        crit,
        damage,
        target_hp_before,
        target_hp_after,
    }));

    if hit && target_hp_after == 0 {
        let target = state
            .entity_mut(&action.target_id)
            .expect("target checked above");
        condition::apply(target, "dead", None);
        let (id, timestamp) = seq.next();
        events.push(EngineEvent::ConditionApplied(event::ConditionApplied {
            id,
            timestamp,
            entity_id: action.target_id.clone(),
            status: "dead".to_owned(),
            duration: 0,
        }));
    }

    Ok(events)
}
