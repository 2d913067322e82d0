//! Model-asserted tactical events: the alternative mutation channel.
//!
//! The model may describe mechanical outcomes directly instead of using
//! catalogued abilities. Events are validated against the current state and
//! then applied all-or-nothing on a clone; a position collision or an HP
//! assertion below zero rejects the whole batch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition;
use crate::event::{self, EngineEvent, EventSeq};
use crate::state::{EntityId, GameState, Position};

/// A mechanical assertion from the model. Closed sum; the variant shapes
/// themselves enforce which fields each type may carry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TacticalEvent {
    #[serde(rename = "MOVE")]
    Move(TacticalMove),
    #[serde(rename = "ATTACK")]
    Attack(TacticalAttack),
    #[serde(rename = "DAMAGE")]
    Damage(TacticalDamage),
    #[serde(rename = "STATUS_APPLY")]
    StatusApply(TacticalStatusApply),
    #[serde(rename = "STATUS_REMOVE")]
    StatusRemove(TacticalStatusRemove),
    #[serde(rename = "TURN_START")]
    TurnStart(TacticalTurnMarker),
    #[serde(rename = "TURN_END")]
    TurnEnd(TacticalTurnMarker),
    #[serde(rename = "ROUND_END")]
    RoundEnd(TacticalTurnMarker),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TacticalMove {
    pub event_id: String,
    pub actor_id: EntityId,
    pub position_before: Position,
    pub position_after: Position,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TacticalAttack {
    pub event_id: String,
    pub actor_id: EntityId,
    pub target_id: EntityId,
    pub hit: bool,
    #[serde(default)]
    pub damage: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TacticalDamage {
    pub event_id: String,
    pub actor_id: EntityId,
    pub target_id: EntityId,
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TacticalStatusApply {
    pub event_id: String,
    pub actor_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    pub status: String,
    pub duration: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TacticalStatusRemove {
    pub event_id: String,
    pub actor_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TacticalTurnMarker {
    pub event_id: String,
    pub actor_id: EntityId,
}

impl TacticalEvent {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Move(e) => &e.event_id,
            Self::Attack(e) => &e.event_id,
            Self::Damage(e) => &e.event_id,
            Self::StatusApply(e) => &e.event_id,
            Self::StatusRemove(e) => &e.event_id,
            Self::TurnStart(e) | Self::TurnEnd(e) | Self::RoundEnd(e) => &e.event_id,
        }
    }

    pub fn actor_id(&self) -> &EntityId {
        match self {
            Self::Move(e) => &e.actor_id,
            Self::Attack(e) => &e.actor_id,
            Self::Damage(e) => &e.actor_id,
            Self::StatusApply(e) => &e.actor_id,
            Self::StatusRemove(e) => &e.actor_id,
            Self::TurnStart(e) | Self::TurnEnd(e) | Self::RoundEnd(e) => &e.actor_id,
        }
    }
}

/// Codes for tactical-event validation failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TacticalViolationCode {
    TacticalEventIdDuplicate,
    TacticalActorUnknown,
    TacticalTargetUnknown,
    TacticalPositionMismatch,
    TacticalPositionOutOfBounds,
    TacticalValueNegative,
    TacticalDurationInvalid,
    TacticalStatusEmpty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TacticalViolation {
    pub event_index: usize,
    pub event_id: String,
    pub code: TacticalViolationCode,
    pub message: String,
}

/// Hard application failures that reject the entire batch.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TacticalApplyError {
    #[error("event '{event_id}' moves onto an occupied or blocked cell {position}")]
    PositionCollision { event_id: String, position: Position },

    #[error("event '{event_id}' would take '{target_id}' below zero HP")]
    HpBelowZero {
        event_id: String,
        target_id: EntityId,
    },

    #[error("event '{event_id}' references missing entity '{entity_id}'")]
    EntityMissing {
        event_id: String,
        entity_id: EntityId,
    },
}

impl TacticalApplyError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PositionCollision { .. } => "TACTICAL_POSITION_COLLISION",
            Self::HpBelowZero { .. } => "TACTICAL_HP_BELOW_ZERO",
            Self::EntityMissing { .. } => "TACTICAL_ENTITY_MISSING",
        }
    }
}

/// Validate a batch of tactical events against a state. Collects every
/// violation; an empty result is the precondition for [`apply_events`].
pub fn validate_events(state: &GameState, events: &[TacticalEvent]) -> Vec<TacticalViolation> {
    let mut violations = Vec::new();
    let mut seen_ids: Vec<&str> = Vec::new();

    for (event_index, tactical) in events.iter().enumerate() {
        let reject = |code: TacticalViolationCode, message: String| TacticalViolation {
            event_index,
            event_id: tactical.event_id().to_owned(),
            code,
            message,
        };

        if seen_ids.contains(&tactical.event_id()) {
            violations.push(reject(
                TacticalViolationCode::TacticalEventIdDuplicate,
                format!("duplicate event_id '{}'", tactical.event_id()),
            ));
        }
        seen_ids.push(tactical.event_id());

        if !state.entities.contains(tactical.actor_id()) {
            violations.push(reject(
                TacticalViolationCode::TacticalActorUnknown,
                format!("actor '{}' does not exist", tactical.actor_id()),
            ));
            continue;
        }

        match tactical {
            TacticalEvent::Move(movement) => {
                let actor = state
                    .entity(&movement.actor_id)
                    .expect("actor existence checked above");
                if actor.position != movement.position_before {
                    violations.push(reject(
                        TacticalViolationCode::TacticalPositionMismatch,
                        format!(
                            "actor '{}' is at {}, event claims {}",
                            movement.actor_id, actor.position, movement.position_before
                        ),
                    ));
                }
                if !state.map.in_bounds(&movement.position_after) {
                    violations.push(reject(
                        TacticalViolationCode::TacticalPositionOutOfBounds,
                        format!("destination {} is outside the map", movement.position_after),
                    ));
                }
            }
            TacticalEvent::Attack(attack) => {
                if !state.entities.contains(&attack.target_id) {
                    violations.push(reject(
                        TacticalViolationCode::TacticalTargetUnknown,
                        format!("target '{}' does not exist", attack.target_id),
                    ));
                }
                if attack.damage < 0 {
                    violations.push(reject(
                        TacticalViolationCode::TacticalValueNegative,
                        format!("damage {} is negative", attack.damage),
                    ));
                }
            }
            TacticalEvent::Damage(damage) => {
                if !state.entities.contains(&damage.target_id) {
                    violations.push(reject(
                        TacticalViolationCode::TacticalTargetUnknown,
                        format!("target '{}' does not exist", damage.target_id),
                    ));
                }
                if damage.value < 0 {
                    violations.push(reject(
                        TacticalViolationCode::TacticalValueNegative,
                        format!("value {} is negative", damage.value),
                    ));
                }
            }
            TacticalEvent::StatusApply(apply) => {
                if let Some(target_id) = &apply.target_id
                    && !state.entities.contains(target_id)
                {
                    violations.push(reject(
                        TacticalViolationCode::TacticalTargetUnknown,
                        format!("target '{target_id}' does not exist"),
                    ));
                }
                if apply.status.is_empty() {
                    violations.push(reject(
                        TacticalViolationCode::TacticalStatusEmpty,
                        "status must be non-empty".to_owned(),
                    ));
                }
                if apply.duration < 1 {
                    violations.push(reject(
                        TacticalViolationCode::TacticalDurationInvalid,
                        format!("duration {} must be at least 1", apply.duration),
                    ));
                }
            }
            TacticalEvent::StatusRemove(remove) => {
                if let Some(target_id) = &remove.target_id
                    && !state.entities.contains(target_id)
                {
                    violations.push(reject(
                        TacticalViolationCode::TacticalTargetUnknown,
                        format!("target '{target_id}' does not exist"),
                    ));
                }
                if remove.status.is_empty() {
                    violations.push(reject(
                        TacticalViolationCode::TacticalStatusEmpty,
                        "status must be non-empty".to_owned(),
                    ));
                }
            }
            TacticalEvent::TurnStart(_) | TacticalEvent::TurnEnd(_) | TacticalEvent::RoundEnd(_) => {
                // Marker events carry no payload beyond the actor; the
                // closed variant shape already forbids movement or damage
                // fields.
            }
        }
    }

    violations
}

/// Apply a validated batch in order on a clone of the state.
///
/// Returns the next state and the engine events recording what was
/// applied. Any hard error discards everything.
pub fn apply_events(
    state: &GameState,
    events: &[TacticalEvent],
    seq: &mut EventSeq,
) -> Result<(GameState, Vec<EngineEvent>), TacticalApplyError> {
    let mut next = state.clone();
    let mut applied = Vec::new();

    for tactical in events {
        apply_one(&mut next, tactical, seq, &mut applied)?;
    }

    Ok((next, applied))
}

fn apply_one(
    state: &mut GameState,
    tactical: &TacticalEvent,
    seq: &mut EventSeq,
    applied: &mut Vec<EngineEvent>,
) -> Result<(), TacticalApplyError> {
    let missing = |event_id: &str, entity_id: &EntityId| TacticalApplyError::EntityMissing {
        event_id: event_id.to_owned(),
        entity_id: entity_id.clone(),
    };

    match tactical {
        TacticalEvent::Move(movement) => {
            // Collisions are checked against the evolving state, so two
            // moves onto the same cell in one batch fail as a pair.
            if state.map.blocks_movement(&movement.position_after)
                || state
                    .solid_occupant(&movement.position_after, Some(&movement.actor_id))
                    .is_some()
            {
                return Err(TacticalApplyError::PositionCollision {
                    event_id: movement.event_id.clone(),
                    position: movement.position_after,
                });
            }
            let from = movement.position_before;
            let actor = state
                .entity_mut(&movement.actor_id)
                .ok_or_else(|| missing(&movement.event_id, &movement.actor_id))?;
            actor.position = movement.position_after;

            let (id, timestamp) = seq.next();
            applied.push(EngineEvent::MoveApplied(event::MoveApplied {
                id,
                timestamp,
                entity_id: movement.actor_id.clone(),
                from,
                path: vec![movement.position_after],
                final_position: movement.position_after,
            }));
        }
        TacticalEvent::Attack(attack) => {
            if attack.hit && attack.damage > 0 {
                apply_damage(
                    state,
                    &attack.event_id,
                    &attack.actor_id,
                    &attack.target_id,
                    attack.damage,
                    seq,
                    applied,
                )?;
            }
        }
        TacticalEvent::Damage(damage) => {
            apply_damage(
                state,
                &damage.event_id,
                &damage.actor_id,
                &damage.target_id,
                damage.value,
                seq,
                applied,
            )?;
        }
        TacticalEvent::StatusApply(status_apply) => {
            let subject = status_apply
                .target_id
                .as_ref()
                .unwrap_or(&status_apply.actor_id)
                .clone();
            let entity = state
                .entity_mut(&subject)
                .ok_or_else(|| missing(&status_apply.event_id, &subject))?;
            condition::apply(entity, &status_apply.status, Some(status_apply.duration));

            let (id, timestamp) = seq.next();
            applied.push(EngineEvent::ConditionApplied(event::ConditionApplied {
                id,
                timestamp,
                entity_id: subject,
                status: status_apply.status.clone(),
                duration: status_apply.duration,
            }));
        }
        TacticalEvent::StatusRemove(status_remove) => {
            let subject = status_remove
                .target_id
                .as_ref()
                .unwrap_or(&status_remove.actor_id)
                .clone();
            let entity = state
                .entity_mut(&subject)
                .ok_or_else(|| missing(&status_remove.event_id, &subject))?;
            condition::remove(entity, &status_remove.status);

            let (id, timestamp) = seq.next();
            applied.push(EngineEvent::ConditionRemoved(event::ConditionRemoved {
                id,
                timestamp,
                entity_id: subject,
                status: status_remove.status.clone(),
            }));
        }
        TacticalEvent::TurnStart(marker) => {
            if state.combat.in_combat() {
                state.combat.active_entity_id = Some(marker.actor_id.clone());
            }
            let (id, timestamp) = seq.next();
            applied.push(EngineEvent::TurnStarted(event::TurnMarker {
                id,
                timestamp,
                entity_id: marker.actor_id.clone(),
                round: state.combat.round,
            }));
        }
        TacticalEvent::TurnEnd(marker) => {
            applied.extend(condition::process_end_of_turn(state, &marker.actor_id, seq));
            let (id, timestamp) = seq.next();
            applied.push(EngineEvent::TurnEnded(event::TurnMarker {
                id,
                timestamp,
                entity_id: marker.actor_id.clone(),
                round: state.combat.round,
            }));
        }
        TacticalEvent::RoundEnd(_) => {
            if state.combat.in_combat() {
                state.combat.round += 1;
            }
            let (id, timestamp) = seq.next();
            applied.push(EngineEvent::RoundStarted(event::RoundStarted {
                id,
                timestamp,
                round: state.combat.round,
            }));
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn apply_damage(
    state: &mut GameState,
    event_id: &str,
    source_id: &EntityId,
    target_id: &EntityId,
    value: i64,
    seq: &mut EventSeq,
    applied: &mut Vec<EngineEvent>,
) -> Result<(), TacticalApplyError> {
    let target = state
        .entity_mut(target_id)
        .ok_or_else(|| TacticalApplyError::EntityMissing {
            event_id: event_id.to_owned(),
            entity_id: target_id.clone(),
        })?;

    // The model asserts literal outcomes: an assertion past zero is a hard
    // error, unlike the engine path which clamps.
    let hp_after = target.stats.hp_current - value;
    if hp_after < 0 {
        return Err(TacticalApplyError::HpBelowZero {
            event_id: event_id.to_owned(),
            target_id: target_id.clone(),
        });
    }
    target.stats.hp_current = hp_after;

    let (id, timestamp) = seq.next();
    applied.push(EngineEvent::DamageApplied(event::DamageApplied {
        id,
        timestamp,
        source_id: source_id.clone(),
        target_id: target_id.clone(),
        amount: value,
        hp_after,
    }));

    if hp_after == 0 {
        let target = state
            .entity_mut(target_id)
            .expect("target mutated above must still exist");
        if !target.has_condition("dead") {
            condition::apply(target, "dead", None);
            let (id, timestamp) = seq.next();
            applied.push(EngineEvent::ConditionApplied(event::ConditionApplied {
                id,
                timestamp,
                entity_id: target_id.clone(),
                status: "dead".to_owned(),
                duration: 0,
            }));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Entity, EntityKind, MapState, SizeClass, Stats};

    fn pawn(id: &str, kind: EntityKind, position: Position, hp: i64) -> Entity {
        Entity {
            id: EntityId::from(id),
            kind,
            name: id.to_owned(),
            size: SizeClass::M,
            position,
            stats: Stats {
                hp_current: hp,
                hp_max: hp.max(1),
                ac: 12,
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

    fn board() -> GameState {
        let mut state = GameState::new(MapState::open(8, 8));
        state
            .entities
            .players
            .push(pawn("pc", EntityKind::Player, Position::new(1, 1), 10));
        state
            .entities
            .npcs
            .push(pawn("npc", EntityKind::Npc, Position::new(5, 5), 6));
        state
    }

    fn tmove(event_id: &str, actor: &str, before: Position, after: Position) -> TacticalEvent {
        TacticalEvent::Move(TacticalMove {
            event_id: event_id.to_owned(),
            actor_id: EntityId::from(actor),
            position_before: before,
            position_after: after,
        })
    }

    #[test]
    fn move_requires_matching_before_position() {
        let state = board();
        let violations = validate_events(
            &state,
            &[tmove("e1", "pc", Position::new(0, 0), Position::new(1, 0))],
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].code,
            TacticalViolationCode::TacticalPositionMismatch
        );
    }

    #[test]
    fn duplicate_ids_and_unknown_actor() {
        let state = board();
        let events = [
            tmove("e1", "pc", Position::new(1, 1), Position::new(1, 2)),
            tmove("e1", "ghost", Position::new(0, 0), Position::new(0, 1)),
        ];
        let violations = validate_events(&state, &events);
        let codes: Vec<_> = violations.iter().map(|v| v.code).collect();
        assert!(codes.contains(&TacticalViolationCode::TacticalEventIdDuplicate));
        assert!(codes.contains(&TacticalViolationCode::TacticalActorUnknown));
    }

    #[test]
    fn negative_damage_is_invalid() {
        let state = board();
        let events = [TacticalEvent::Damage(TacticalDamage {
            event_id: "e1".to_owned(),
            actor_id: EntityId::from("pc"),
            target_id: EntityId::from("npc"),
            value: -3,
        })];
        let violations = validate_events(&state, &events);
        assert_eq!(
            violations[0].code,
            TacticalViolationCode::TacticalValueNegative
        );
    }

    #[test]
    fn batch_applies_in_order() {
        let state = board();
        let mut seq = state.log.sequence();
        let events = [
            tmove("e1", "pc", Position::new(1, 1), Position::new(1, 2)),
            TacticalEvent::Damage(TacticalDamage {
                event_id: "e2".to_owned(),
                actor_id: EntityId::from("pc"),
                target_id: EntityId::from("npc"),
                value: 6,
            }),
            TacticalEvent::StatusApply(TacticalStatusApply {
                event_id: "e3".to_owned(),
                actor_id: EntityId::from("pc"),
                target_id: None,
                status: "blessed".to_owned(),
                duration: 2,
            }),
        ];
        assert!(validate_events(&state, &events).is_empty());
        let (next, applied) = apply_events(&state, &events, &mut seq).unwrap();

        assert_eq!(
            next.entity(&EntityId::from("pc")).unwrap().position,
            Position::new(1, 2)
        );
        let npc = next.entity(&EntityId::from("npc")).unwrap();
        assert_eq!(npc.stats.hp_current, 0);
        assert!(npc.has_condition("dead"));
        assert!(next.entity(&EntityId::from("pc")).unwrap().has_condition("blessed"));

        let types: Vec<_> = applied.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "MOVE_APPLIED",
                "DAMAGE_APPLIED",
                "CONDITION_APPLIED",
                "CONDITION_APPLIED"
            ]
        );
    }

    #[test]
    fn hp_below_zero_rejects_the_whole_batch() {
        let state = board();
        let mut seq = state.log.sequence();
        let events = [
            tmove("e1", "pc", Position::new(1, 1), Position::new(1, 2)),
            TacticalEvent::Damage(TacticalDamage {
                event_id: "e2".to_owned(),
                actor_id: EntityId::from("pc"),
                target_id: EntityId::from("npc"),
                value: 7,
            }),
        ];
        let err = apply_events(&state, &events, &mut seq).unwrap_err();
        assert_eq!(err.code(), "TACTICAL_HP_BELOW_ZERO");
        // Caller keeps the original state; the pc move is discarded with it.
        assert_eq!(
            state.entity(&EntityId::from("pc")).unwrap().position,
            Position::new(1, 1)
        );
    }

    #[test]
    fn move_collision_rejects_the_batch() {
        let mut state = board();
        state.entities.npcs[0].position = Position::new(1, 2);
        let mut seq = state.log.sequence();
        let events = [tmove("e1", "pc", Position::new(1, 1), Position::new(1, 2))];
        let err = apply_events(&state, &events, &mut seq).unwrap_err();
        assert_eq!(err.code(), "TACTICAL_POSITION_COLLISION");
    }
}
