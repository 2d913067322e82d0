//! Status conditions: static definitions and per-turn processing.
//!
//! The definition table is a whitelist; lookup misses are typed errors.
//! Damage-over-time runs in table declaration order so the event stream is
//! identical across runs.

use crate::event::{self, EngineEvent, EventSeq};
use crate::rng::{self, RngError};
use crate::state::{Entity, EntityId, GameState};

/// Static definition of one status condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConditionDef {
    pub name: &'static str,
    pub skip_turn: bool,
    pub permanent: bool,
    pub attack_disadvantage: bool,
    pub ac_mod: i64,
    pub attack_mod: i64,
    /// Sides of the damage-per-turn die, if the condition ticks.
    pub dot_die: Option<u32>,
    /// Default duration in turns; 0 means no auto-expiry.
    pub default_duration: u32,
}

/// The condition whitelist. Declaration order is the deterministic
/// start-of-turn processing order.
pub const CONDITIONS: &[ConditionDef] = &[
    ConditionDef {
        name: "burning",
        skip_turn: false,
        permanent: false,
        attack_disadvantage: false,
        ac_mod: 0,
        attack_mod: 0,
        dot_die: Some(4),
        default_duration: 3,
    },
    ConditionDef {
        name: "poisoned",
        skip_turn: false,
        permanent: false,
        attack_disadvantage: true,
        ac_mod: 0,
        attack_mod: 0,
        dot_die: None,
        default_duration: 3,
    },
    ConditionDef {
        name: "bleeding",
        skip_turn: false,
        permanent: false,
        attack_disadvantage: false,
        ac_mod: 0,
        attack_mod: 0,
        dot_die: Some(4),
        default_duration: 2,
    },
    ConditionDef {
        name: "stunned",
        skip_turn: true,
        permanent: false,
        attack_disadvantage: false,
        ac_mod: 0,
        attack_mod: 0,
        dot_die: None,
        default_duration: 1,
    },
    ConditionDef {
        name: "weakened",
        skip_turn: false,
        permanent: false,
        attack_disadvantage: false,
        ac_mod: 0,
        attack_mod: -2,
        dot_die: None,
        default_duration: 2,
    },
    ConditionDef {
        name: "blessed",
        skip_turn: false,
        permanent: false,
        attack_disadvantage: false,
        ac_mod: 0,
        attack_mod: 2,
        dot_die: None,
        default_duration: 3,
    },
    ConditionDef {
        name: "shielded",
        skip_turn: false,
        permanent: false,
        attack_disadvantage: false,
        ac_mod: 2,
        attack_mod: 0,
        dot_die: None,
        default_duration: 3,
    },
    ConditionDef {
        name: "defending",
        skip_turn: false,
        permanent: false,
        attack_disadvantage: false,
        ac_mod: 2,
        attack_mod: 0,
        dot_die: None,
        default_duration: 1,
    },
    ConditionDef {
        name: "dead",
        skip_turn: true,
        permanent: true,
        attack_disadvantage: false,
        ac_mod: 0,
        attack_mod: 0,
        dot_die: None,
        default_duration: 0,
    },
];

pub fn definition(status: &str) -> Option<&'static ConditionDef> {
    CONDITIONS.iter().find(|def| def.name == status)
}

/// Apply a condition. Idempotent: re-applying refreshes the duration.
/// Unknown statuses are still stored (the model may assert homebrew
/// conditions) but carry no mechanical definition.
pub fn apply(entity: &mut Entity, status: &str, duration: Option<u32>) {
    if !entity.has_condition(status) {
        entity.conditions.push(status.to_owned());
    }

    let def = definition(status);
    let permanent = def.map(|d| d.permanent).unwrap_or(false);
    let effective = duration.unwrap_or_else(|| def.map(|d| d.default_duration).unwrap_or(0));

    if permanent || effective == 0 {
        entity.condition_durations.remove(status);
    } else {
        entity
            .condition_durations
            .insert(status.to_owned(), effective);
    }
}

/// Remove a condition and its duration. No-op when absent.
pub fn remove(entity: &mut Entity, status: &str) {
    entity.conditions.retain(|c| c != status);
    entity.condition_durations.remove(status);
}

/// Sum of AC modifiers from active conditions.
pub fn ac_mod(entity: &Entity) -> i64 {
    entity
        .conditions
        .iter()
        .filter_map(|status| definition(status))
        .map(|def| def.ac_mod)
        .sum()
}

/// Sum of attack-roll modifiers from active conditions.
pub fn attack_mod(entity: &Entity) -> i64 {
    entity
        .conditions
        .iter()
        .filter_map(|status| definition(status))
        .map(|def| def.attack_mod)
        .sum()
}

pub fn attack_disadvantage(entity: &Entity) -> bool {
    entity
        .conditions
        .iter()
        .filter_map(|status| definition(status))
        .any(|def| def.attack_disadvantage)
}

/// The first skip-turn condition on an entity, if any.
pub fn forced_skip(entity: &Entity) -> Option<&'static str> {
    CONDITIONS
        .iter()
        .find(|def| def.skip_turn && entity.has_condition(def.name))
        .map(|def| def.name)
}

/// Start-of-turn processing: damage-over-time ticks, in table order.
///
/// HP clamps at zero; hitting zero applies `dead` and stops further ticks.
pub fn process_start_of_turn(
    state: &mut GameState,
    entity_id: &EntityId,
    seq: &mut EventSeq,
) -> Result<Vec<EngineEvent>, RngError> {
    let mut events = Vec::new();

    for def in CONDITIONS {
        let Some(die) = def.dot_die else { continue };

        let Some(entity) = state.entity(entity_id) else {
            break;
        };
        if !entity.has_condition(def.name) || !entity.is_alive() {
            continue;
        }

        let damage = rng::roll_die(&mut state.rng, die)? as i64;

        let entity = state
            .entity_mut(entity_id)
            .expect("entity looked up above must still exist");
        let hp_after = (entity.stats.hp_current - damage).max(0);
        entity.stats.hp_current = hp_after;

        let (id, timestamp) = seq.next();
        events.push(EngineEvent::ConditionDamage(event::ConditionDamage {
            id,
            timestamp,
            entity_id: entity_id.clone(),
            status: def.name.to_owned(),
            damage,
            hp_after,
        }));

        if hp_after == 0 {
            apply(entity, "dead", None);
            let (id, timestamp) = seq.next();
            events.push(EngineEvent::ConditionApplied(event::ConditionApplied {
                id,
                timestamp,
                entity_id: entity_id.clone(),
                status: "dead".to_owned(),
                duration: 0,
            }));
            break;
        }
    }

    Ok(events)
}

/// End-of-turn processing: decrement durations; expiry removes the status.
pub fn process_end_of_turn(
    state: &mut GameState,
    entity_id: &EntityId,
    seq: &mut EventSeq,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();

    let Some(entity) = state.entity_mut(entity_id) else {
        return events;
    };

    let mut expired = Vec::new();
    for (status, remaining) in entity.condition_durations.iter_mut() {
        if *remaining == 0 {
            continue;
        }
        *remaining -= 1;
        if *remaining == 0 {
            expired.push(status.clone());
        }
    }

    for status in expired {
        remove(entity, &status);
        let (id, timestamp) = seq.next();
        events.push(EngineEvent::ConditionExpired(event::ConditionExpired {
            id,
            timestamp,
            entity_id: entity_id.clone(),
            status,
        }));
    }

    events
}
