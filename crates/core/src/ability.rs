//! Ability catalogue, use validation, and deterministic resolution.
//!
//! Definitions are data: a static built-in table overridden per-state by
//! `abilities_catalogue`. Effects are fixed values, so resolution draws
//! nothing from the RNG; the whole channel is a pure function of state
//! and declared uses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition;
use crate::event::{self, EngineEvent, EventSeq};
use crate::state::{EntityId, GameState, Position};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "ACTION")]
    Action,
    #[serde(rename = "BONUS")]
    Bonus,
    #[serde(rename = "REACTION")]
    Reaction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Targeting {
    #[serde(rename = "SELF")]
    SelfOnly,
    #[serde(rename = "SINGLE_ENEMY")]
    SingleEnemy,
    #[serde(rename = "SINGLE_ALLY")]
    SingleAlly,
    #[serde(rename = "MULTI")]
    Multi,
    #[serde(rename = "AREA")]
    Area,
    #[serde(rename = "POSITION")]
    Position,
}

impl Targeting {
    /// Position-addressed modes require `target_positions` instead of ids.
    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Area | Self::Position)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbilityRange {
    #[serde(rename = "type")]
    pub kind: String,
    pub distance: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbilityCost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ap: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u32>,
}

impl AbilityCost {
    /// Resource costs as (name, amount) pairs, zero entries elided.
    pub fn resource_costs(&self) -> Vec<(&'static str, u64)> {
        let mut costs = Vec::new();
        if let Some(ap) = self.ap.filter(|ap| *ap > 0) {
            costs.push(("ap", ap));
        }
        if let Some(mana) = self.mana.filter(|mana| *mana > 0) {
            costs.push(("mana", mana));
        }
        costs
    }
}

/// Push or pull, relative to the acting entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ForcedMoveDirection {
    Push,
    Pull,
}

/// Atomic ability effect. Values are static; the resolver never rolls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Effect {
    #[serde(rename = "DAMAGE")]
    Damage(DamageEffect),
    #[serde(rename = "HEAL")]
    Heal(HealEffect),
    #[serde(rename = "APPLY_STATUS")]
    ApplyStatus(ApplyStatusEffect),
    #[serde(rename = "REMOVE_STATUS")]
    RemoveStatus(RemoveStatusEffect),
    #[serde(rename = "FORCED_MOVE")]
    ForcedMove(ForcedMoveEffect),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DamageEffect {
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealEffect {
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyStatusEffect {
    pub status: String,
    pub duration: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveStatusEffect {
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForcedMoveEffect {
    pub distance: u32,
    pub direction: ForcedMoveDirection,
}

/// Complete ability definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbilityDef {
    pub ability_id: String,
    pub name: String,
    pub action_type: ActionType,
    pub range: AbilityRange,
    pub targeting: Targeting,
    #[serde(default)]
    pub cost: AbilityCost,
    pub effects: Vec<Effect>,
}

fn melee(distance: u32) -> AbilityRange {
    AbilityRange {
        kind: "melee".to_owned(),
        distance,
    }
}

fn ranged(distance: u32) -> AbilityRange {
    AbilityRange {
        kind: "ranged".to_owned(),
        distance,
    }
}

fn builtin_defs() -> Vec<AbilityDef> {
    vec![
        AbilityDef {
            ability_id: "fireball".to_owned(),
            name: "Fireball".to_owned(),
            action_type: ActionType::Action,
            range: ranged(6),
            targeting: Targeting::SingleEnemy,
            cost: AbilityCost {
                ap: None,
                mana: Some(4),
                cooldown: None,
            },
            effects: vec![Effect::Damage(DamageEffect { value: 8 })],
        },
        AbilityDef {
            ability_id: "healing_word".to_owned(),
            name: "Healing Word".to_owned(),
            action_type: ActionType::Bonus,
            range: ranged(4),
            targeting: Targeting::SingleAlly,
            cost: AbilityCost {
                ap: None,
                mana: Some(3),
                cooldown: None,
            },
            effects: vec![Effect::Heal(HealEffect { value: 6 })],
        },
        AbilityDef {
            ability_id: "shield_bash".to_owned(),
            name: "Shield Bash".to_owned(),
            action_type: ActionType::Action,
            range: melee(1),
            targeting: Targeting::SingleEnemy,
            cost: AbilityCost {
                ap: Some(1),
                mana: None,
                cooldown: None,
            },
            effects: vec![
                Effect::Damage(DamageEffect { value: 4 }),
                Effect::ApplyStatus(ApplyStatusEffect {
                    status: "stunned".to_owned(),
                    duration: 1,
                }),
            ],
        },
        AbilityDef {
            ability_id: "cleanse".to_owned(),
            name: "Cleanse".to_owned(),
            action_type: ActionType::Action,
            range: ranged(4),
            targeting: Targeting::SingleAlly,
            cost: AbilityCost {
                ap: None,
                mana: Some(2),
                cooldown: None,
            },
            effects: vec![Effect::RemoveStatus(RemoveStatusEffect {
                status: "poisoned".to_owned(),
            })],
        },
        AbilityDef {
            ability_id: "force_push".to_owned(),
            name: "Force Push".to_owned(),
            action_type: ActionType::Action,
            range: melee(1),
            targeting: Targeting::SingleEnemy,
            cost: AbilityCost {
                ap: Some(1),
                mana: None,
                cooldown: None,
            },
            effects: vec![Effect::ForcedMove(ForcedMoveEffect {
                distance: 2,
                direction: ForcedMoveDirection::Push,
            })],
        },
        AbilityDef {
            ability_id: "second_wind".to_owned(),
            name: "Second Wind".to_owned(),
            action_type: ActionType::Bonus,
            range: melee(0),
            targeting: Targeting::SelfOnly,
            cost: AbilityCost {
                ap: None,
                mana: None,
                cooldown: Some(3),
            },
            effects: vec![Effect::Heal(HealEffect { value: 5 })],
        },
    ]
}

/// Whitelist lookup table: built-ins layered under per-state overrides.
#[derive(Clone, Debug)]
pub struct AbilityCatalogue {
    defs: BTreeMap<String, AbilityDef>,
}

impl AbilityCatalogue {
    pub fn builtin() -> Self {
        let defs = builtin_defs()
            .into_iter()
            .map(|def| (def.ability_id.clone(), def))
            .collect();
        Self { defs }
    }

    /// The catalogue in effect for a state: built-ins plus state overrides.
    pub fn for_state(state: &GameState) -> Self {
        let mut catalogue = Self::builtin();
        if let Some(overrides) = &state.abilities_catalogue {
            for (id, def) in overrides {
                catalogue.defs.insert(id.clone(), def.clone());
            }
        }
        catalogue
    }

    pub fn get(&self, ability_id: &str) -> Option<&AbilityDef> {
        self.defs.get(ability_id)
    }
}

/// A declared use of a catalogued ability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbilityUse {
    pub use_id: String,
    pub actor_id: EntityId,
    pub ability_id: String,
    #[serde(default)]
    pub target_ids: Vec<EntityId>,
    #[serde(default)]
    pub target_positions: Vec<Position>,
}

/// Codes for per-use validation failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AbilityViolationCode {
    AbilityUseIdDuplicate,
    AbilityActorUnknown,
    AbilityUnknown,
    AbilityNotOwned,
    AbilityTargetCardinality,
    AbilityTargetUnknown,
    AbilityTargetPositionsRequired,
    OutOfRange,
    AbilityCostInsufficient,
    AbilityOnCooldown,
}

/// One validation failure, addressed by position in the use list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbilityViolation {
    pub use_index: usize,
    pub use_id: String,
    pub code: AbilityViolationCode,
    pub message: String,
}

/// Validate a batch of ability uses against a state.
///
/// The checks run in a fixed order per use; resource checks are cumulative
/// across preceding uses in the same batch and cooldown consumption by an
/// earlier use blocks a later one.
pub fn validate_uses(
    state: &GameState,
    catalogue: &AbilityCatalogue,
    uses: &[AbilityUse],
) -> Vec<AbilityViolation> {
    let mut violations = Vec::new();
    let mut seen_use_ids: Vec<&str> = Vec::new();
    // (actor, resource) -> spent so far in this batch
    let mut spent: BTreeMap<(EntityId, &'static str), u64> = BTreeMap::new();
    // (actor, ability) -> cooldown scheduled by an earlier use
    let mut scheduled: Vec<(EntityId, String)> = Vec::new();

    for (use_index, ability_use) in uses.iter().enumerate() {
        let reject = |code: AbilityViolationCode, message: String| AbilityViolation {
            use_index,
            use_id: ability_use.use_id.clone(),
            code,
            message,
        };

        if seen_use_ids.contains(&ability_use.use_id.as_str()) {
            violations.push(reject(
                AbilityViolationCode::AbilityUseIdDuplicate,
                format!("duplicate use_id '{}'", ability_use.use_id),
            ));
            continue;
        }
        seen_use_ids.push(&ability_use.use_id);

        let Some(actor) = state.entity(&ability_use.actor_id) else {
            violations.push(reject(
                AbilityViolationCode::AbilityActorUnknown,
                format!("actor '{}' does not exist", ability_use.actor_id),
            ));
            continue;
        };

        let Some(def) = catalogue.get(&ability_use.ability_id) else {
            violations.push(reject(
                AbilityViolationCode::AbilityUnknown,
                format!("ability '{}' is not in the catalogue", ability_use.ability_id),
            ));
            continue;
        };

        if !actor.has_ability(&def.ability_id) {
            violations.push(reject(
                AbilityViolationCode::AbilityNotOwned,
                format!("actor '{}' does not know '{}'", actor.id, def.ability_id),
            ));
            continue;
        }

        // Target cardinality per targeting mode.
        let cardinality_ok = match def.targeting {
            Targeting::SelfOnly => ability_use.target_ids.is_empty(),
            Targeting::SingleEnemy | Targeting::SingleAlly => ability_use.target_ids.len() == 1,
            Targeting::Multi => !ability_use.target_ids.is_empty(),
            Targeting::Area | Targeting::Position => ability_use.target_ids.is_empty(),
        };
        if !cardinality_ok {
            violations.push(reject(
                AbilityViolationCode::AbilityTargetCardinality,
                format!(
                    "targeting {:?} does not accept {} entity target(s)",
                    def.targeting,
                    ability_use.target_ids.len()
                ),
            ));
            continue;
        }

        if def.targeting.is_positional() && ability_use.target_positions.is_empty() {
            violations.push(reject(
                AbilityViolationCode::AbilityTargetPositionsRequired,
                format!("targeting {:?} requires target_positions", def.targeting),
            ));
            continue;
        }

        let mut targets_ok = true;
        for target_id in &ability_use.target_ids {
            if state.entity(target_id).is_none() {
                violations.push(reject(
                    AbilityViolationCode::AbilityTargetUnknown,
                    format!("target '{target_id}' does not exist"),
                ));
                targets_ok = false;
            }
        }
        if !targets_ok {
            continue;
        }

        // Range: Chebyshev from actor to each entity target; SELF exempt.
        if def.targeting != Targeting::SelfOnly {
            let mut out_of_range = false;
            for target_id in &ability_use.target_ids {
                let target = state
                    .entity(target_id)
                    .expect("target existence checked above");
                let distance = actor.position.chebyshev(&target.position);
                if distance > def.range.distance {
                    violations.push(reject(
                        AbilityViolationCode::OutOfRange,
                        format!(
                            "target '{target_id}' at distance {distance} exceeds range {}",
                            def.range.distance
                        ),
                    ));
                    out_of_range = true;
                }
            }
            for position in &ability_use.target_positions {
                let distance = actor.position.chebyshev(position);
                if distance > def.range.distance {
                    violations.push(reject(
                        AbilityViolationCode::OutOfRange,
                        format!(
                            "position {position} at distance {distance} exceeds range {}",
                            def.range.distance
                        ),
                    ));
                    out_of_range = true;
                }
            }
            if out_of_range {
                continue;
            }
        }

        // Resource sufficiency, cumulative across earlier uses by this actor.
        let mut cost_ok = true;
        for (resource, amount) in def.cost.resource_costs() {
            let key = (actor.id.clone(), resource);
            let already = spent.get(&key).copied().unwrap_or(0);
            if actor.resource(resource) < already + amount {
                violations.push(reject(
                    AbilityViolationCode::AbilityCostInsufficient,
                    format!(
                        "actor '{}' has {} {resource}, needs {} after {} already committed",
                        actor.id,
                        actor.resource(resource),
                        amount,
                        already
                    ),
                ));
                cost_ok = false;
            }
        }
        if !cost_ok {
            continue;
        }
        for (resource, amount) in def.cost.resource_costs() {
            *spent.entry((actor.id.clone(), resource)).or_insert(0) += amount;
        }

        // Cooldown must be zero at consumption; consuming schedules it.
        let cooling = actor.cooldown_remaining(&def.ability_id) > 0
            || scheduled
                .iter()
                .any(|(id, ability)| id == &actor.id && ability == &def.ability_id);
        if cooling {
            violations.push(reject(
                AbilityViolationCode::AbilityOnCooldown,
                format!("ability '{}' is on cooldown", def.ability_id),
            ));
            continue;
        }
        if def.cost.cooldown.unwrap_or(0) > 0 {
            scheduled.push((actor.id.clone(), def.ability_id.clone()));
        }
    }

    violations
}

/// Resolver failures. These indicate a use that was never validated;
/// validated batches cannot hit them.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AbilityError {
    #[error("actor '{0}' does not exist")]
    ActorNotFound(EntityId),
    #[error("target '{0}' does not exist")]
    TargetNotFound(EntityId),
    #[error("ability '{0}' is not in the catalogue")]
    UnknownAbility(String),
}

/// Deterministically resolve a validated batch of ability uses.
///
/// Returns the next state and the emitted events. Callers must discard
/// both when the batch failed validation: resolution assumes legality.
pub fn resolve_uses(
    state: &GameState,
    catalogue: &AbilityCatalogue,
    uses: &[AbilityUse],
    seq: &mut EventSeq,
) -> Result<(GameState, Vec<EngineEvent>), AbilityError> {
    let mut next = state.clone();
    let mut events = Vec::new();

    for ability_use in uses {
        resolve_one(&mut next, catalogue, ability_use, seq, &mut events)?;
    }

    Ok((next, events))
}

fn resolve_one(
    state: &mut GameState,
    catalogue: &AbilityCatalogue,
    ability_use: &AbilityUse,
    seq: &mut EventSeq,
    events: &mut Vec<EngineEvent>,
) -> Result<(), AbilityError> {
    let def = catalogue
        .get(&ability_use.ability_id)
        .ok_or_else(|| AbilityError::UnknownAbility(ability_use.ability_id.clone()))?
        .clone();

    let actor_position = state
        .entity(&ability_use.actor_id)
        .ok_or_else(|| AbilityError::ActorNotFound(ability_use.actor_id.clone()))?
        .position;

    // Per-use event id sequence: `<useId>-evt-<n>`.
    let mut use_seq: u32 = 0;
    let mut next_id = |seq: &mut EventSeq| {
        let id = format!("{}-evt-{}", ability_use.use_id, use_seq);
        use_seq += 1;
        (id, seq.next_timestamp())
    };

    // Deduct costs and schedule the cooldown up front.
    {
        let actor = state
            .entity_mut(&ability_use.actor_id)
            .ok_or_else(|| AbilityError::ActorNotFound(ability_use.actor_id.clone()))?;
        for (resource, amount) in def.cost.resource_costs() {
            let current = actor.resource(resource);
            actor
                .resources
                .insert(resource.to_owned(), current.saturating_sub(amount));
        }
        if let Some(cooldown) = def.cost.cooldown.filter(|cd| *cd > 0) {
            actor
                .ability_cooldowns
                .insert(def.ability_id.clone(), cooldown);
        }
    }

    let targets = resolve_targets(state, &ability_use.actor_id, &def, ability_use)?;

    let (id, timestamp) = next_id(seq);
    events.push(EngineEvent::AbilityUsed(event::AbilityUsed {
        id,
        timestamp,
        use_id: ability_use.use_id.clone(),
        actor_id: ability_use.actor_id.clone(),
        ability_id: def.ability_id.clone(),
        target_ids: targets.clone(),
    }));

    for effect in &def.effects {
        for target_id in &targets {
            apply_effect(
                state,
                &ability_use.actor_id,
                actor_position,
                target_id,
                effect,
                seq,
                &mut next_id,
                events,
            )?;
        }
    }

    Ok(())
}

/// Entity targets of a use: the actor for SELF, declared ids for entity
/// modes, and occupants of the declared cells for positional modes.
fn resolve_targets(
    state: &GameState,
    actor_id: &EntityId,
    def: &AbilityDef,
    ability_use: &AbilityUse,
) -> Result<Vec<EntityId>, AbilityError> {
    match def.targeting {
        Targeting::SelfOnly => Ok(vec![actor_id.clone()]),
        Targeting::SingleEnemy | Targeting::SingleAlly | Targeting::Multi => {
            for target_id in &ability_use.target_ids {
                if state.entity(target_id).is_none() {
                    return Err(AbilityError::TargetNotFound(target_id.clone()));
                }
            }
            Ok(ability_use.target_ids.clone())
        }
        Targeting::Area | Targeting::Position => {
            let mut targets = Vec::new();
            for position in &ability_use.target_positions {
                for entity in state.entities.iter() {
                    if entity.position == *position && !targets.contains(&entity.id) {
                        targets.push(entity.id.clone());
                    }
                }
            }
            Ok(targets)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_effect(
    state: &mut GameState,
    actor_id: &EntityId,
    actor_position: Position,
    target_id: &EntityId,
    effect: &Effect,
    seq: &mut EventSeq,
    next_id: &mut impl FnMut(&mut EventSeq) -> (String, u64),
    events: &mut Vec<EngineEvent>,
) -> Result<(), AbilityError> {
    match effect {
        Effect::Damage(damage) => {
            let target = state
                .entity_mut(target_id)
                .ok_or_else(|| AbilityError::TargetNotFound(target_id.clone()))?;
            let hp_after = (target.stats.hp_current - damage.value).max(0);
            target.stats.hp_current = hp_after;

            let (id, timestamp) = next_id(seq);
            events.push(EngineEvent::DamageApplied(event::DamageApplied {
                id,
                timestamp,
                source_id: actor_id.clone(),
                target_id: target_id.clone(),
                amount: damage.value,
                hp_after,
            }));

            if hp_after == 0 {
                let target = state
                    .entity_mut(target_id)
                    .expect("target mutated above must still exist");
                if !target.has_condition("dead") {
                    condition::apply(target, "dead", None);
                    let (id, timestamp) = next_id(seq);
                    events.push(EngineEvent::ConditionApplied(event::ConditionApplied {
                        id,
                        timestamp,
                        entity_id: target_id.clone(),
                        status: "dead".to_owned(),
                        duration: 0,
                    }));
                }
            }
        }
        Effect::Heal(heal) => {
            let target = state
                .entity_mut(target_id)
                .ok_or_else(|| AbilityError::TargetNotFound(target_id.clone()))?;
            let headroom = (target.stats.hp_max - target.stats.hp_current).max(0);
            let actual = heal.value.min(headroom);
            target.stats.hp_current += actual;
            let hp_after = target.stats.hp_current;

            let (id, timestamp) = next_id(seq);
            events.push(EngineEvent::HealApplied(event::HealApplied {
                id,
                timestamp,
                source_id: actor_id.clone(),
                target_id: target_id.clone(),
                amount: heal.value,
                actual_heal: actual,
                hp_after,
            }));
        }
        Effect::ApplyStatus(apply) => {
            let target = state
                .entity_mut(target_id)
                .ok_or_else(|| AbilityError::TargetNotFound(target_id.clone()))?;
            condition::apply(target, &apply.status, Some(apply.duration));

            let (id, timestamp) = next_id(seq);
            events.push(EngineEvent::ConditionApplied(event::ConditionApplied {
                id,
                timestamp,
                entity_id: target_id.clone(),
                status: apply.status.clone(),
                duration: apply.duration,
            }));
        }
        Effect::RemoveStatus(remove) => {
            let target = state
                .entity_mut(target_id)
                .ok_or_else(|| AbilityError::TargetNotFound(target_id.clone()))?;
            condition::remove(target, &remove.status);

            let (id, timestamp) = next_id(seq);
            events.push(EngineEvent::ConditionRemoved(event::ConditionRemoved {
                id,
                timestamp,
                entity_id: target_id.clone(),
                status: remove.status.clone(),
            }));
        }
        Effect::ForcedMove(forced) => {
            let target = state
                .entity(target_id)
                .ok_or_else(|| AbilityError::TargetNotFound(target_id.clone()))?;
            let from = target.position;

            // Unit vector actor -> target; push moves away, pull toward.
            // Clamped at zero; terrain and upper bounds are intentionally
            // not consulted (known limitation carried from the rules).
            let dx = (from.x - actor_position.x).signum();
            let dy = (from.y - actor_position.y).signum();
            let (dx, dy) = match forced.direction {
                ForcedMoveDirection::Push => (dx, dy),
                ForcedMoveDirection::Pull => (-dx, -dy),
            };
            let distance = forced.distance as i32;
            let to = Position::new(
                (from.x + dx * distance).max(0),
                (from.y + dy * distance).max(0),
            );

            let target = state
                .entity_mut(target_id)
                .expect("target looked up above must still exist");
            target.position = to;

            let (id, timestamp) = next_id(seq);
            events.push(EngineEvent::ForcedMove(event::ForcedMove {
                id,
                timestamp,
                entity_id: target_id.clone(),
                from,
                to,
                direction: forced.direction.as_ref().to_owned(),
            }));
        }
    }
    Ok(())
}
