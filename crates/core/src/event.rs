//! Typed events describing observable outcomes of state transitions.
//!
//! Events are a closed sum: adding a variant is a compile-time change with
//! a visible migration point in every exhaustive match. Each payload carries
//! its own `id` and a logical `timestamp` (the log sequence at emission);
//! wall-clock time never enters the hashed state.

use serde::{Deserialize, Serialize};

use crate::state::{EntityId, Position};

/// One observable outcome of an engine transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    #[serde(rename = "MOVE_APPLIED")]
    MoveApplied(MoveApplied),
    #[serde(rename = "ATTACK_RESOLVED")]
    AttackResolved(AttackResolved),
    #[serde(rename = "DAMAGE_APPLIED")]
    DamageApplied(DamageApplied),
    #[serde(rename = "HEAL_APPLIED")]
    HealApplied(HealApplied),
    #[serde(rename = "FORCED_MOVE")]
    ForcedMove(ForcedMove),
    #[serde(rename = "ABILITY_USED")]
    AbilityUsed(AbilityUsed),
    #[serde(rename = "CONDITION_APPLIED")]
    ConditionApplied(ConditionApplied),
    #[serde(rename = "CONDITION_REMOVED")]
    ConditionRemoved(ConditionRemoved),
    #[serde(rename = "CONDITION_DAMAGE")]
    ConditionDamage(ConditionDamage),
    #[serde(rename = "CONDITION_EXPIRED")]
    ConditionExpired(ConditionExpired),
    #[serde(rename = "TURN_STARTED")]
    TurnStarted(TurnMarker),
    #[serde(rename = "TURN_ENDED")]
    TurnEnded(TurnMarker),
    #[serde(rename = "TURN_SKIPPED")]
    TurnSkipped(TurnSkipped),
    #[serde(rename = "ROUND_STARTED")]
    RoundStarted(RoundStarted),
    #[serde(rename = "INITIATIVE_SET")]
    InitiativeSet(InitiativeSet),
    #[serde(rename = "COMBAT_ENDED")]
    CombatEnded(CombatEnded),
    #[serde(rename = "SEED_SET")]
    SeedSet(SeedSet),
    #[serde(rename = "ENTITY_SPAWNED")]
    EntitySpawned(EntitySpawned),
    #[serde(rename = "ENTITY_REMOVED")]
    EntityRemoved(EntityRemoved),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveApplied {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub from: Position,
    pub path: Vec<Position>,
    pub final_position: Position,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttackResolved {
    pub id: String,
    pub timestamp: u64,
    pub attacker_id: EntityId,
    pub target_id: EntityId,
    pub raw_roll: u32,
    pub attack_modifier: i64,
    pub attack_roll: i64,
    pub effective_ac: i64,
    pub hit: bool,
    pub crit: bool,
    pub damage: i64,
    pub target_hp_before: i64,
    pub target_hp_after: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DamageApplied {
    pub id: String,
    pub timestamp: u64,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub amount: i64,
    pub hp_after: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HealApplied {
    pub id: String,
    pub timestamp: u64,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub amount: i64,
    pub actual_heal: i64,
    pub hp_after: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForcedMove {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub from: Position,
    pub to: Position,
    pub direction: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AbilityUsed {
    pub id: String,
    pub timestamp: u64,
    pub use_id: String,
    pub actor_id: EntityId,
    pub ability_id: String,
    pub target_ids: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConditionApplied {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub status: String,
    pub duration: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConditionRemoved {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConditionDamage {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub status: String,
    pub damage: i64,
    pub hp_after: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConditionExpired {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TurnMarker {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub round: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TurnSkipped {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoundStarted {
    pub id: String,
    pub timestamp: u64,
    pub round: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitiativeRoll {
    pub entity_id: EntityId,
    pub roll: u32,
    pub modifier: i64,
    pub total: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitiativeSet {
    pub id: String,
    pub timestamp: u64,
    pub order: Vec<EntityId>,
    pub rolls: Vec<InitiativeRoll>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CombatEnded {
    pub id: String,
    pub timestamp: u64,
    pub result: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedSet {
    pub id: String,
    pub timestamp: u64,
    pub seed: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntitySpawned {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntityRemoved {
    pub id: String,
    pub timestamp: u64,
    pub entity_id: EntityId,
}

impl EngineEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::MoveApplied(e) => &e.id,
            Self::AttackResolved(e) => &e.id,
            Self::DamageApplied(e) => &e.id,
            Self::HealApplied(e) => &e.id,
            Self::ForcedMove(e) => &e.id,
            Self::AbilityUsed(e) => &e.id,
            Self::ConditionApplied(e) => &e.id,
            Self::ConditionRemoved(e) => &e.id,
            Self::ConditionDamage(e) => &e.id,
            Self::ConditionExpired(e) => &e.id,
            Self::TurnStarted(e) | Self::TurnEnded(e) => &e.id,
            Self::TurnSkipped(e) => &e.id,
            Self::RoundStarted(e) => &e.id,
            Self::InitiativeSet(e) => &e.id,
            Self::CombatEnded(e) => &e.id,
            Self::SeedSet(e) => &e.id,
            Self::EntitySpawned(e) => &e.id,
            Self::EntityRemoved(e) => &e.id,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Self::MoveApplied(e) => e.timestamp,
            Self::AttackResolved(e) => e.timestamp,
            Self::DamageApplied(e) => e.timestamp,
            Self::HealApplied(e) => e.timestamp,
            Self::ForcedMove(e) => e.timestamp,
            Self::AbilityUsed(e) => e.timestamp,
            Self::ConditionApplied(e) => e.timestamp,
            Self::ConditionRemoved(e) => e.timestamp,
            Self::ConditionDamage(e) => e.timestamp,
            Self::ConditionExpired(e) => e.timestamp,
            Self::TurnStarted(e) | Self::TurnEnded(e) => e.timestamp,
            Self::TurnSkipped(e) => e.timestamp,
            Self::RoundStarted(e) => e.timestamp,
            Self::InitiativeSet(e) => e.timestamp,
            Self::CombatEnded(e) => e.timestamp,
            Self::SeedSet(e) => e.timestamp,
            Self::EntitySpawned(e) => e.timestamp,
            Self::EntityRemoved(e) => e.timestamp,
        }
    }

    /// The wire tag for this event, matching its serialized `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MoveApplied(_) => "MOVE_APPLIED",
            Self::AttackResolved(_) => "ATTACK_RESOLVED",
            Self::DamageApplied(_) => "DAMAGE_APPLIED",
            Self::HealApplied(_) => "HEAL_APPLIED",
            Self::ForcedMove(_) => "FORCED_MOVE",
            Self::AbilityUsed(_) => "ABILITY_USED",
            Self::ConditionApplied(_) => "CONDITION_APPLIED",
            Self::ConditionRemoved(_) => "CONDITION_REMOVED",
            Self::ConditionDamage(_) => "CONDITION_DAMAGE",
            Self::ConditionExpired(_) => "CONDITION_EXPIRED",
            Self::TurnStarted(_) => "TURN_STARTED",
            Self::TurnEnded(_) => "TURN_ENDED",
            Self::TurnSkipped(_) => "TURN_SKIPPED",
            Self::RoundStarted(_) => "ROUND_STARTED",
            Self::InitiativeSet(_) => "INITIATIVE_SET",
            Self::CombatEnded(_) => "COMBAT_ENDED",
            Self::SeedSet(_) => "SEED_SET",
            Self::EntitySpawned(_) => "ENTITY_SPAWNED",
            Self::EntityRemoved(_) => "ENTITY_REMOVED",
        }
    }
}

/// Allocator for event ids and logical timestamps.
///
/// Sequence numbers continue from the persisted log so ids stay unique and
/// timestamps non-decreasing across transitions.
#[derive(Debug)]
pub struct EventSeq {
    next: u64,
}

impl EventSeq {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Allocate the next `(id, timestamp)` pair with the default id scheme.
    pub fn next(&mut self) -> (String, u64) {
        let seq = self.next;
        self.next += 1;
        (format!("evt-{seq}"), seq)
    }

    /// Allocate a timestamp for an event that brings its own id
    /// (ability-resolver events use `<useId>-evt-<n>`).
    pub fn next_timestamp(&mut self) -> u64 {
        let seq = self.next;
        self.next += 1;
        seq
    }

    /// The sequence number the next allocation will use.
    pub fn peek(&self) -> u64 {
        self.next
    }
}
