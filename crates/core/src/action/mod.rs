//! Declared actions and the engine that applies them.
//!
//! `Action` is the whitelist: a closed sum of every command the engine
//! accepts. Rule violations come back as rejection values; the engine
//! never panics for them.

mod apply;
mod combat;
mod lifecycle;
mod movement;
mod turn;

pub use apply::apply_action;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ability::AbilityViolationCode;
use crate::event::EngineEvent;
use crate::rng::RngError;
use crate::state::{Entity, EntityId, GameState, Position};

/// Whitelisted action variants. Anything else fails decoding and surfaces
/// as `UNKNOWN_ACTION` at the schema boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "MOVE")]
    Move(MoveAction),
    #[serde(rename = "ATTACK")]
    Attack(AttackAction),
    #[serde(rename = "USE_ABILITY")]
    UseAbility(UseAbilityAction),
    #[serde(rename = "DEFEND")]
    Defend(DefendAction),
    #[serde(rename = "END_TURN")]
    EndTurn(EndTurnAction),
    #[serde(rename = "ROLL_INITIATIVE")]
    RollInitiative,
    #[serde(rename = "SET_SEED")]
    SetSeed(SetSeedAction),
    #[serde(rename = "SPAWN")]
    Spawn(SpawnAction),
    #[serde(rename = "REMOVE")]
    Remove(RemoveAction),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveAction {
    pub entity_id: EntityId,
    pub path: Vec<Position>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttackAction {
    pub attacker_id: EntityId,
    pub target_id: EntityId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UseAbilityAction {
    pub entity_id: EntityId,
    pub ability_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_positions: Vec<Position>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DefendAction {
    pub entity_id: EntityId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndTurnAction {
    pub entity_id: EntityId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetSeedAction {
    pub seed: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpawnAction {
    pub entity: Entity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveAction {
    pub entity_id: EntityId,
    #[serde(default)]
    pub gm_authorized: bool,
}

impl Action {
    /// Decode an action from raw JSON. Unknown tags and malformed payloads
    /// both come back as `UNKNOWN_ACTION` rejections.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, Rejection> {
        serde_json::from_value(value.clone()).map_err(|err| {
            Rejection::new(
                ActionErrorCode::UnknownAction,
                format!("unrecognized action: {err}"),
            )
        })
    }

    /// The wire tag for this action.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Move(_) => "MOVE",
            Self::Attack(_) => "ATTACK",
            Self::UseAbility(_) => "USE_ABILITY",
            Self::Defend(_) => "DEFEND",
            Self::EndTurn(_) => "END_TURN",
            Self::RollInitiative => "ROLL_INITIATIVE",
            Self::SetSeed(_) => "SET_SEED",
            Self::Spawn(_) => "SPAWN",
            Self::Remove(_) => "REMOVE",
        }
    }
}

/// Stable rejection codes for rule violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionErrorCode {
    UnknownAction,
    RngNotSeeded,
    SeedEmpty,
    EntityUnknown,
    EntityDead,
    TargetUnknown,
    TargetDead,
    NotYourTurn,
    CombatNotActive,
    CombatAlreadyActive,
    NoCombatants,
    MovePathEmpty,
    MovePathDiscontiguous,
    MoveOutOfBounds,
    MoveBlocked,
    MoveTileOccupied,
    MoveExceedsBudget,
    OutOfRange,
    AbilityUseIdDuplicate,
    AbilityActorUnknown,
    AbilityUnknown,
    AbilityNotOwned,
    AbilityTargetCardinality,
    AbilityTargetUnknown,
    AbilityTargetPositionsRequired,
    AbilityCostInsufficient,
    AbilityOnCooldown,
    SpawnIdTaken,
    SpawnCellUnavailable,
    SpawnInvalidStats,
    RemoveNotAuthorized,
    InternalError,
}

impl From<AbilityViolationCode> for ActionErrorCode {
    fn from(code: AbilityViolationCode) -> Self {
        match code {
            AbilityViolationCode::AbilityUseIdDuplicate => Self::AbilityUseIdDuplicate,
            AbilityViolationCode::AbilityActorUnknown => Self::AbilityActorUnknown,
            AbilityViolationCode::AbilityUnknown => Self::AbilityUnknown,
            AbilityViolationCode::AbilityNotOwned => Self::AbilityNotOwned,
            AbilityViolationCode::AbilityTargetCardinality => Self::AbilityTargetCardinality,
            AbilityViolationCode::AbilityTargetUnknown => Self::AbilityTargetUnknown,
            AbilityViolationCode::AbilityTargetPositionsRequired => {
                Self::AbilityTargetPositionsRequired
            }
            AbilityViolationCode::OutOfRange => Self::OutOfRange,
            AbilityViolationCode::AbilityCostInsufficient => Self::AbilityCostInsufficient,
            AbilityViolationCode::AbilityOnCooldown => Self::AbilityOnCooldown,
        }
    }
}

/// A rule-level rejection of a declared action.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}: {message}", code.as_ref())]
pub struct Rejection {
    pub code: ActionErrorCode,
    pub message: String,
}

impl Rejection {
    pub fn new(code: ActionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<RngError> for Rejection {
    fn from(err: RngError) -> Self {
        let code = match err {
            RngError::NotSeeded => ActionErrorCode::RngNotSeeded,
            RngError::InvalidRequest(_) => ActionErrorCode::InternalError,
        };
        Rejection::new(code, err.to_string())
    }
}

/// Result of [`apply_action`].
///
/// On `success == false` the returned state is the input unchanged and
/// `errors` is non-empty.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    pub state: GameState,
    pub events: Vec<EngineEvent>,
    pub errors: Vec<Rejection>,
}

impl ActionOutcome {
    pub(crate) fn accepted(state: GameState, events: Vec<EngineEvent>) -> Self {
        Self {
            success: true,
            state,
            events,
            errors: Vec::new(),
        }
    }

    pub(crate) fn rejected(state: GameState, rejection: Rejection) -> Self {
        Self {
            success: false,
            state,
            events: Vec::new(),
            errors: vec![rejection],
        }
    }
}
