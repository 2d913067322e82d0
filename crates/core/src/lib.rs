//! Deterministic tabletop rules engine.
//!
//! `warden-core` defines the canonical rules: the authoritative state
//! tree, the whitelisted action engine, the condition and ability
//! subsystems, the tactical-event channel, invariant checking, canonical
//! hashing, and replay verification. Everything is a pure function over a
//! [`GameState`] value — no I/O, no clocks, no global RNG — so the
//! surrounding runtime and offline tools share one source of truth.

pub mod ability;
pub mod action;
pub mod condition;
pub mod envelope;
pub mod event;
pub mod hash;
pub mod invariant;
pub mod path;
pub mod replay;
pub mod rng;
pub mod schema;
pub mod state;
pub mod tactical;

pub use ability::{
    AbilityCatalogue, AbilityCost, AbilityDef, AbilityRange, AbilityUse, AbilityViolation,
    AbilityViolationCode, ActionType, Effect, Targeting,
};
pub use action::{
    Action, ActionErrorCode, ActionOutcome, AttackAction, DefendAction, EndTurnAction, MoveAction,
    Rejection, RemoveAction, SetSeedAction, SpawnAction, UseAbilityAction, apply_action,
};
pub use condition::{CONDITIONS, ConditionDef};
pub use envelope::{Adjudication, DocumentUpdate, ModelEnvelope, UpdateOp};
pub use event::{EngineEvent, EventSeq};
pub use hash::{canonical_json, fnv1a64, hash_json, state_hash};
pub use invariant::{InvariantCode, Violation, check_invariants};
pub use path::{find_path, find_path_to_adjacent};
pub use replay::{
    FinalExpectation, ReplayBundle, ReplayMeta, ReplayReport, ReplayStep, record_bundle,
    run_replay,
};
pub use rng::{CheckOutcome, DiceExpr, RngError, RollMode, RollOutcome};
pub use schema::{
    SchemaError, SchemaViolation, VersionCheck, check_schema_version, decode_envelope,
    decode_state, validate_envelope,
};
pub use state::{
    CombatMode, CombatState, Entity, EntityBuckets, EntityId, EntityKind, EventLog, GameState,
    GridKind, GridSize, GridSpec, InventoryItem, MapState, Meta, Position, RngMode, RngState,
    RollRecord, SCHEMA_VERSION, SizeClass, Stats, TerrainCell, UiState,
};
pub use tactical::{
    TacticalApplyError, TacticalEvent, TacticalViolation, TacticalViolationCode, apply_events,
    validate_events,
};
