//! Authoritative game state representation.
//!
//! This module owns the data structures that describe entities, the map,
//! combat bookkeeping, the RNG audit trail, and the event log. States are
//! values: every engine entry point consumes a state and returns a new one;
//! nothing here mutates in place across calls.

mod combat;
mod entity;
mod log;
mod map;
mod rng;
mod ui;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use combat::{CombatMode, CombatState};
pub use entity::{Entity, EntityId, EntityKind, InventoryItem, Position, SizeClass, Stats};
pub use log::EventLog;
pub use map::{GridKind, GridSize, GridSpec, MapState, TerrainCell};
pub use rng::{MAX_ROLL_RECORDS, RngMode, RngState, RollRecord};
pub use ui::UiState;

use crate::ability::AbilityDef;

/// Schema version written by this engine. Differing MAJOR is refused,
/// differing MINOR is a warning.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Free-form session metadata. Closed like every other object level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Entities partitioned by kind. Bucket membership must match each
/// entity's `kind` tag; insertion order is the deterministic iteration
/// order used everywhere in the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntityBuckets {
    #[serde(default)]
    pub players: Vec<Entity>,
    #[serde(default)]
    pub npcs: Vec<Entity>,
    #[serde(default)]
    pub objects: Vec<Entity>,
}

impl EntityBuckets {
    /// All entities in deterministic order: players, then NPCs, then objects.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.players
            .iter()
            .chain(self.npcs.iter())
            .chain(self.objects.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.players
            .iter_mut()
            .chain(self.npcs.iter_mut())
            .chain(self.objects.iter_mut())
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.iter().find(|entity| &entity.id == id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.iter_mut().find(|entity| &entity.id == id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.get(id).is_some()
    }

    /// The bucket an entity of the given kind belongs in.
    pub fn bucket_mut(&mut self, kind: EntityKind) -> &mut Vec<Entity> {
        match kind {
            EntityKind::Player => &mut self.players,
            EntityKind::Npc => &mut self.npcs,
            EntityKind::Object => &mut self.objects,
        }
    }

    /// Remove an entity from whichever bucket holds it.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        for bucket in [&mut self.players, &mut self.npcs, &mut self.objects] {
            if let Some(index) = bucket.iter().position(|entity| &entity.id == id) {
                return Some(bucket.remove(index));
            }
        }
        None
    }
}

/// Canonical snapshot of the deterministic game state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GameState {
    pub schema_version: String,
    #[serde(default)]
    pub meta: Meta,
    pub map: MapState,
    pub entities: EntityBuckets,
    #[serde(default)]
    pub combat: CombatState,
    #[serde(default)]
    pub rng: RngState,
    #[serde(default)]
    pub log: EventLog,
    #[serde(default)]
    pub ui: UiState,
    /// Per-state ability overrides layered over the built-in catalogue.
    #[serde(
        rename = "abilities_catalogue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub abilities_catalogue: Option<BTreeMap<String, AbilityDef>>,
}

impl GameState {
    /// A fresh exploration-mode state over an open map.
    pub fn new(map: MapState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_owned(),
            meta: Meta::default(),
            map,
            entities: EntityBuckets::default(),
            combat: CombatState::exploration(),
            rng: RngState::unseeded(),
            log: EventLog::default(),
            ui: UiState::default(),
            abilities_catalogue: None,
        }
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// The solid entity standing on a cell, if any.
    ///
    /// `except` excludes an entity from the check (an entity never blocks
    /// itself).
    pub fn solid_occupant(&self, position: &Position, except: Option<&EntityId>) -> Option<&Entity> {
        self.entities.iter().find(|entity| {
            entity.is_solid()
                && entity.position == *position
                && except.map(|id| &entity.id != id).unwrap_or(true)
        })
    }

    /// A cell is enterable when in bounds, not terrain-blocked, and free of
    /// solid occupants.
    pub fn can_enter(&self, position: &Position, moving: Option<&EntityId>) -> bool {
        self.map.in_bounds(position)
            && !self.map.blocks_movement(position)
            && self.solid_occupant(position, moving).is_none()
    }

    /// Living entities of one faction. Objects belong to no faction.
    pub fn living_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |entity| entity.kind == kind && entity.is_alive())
    }
}
