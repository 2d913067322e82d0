//! Entities: player characters, NPCs, and placed objects.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique entity identifier.
///
/// Ids are opaque non-empty strings and must be globally unique across all
/// entity buckets.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Which bucket an entity belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Player,
    Npc,
    Object,
}

/// Creature size class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeClass {
    S,
    M,
    L,
}

/// A grid cell coordinate.
///
/// Coordinates are signed so intermediate arithmetic (forced movement,
/// direction vectors) cannot underflow; the invariant set rejects persisted
/// negative positions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(deny_unknown_fields)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: `max(|dx|, |dy|)`, so diagonals count as 1.
    pub fn chebyshev(&self, other: &Position) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// True when `other` is exactly one cardinal step away.
    pub fn is_cardinal_neighbor(&self, other: &Position) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx + dy == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Core combat statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Stats {
    pub hp_current: i64,
    pub hp_max: i64,
    pub ac: i64,
    pub movement_speed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_bonus: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_die: Option<String>,
}

/// A stack of items carried by an entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub qty: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A player character, NPC, or placed object on the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub size: SizeClass,
    pub position: Position,
    pub stats: Stats,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub condition_durations: BTreeMap<String, u32>,
    #[serde(default)]
    pub ability_cooldowns: BTreeMap<String, u32>,
    #[serde(default)]
    pub resources: BTreeMap<String, u64>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ability_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
}

impl Entity {
    /// Alive means positive HP and no `dead` condition.
    pub fn is_alive(&self) -> bool {
        self.stats.hp_current > 0 && !self.has_condition("dead")
    }

    /// Solid entities block movement and cell sharing.
    ///
    /// Living players and NPCs are solid; corpses are not. Placed objects
    /// are always solid.
    pub fn is_solid(&self) -> bool {
        match self.kind {
            EntityKind::Player | EntityKind::Npc => self.is_alive(),
            EntityKind::Object => true,
        }
    }

    pub fn has_condition(&self, status: &str) -> bool {
        self.conditions.iter().any(|c| c == status)
    }

    pub fn has_ability(&self, ability_id: &str) -> bool {
        self.ability_ids.iter().any(|a| a == ability_id)
    }

    /// Remaining cooldown turns for an ability (0 = ready).
    pub fn cooldown_remaining(&self, ability_id: &str) -> u32 {
        self.ability_cooldowns.get(ability_id).copied().unwrap_or(0)
    }

    pub fn resource(&self, name: &str) -> u64 {
        self.resources.get(name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_counts_diagonals_as_one() {
        let a = Position::new(2, 2);
        assert_eq!(a.chebyshev(&Position::new(3, 3)), 1);
        assert_eq!(a.chebyshev(&Position::new(2, 5)), 3);
        assert_eq!(a.chebyshev(&Position::new(-1, 2)), 3);
    }

    #[test]
    fn cardinal_neighbors_exclude_diagonals() {
        let a = Position::new(1, 1);
        assert!(a.is_cardinal_neighbor(&Position::new(1, 2)));
        assert!(a.is_cardinal_neighbor(&Position::new(0, 1)));
        assert!(!a.is_cardinal_neighbor(&Position::new(2, 2)));
        assert!(!a.is_cardinal_neighbor(&Position::new(1, 1)));
    }
}
