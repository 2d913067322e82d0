//! Combat bookkeeping: mode, round counter, initiative order.

use serde::{Deserialize, Serialize};

use super::entity::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatMode {
    Exploration,
    Combat,
}

/// Turn-order state.
///
/// Exploration requires round 0, no active entity, and an empty initiative
/// order; combat requires round >= 1 and an active entity drawn from the
/// initiative order. The invariant checker enforces both shapes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CombatState {
    pub mode: CombatMode,
    pub round: u32,
    pub active_entity_id: Option<EntityId>,
    #[serde(default)]
    pub initiative_order: Vec<EntityId>,
}

impl CombatState {
    pub fn exploration() -> Self {
        Self {
            mode: CombatMode::Exploration,
            round: 0,
            active_entity_id: None,
            initiative_order: Vec::new(),
        }
    }

    pub fn in_combat(&self) -> bool {
        self.mode == CombatMode::Combat
    }

    /// Index of the active entity within the initiative order.
    pub fn active_index(&self) -> Option<usize> {
        let active = self.active_entity_id.as_ref()?;
        self.initiative_order.iter().position(|id| id == active)
    }

    /// Leave combat and reset turn bookkeeping.
    pub fn end_combat(&mut self) {
        *self = Self::exploration();
    }
}

impl Default for CombatState {
    fn default() -> Self {
        Self::exploration()
    }
}
