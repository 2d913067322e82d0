//! UI selection state mirrored into the authoritative tree.
//!
//! The renderer owns presentation, but selection and hover references live
//! here so the invariant set can keep them pointing at real entities and
//! in-bounds cells.

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, Position};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UiState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hovered_cell: Option<Position>,
}
