//! The model-produced response envelope.
//!
//! The adapter is untrusted: everything here decodes strictly (no extra
//! properties anywhere) and carries at most one mutation channel —
//! `tactical_events` or `ability_uses`, never both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ability::AbilityUse;
use crate::tactical::TacticalEvent;

/// One rule citation justifying part of the envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Adjudication {
    pub rule_id: String,
    pub justification: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOp {
    #[default]
    Set,
    Merge,
    Remove,
}

/// A declarative update against the map or state documents. The engine
/// validates shape only; external collaborators (map editor, UI) consume
/// these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentUpdate {
    pub path: String,
    #[serde(default)]
    pub op: UpdateOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// The structured response the model returns for a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEnvelope {
    pub narration: String,
    #[serde(default)]
    pub adjudication: Vec<Adjudication>,
    #[serde(default)]
    pub map_updates: Vec<DocumentUpdate>,
    #[serde(default)]
    pub state_updates: Vec<DocumentUpdate>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tactical_events: Option<Vec<TacticalEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability_uses: Option<Vec<AbilityUse>>,
}

impl ModelEnvelope {
    /// A narration-only envelope, useful as a fixture skeleton.
    pub fn narration_only(narration: impl Into<String>) -> Self {
        Self {
            narration: narration.into(),
            adjudication: Vec::new(),
            map_updates: Vec::new(),
            state_updates: Vec::new(),
            questions: Vec::new(),
            tactical_events: None,
            ability_uses: None,
        }
    }

    /// True when both mutation channels are present — always illegal.
    pub fn has_conflicting_channels(&self) -> bool {
        self.tactical_events.is_some() && self.ability_uses.is_some()
    }

    pub fn tactical_events(&self) -> &[TacticalEvent] {
        self.tactical_events.as_deref().unwrap_or(&[])
    }

    pub fn ability_uses(&self) -> &[AbilityUse] {
        self.ability_uses.as_deref().unwrap_or(&[])
    }
}
