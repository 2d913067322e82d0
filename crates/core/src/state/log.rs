//! Ordered event log carried inside the game state.

use serde::{Deserialize, Serialize};

use crate::event::{EngineEvent, EventSeq};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventLog {
    #[serde(default)]
    pub events: Vec<EngineEvent>,
}

impl EventLog {
    /// Sequence allocator continuing after the last logged event.
    ///
    /// Basing the next sequence on the last timestamp (not the vec length)
    /// keeps ids unique even if older entries are ever compacted away.
    pub fn sequence(&self) -> EventSeq {
        let next = self
            .events
            .last()
            .map(|event| event.timestamp() + 1)
            .unwrap_or(0);
        EventSeq::starting_at(next)
    }

    pub fn append(&mut self, events: &[EngineEvent]) {
        self.events.extend_from_slice(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
