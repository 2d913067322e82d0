//! Persisted RNG state: seed, draw counter, and the roll audit trail.

use serde::{Deserialize, Serialize};

/// Most recent roll records retained in state. The cap bounds state growth
/// and never affects the draw counter.
pub const MAX_ROLL_RECORDS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RngMode {
    Seeded,
    Unseeded,
}

/// Audit record for a single draw.
///
/// `counter_before`/`counter_after` bracket the raw u32s consumed, so a
/// replay can verify the stream was consumed without gaps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RollRecord {
    pub kind: String,
    pub request: String,
    pub result_total: i64,
    pub raw_draws: Vec<u32>,
    pub counter_before: u64,
    pub counter_after: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RngState {
    pub mode: RngMode,
    pub seed: Option<String>,
    pub counter: u64,
    #[serde(default)]
    pub last_rolls: Vec<RollRecord>,
}

impl RngState {
    pub fn seeded(seed: impl Into<String>) -> Self {
        Self {
            mode: RngMode::Seeded,
            seed: Some(seed.into()),
            counter: 0,
            last_rolls: Vec::new(),
        }
    }

    pub fn unseeded() -> Self {
        Self {
            mode: RngMode::Unseeded,
            seed: None,
            counter: 0,
            last_rolls: Vec::new(),
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.mode == RngMode::Seeded
    }

    /// Append a roll record, evicting the oldest past the retention cap.
    pub fn record(&mut self, record: RollRecord) {
        self.last_rolls.push(record);
        if self.last_rolls.len() > MAX_ROLL_RECORDS {
            let excess = self.last_rolls.len() - MAX_ROLL_RECORDS;
            self.last_rolls.drain(..excess);
        }
    }
}

impl Default for RngState {
    fn default() -> Self {
        Self::unseeded()
    }
}
