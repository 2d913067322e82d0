//! The adapter boundary: the single async edge into the synchronous core.
//!
//! An adapter turns `(state, intent, seed)` into a raw JSON envelope. The
//! output is untrusted by contract — everything it returns goes through
//! the strict envelope gates before any state change.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use warden_core::GameState;

/// The player's declared intention for the turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Intent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: String,
}

impl Intent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            speaker: None,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter '{adapter}' timed out after {timeout:?}")]
    Timeout { adapter: String, timeout: Duration },

    #[error("adapter '{adapter}' failed: {message}")]
    Failed { adapter: String, message: String },

    #[error("adapter '{adapter}' returned malformed JSON: {message}")]
    Malformed { adapter: String, message: String },
}

/// Produces a model envelope for a turn. Implementations may call out to
/// an LLM, read fixtures, or synthesize responses for tests.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Propose an envelope for the given state and intent. The returned
    /// value is raw JSON; the pipeline owns validation.
    async fn propose(
        &self,
        state: &GameState,
        intent: &Intent,
        seed: Option<u64>,
    ) -> Result<Value, AdapterError>;
}

/// Reads a pre-recorded envelope from disk. The standard adapter for
/// deterministic runs and CI.
#[derive(Clone, Debug)]
pub struct FixtureAdapter {
    path: PathBuf,
}

impl FixtureAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ModelAdapter for FixtureAdapter {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn propose(
        &self,
        _state: &GameState,
        _intent: &Intent,
        _seed: Option<u64>,
    ) -> Result<Value, AdapterError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| AdapterError::Failed {
                adapter: self.name().to_owned(),
                message: format!("cannot read fixture {}: {err}", self.path.display()),
            })?;
        serde_json::from_str(&raw).map_err(|err| AdapterError::Malformed {
            adapter: self.name().to_owned(),
            message: err.to_string(),
        })
    }
}

/// Returns a fixed value; test scaffolding.
#[derive(Clone, Debug)]
pub struct StaticAdapter {
    envelope: Value,
}

impl StaticAdapter {
    pub fn new(envelope: Value) -> Self {
        Self { envelope }
    }
}

#[async_trait]
impl ModelAdapter for StaticAdapter {
    fn name(&self) -> &str {
        "static"
    }

    async fn propose(
        &self,
        _state: &GameState,
        _intent: &Intent,
        _seed: Option<u64>,
    ) -> Result<Value, AdapterError> {
        Ok(self.envelope.clone())
    }
}
