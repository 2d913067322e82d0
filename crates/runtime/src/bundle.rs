//! On-disk turn bundles.
//!
//! Each accepted turn becomes a directory of JSON documents. Writes go to
//! a temp path first and land with an atomic rename; the `*.latest.json`
//! pointers are replaced last, so readers never observe a half-written
//! turn.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_core::{EngineEvent, GameState, ModelEnvelope, SCHEMA_VERSION, state_hash};

use crate::adapter::Intent;
use crate::error::PipelineError;
use crate::rules::RulesReport;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundleMeta {
    pub bundle_id: String,
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The complete record of one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TurnBundle {
    pub meta: BundleMeta,
    pub intent: Intent,
    pub envelope: ModelEnvelope,
    pub initial_state: GameState,
    pub post_state: GameState,
    pub rules_report: RulesReport,
    pub events: Vec<EngineEvent>,
}

pub struct BundleStore {
    root: PathBuf,
}

impl BundleStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn latest_state_path(&self) -> PathBuf {
        self.root.join("game_state.latest.json")
    }

    pub fn latest_response_path(&self) -> PathBuf {
        self.root.join("ai_response.latest.json")
    }

    pub fn latest_rules_report_path(&self) -> PathBuf {
        self.root.join("rules_report.latest.json")
    }

    /// Derive a bundle identity from creation time and the initial state.
    pub fn bundle_id(created_at: &DateTime<Utc>, initial_state: &GameState) -> String {
        let hash = state_hash(initial_state);
        format!(
            "{}-{}",
            created_at.format("%Y%m%dT%H%M%S%3f"),
            &hash[..8]
        )
    }

    /// Write a bundle directory and flip the latest pointers.
    ///
    /// Returns the final bundle path. Partial writes stay behind a `.tmp-`
    /// prefix and are never visible under the final name.
    pub fn write(&self, bundle: &TurnBundle) -> Result<PathBuf, PipelineError> {
        let name = format!("turn-{}", bundle.meta.bundle_id);
        let final_dir = self.root.join(&name);
        let tmp_dir = self.root.join(format!(".tmp-{}", bundle.meta.bundle_id));

        let write_failed = |err: std::io::Error| PipelineError::BundleWrite(err.to_string());

        fs::create_dir_all(&tmp_dir).map_err(write_failed)?;

        let documents: [(&str, Value); 7] = [
            ("meta.json", serde_json::to_value(&bundle.meta)?),
            ("intent.json", serde_json::to_value(&bundle.intent)?),
            ("envelope.json", serde_json::to_value(&bundle.envelope)?),
            (
                "initial_state.json",
                serde_json::to_value(&bundle.initial_state)?,
            ),
            ("post_state.json", serde_json::to_value(&bundle.post_state)?),
            (
                "rules_report.json",
                serde_json::to_value(&bundle.rules_report)?,
            ),
            ("events.json", serde_json::to_value(&bundle.events)?),
        ];
        for (file_name, value) in &documents {
            let rendered = serde_json::to_string_pretty(value)?;
            fs::write(tmp_dir.join(file_name), rendered).map_err(write_failed)?;
        }

        fs::rename(&tmp_dir, &final_dir).map_err(write_failed)?;
        tracing::debug!(bundle = %name, "bundle directory committed");

        // Latest pointers land last, each atomically.
        self.write_latest(&self.latest_state_path(), &bundle.post_state)?;
        self.write_latest(&self.latest_response_path(), &bundle.envelope)?;
        self.write_latest(&self.latest_rules_report_path(), &bundle.rules_report)?;

        Ok(final_dir)
    }

    fn write_latest<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), PipelineError> {
        let tmp = path.with_extension("json.tmp");
        let rendered = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, rendered).map_err(|err| PipelineError::BundleWrite(err.to_string()))?;
        fs::rename(&tmp, path).map_err(|err| PipelineError::BundleWrite(err.to_string()))?;
        Ok(())
    }

    /// Read a bundle directory back.
    pub fn load(path: &Path) -> Result<TurnBundle, PipelineError> {
        let read = |file_name: &str| -> Result<String, PipelineError> {
            Ok(fs::read_to_string(path.join(file_name))?)
        };
        Ok(TurnBundle {
            meta: serde_json::from_str(&read("meta.json")?)?,
            intent: serde_json::from_str(&read("intent.json")?)?,
            envelope: serde_json::from_str(&read("envelope.json")?)?,
            initial_state: serde_json::from_str(&read("initial_state.json")?)?,
            post_state: serde_json::from_str(&read("post_state.json")?)?,
            rules_report: serde_json::from_str(&read("rules_report.json")?)?,
            events: serde_json::from_str(&read("events.json")?)?,
        })
    }
}

/// Convenience constructor for the meta document.
pub fn new_meta(created_at: DateTime<Utc>, initial_state: &GameState, request_id: Option<String>) -> BundleMeta {
    BundleMeta {
        bundle_id: BundleStore::bundle_id(&created_at, initial_state),
        created_at,
        schema_version: SCHEMA_VERSION.to_owned(),
        request_id,
    }
}
