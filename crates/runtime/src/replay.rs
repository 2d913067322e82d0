//! Replay bundle I/O around the core runner.

use std::path::Path;

use warden_core::replay::{ReplayBundle, ReplayReport, run_replay};

use crate::error::PipelineError;

/// Load a replay bundle from disk.
pub fn load_bundle(path: &Path) -> Result<ReplayBundle, PipelineError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Persist a replay bundle (pretty-printed, stable field order from the
/// typed model).
pub fn save_bundle(path: &Path, bundle: &ReplayBundle) -> Result<(), PipelineError> {
    let rendered = serde_json::to_string_pretty(bundle)?;
    std::fs::write(path, rendered)?;
    Ok(())
}

/// Load and run a replay bundle, logging the verdict.
pub fn replay_file(path: &Path) -> Result<ReplayReport, PipelineError> {
    let bundle = load_bundle(path)?;
    let report = run_replay(&bundle);
    if report.ok {
        tracing::info!(
            steps = bundle.steps.len(),
            final_hash = %report.final_state_hash,
            "replay verified"
        );
    } else {
        tracing::error!(
            failing_step = ?report.failing_step,
            errors = ?report.errors,
            "replay diverged"
        );
    }
    Ok(report)
}
