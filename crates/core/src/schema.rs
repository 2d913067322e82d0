//! Structural validation of states and envelopes.
//!
//! The schema *is* the closed Rust type: every object level decodes with
//! `deny_unknown_fields`, so an extra property anywhere fails the decode.
//! This module wraps those decodes with stable error codes, adds the
//! semantic checks serde cannot express, and gates the schema version.

use serde_json::Value;
use thiserror::Error;

use crate::envelope::ModelEnvelope;
use crate::state::{GameState, SCHEMA_VERSION};

/// A structural or semantic schema violation, with a path locating it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("game state failed schema validation ({})", summarize(.0))]
    StateInvalid(Vec<SchemaViolation>),

    #[error("model envelope failed schema validation ({})", summarize(.0))]
    EnvelopeInvalid(Vec<SchemaViolation>),

    #[error("schema version '{found}' is incompatible with '{supported}'")]
    VersionMismatch { found: String, supported: String },
}

impl SchemaError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::StateInvalid(_) => "SCHEMA_INVALID",
            Self::EnvelopeInvalid(_) => "RESPONSE_SCHEMA_INVALID",
            Self::VersionMismatch { .. } => "SCHEMA_VERSION_MISMATCH",
        }
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        match self {
            Self::StateInvalid(violations) | Self::EnvelopeInvalid(violations) => violations,
            Self::VersionMismatch { .. } => &[],
        }
    }
}

fn summarize(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{}: {}", violation.path, violation.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of the version gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionCheck {
    Ok,
    /// Minor or patch drift: accepted with a warning.
    MinorDrift { found: String },
}

fn semver_parts(version: &str) -> Option<(u64, u64)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Gate the state's schema version against this engine's.
///
/// Differing MAJOR refuses the state; differing MINOR (or patch) passes
/// with a drift marker the caller should log.
pub fn check_schema_version(state: &GameState) -> Result<VersionCheck, SchemaError> {
    let mismatch = || SchemaError::VersionMismatch {
        found: state.schema_version.clone(),
        supported: SCHEMA_VERSION.to_owned(),
    };

    let (found_major, found_minor) = semver_parts(&state.schema_version).ok_or_else(mismatch)?;
    let (supported_major, supported_minor) =
        semver_parts(SCHEMA_VERSION).expect("engine schema version is well-formed");

    if found_major != supported_major {
        return Err(mismatch());
    }
    if found_minor != supported_minor || state.schema_version != SCHEMA_VERSION {
        return Ok(VersionCheck::MinorDrift {
            found: state.schema_version.clone(),
        });
    }
    Ok(VersionCheck::Ok)
}

/// Decode a game state from raw JSON, strictly.
pub fn decode_state(value: &Value) -> Result<GameState, SchemaError> {
    serde_json::from_value(value.clone())
        .map_err(|err| SchemaError::StateInvalid(vec![SchemaViolation::new("$", err.to_string())]))
}

/// Decode a model envelope from raw JSON, strictly, then run the semantic
/// envelope checks against the state it addresses.
pub fn decode_envelope(value: &Value, state: &GameState) -> Result<ModelEnvelope, SchemaError> {
    let envelope: ModelEnvelope = serde_json::from_value(value.clone()).map_err(|err| {
        SchemaError::EnvelopeInvalid(vec![SchemaViolation::new("$", err.to_string())])
    })?;

    let violations = validate_envelope(&envelope, state);
    if !violations.is_empty() {
        return Err(SchemaError::EnvelopeInvalid(violations));
    }
    Ok(envelope)
}

/// Semantic envelope rules: channel exclusivity and reference resolution.
pub fn validate_envelope(envelope: &ModelEnvelope, state: &GameState) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    if envelope.has_conflicting_channels() {
        violations.push(SchemaViolation::new(
            "$",
            "envelope carries both tactical_events and ability_uses",
        ));
    }

    for (index, tactical) in envelope.tactical_events().iter().enumerate() {
        if !state.entities.contains(tactical.actor_id()) {
            violations.push(SchemaViolation::new(
                format!("$.tactical_events[{index}].actor_id"),
                format!("entity '{}' does not exist", tactical.actor_id()),
            ));
        }
    }

    for (index, ability_use) in envelope.ability_uses().iter().enumerate() {
        if !state.entities.contains(&ability_use.actor_id) {
            violations.push(SchemaViolation::new(
                format!("$.ability_uses[{index}].actor_id"),
                format!("entity '{}' does not exist", ability_use.actor_id),
            ));
        }
        for (target_index, target_id) in ability_use.target_ids.iter().enumerate() {
            if !state.entities.contains(target_id) {
                violations.push(SchemaViolation::new(
                    format!("$.ability_uses[{index}].target_ids[{target_index}]"),
                    format!("entity '{target_id}' does not exist"),
                ));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MapState;
    use serde_json::json;

    fn minimal_state() -> GameState {
        GameState::new(MapState::open(4, 4))
    }

    #[test]
    fn state_roundtrip_survives_strict_decode() {
        let state = minimal_state();
        let value = serde_json::to_value(&state).unwrap();
        let decoded = decode_state(&value).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn extra_property_is_rejected() {
        let mut value = serde_json::to_value(minimal_state()).unwrap();
        value["surprise"] = json!(1);
        let err = decode_state(&value).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_INVALID");
    }

    #[test]
    fn nested_extra_property_is_rejected() {
        let mut value = serde_json::to_value(minimal_state()).unwrap();
        value["combat"]["surprise"] = json!(true);
        assert!(decode_state(&value).is_err());
    }

    #[test]
    fn version_gate_major_refuses_minor_warns() {
        let mut state = minimal_state();
        state.schema_version = "2.0.0".to_owned();
        assert!(check_schema_version(&state).is_err());

        state.schema_version = "1.1.0".to_owned();
        assert_eq!(
            check_schema_version(&state).unwrap(),
            VersionCheck::MinorDrift {
                found: "1.1.0".to_owned()
            }
        );

        state.schema_version = "1.0.0".to_owned();
        assert_eq!(check_schema_version(&state).unwrap(), VersionCheck::Ok);

        state.schema_version = "bogus".to_owned();
        assert!(check_schema_version(&state).is_err());
    }

    #[test]
    fn envelope_channel_exclusivity() {
        let state = minimal_state();
        let value = json!({
            "narration": "both channels",
            "adjudication": [],
            "map_updates": [],
            "state_updates": [],
            "questions": [],
            "tactical_events": [],
            "ability_uses": []
        });
        let err = decode_envelope(&value, &state).unwrap_err();
        assert_eq!(err.code(), "RESPONSE_SCHEMA_INVALID");
        assert!(err.violations()[0].message.contains("both"));
    }

    #[test]
    fn envelope_rejects_unknown_entity_references() {
        let state = minimal_state();
        let value = json!({
            "narration": "ghost swings",
            "tactical_events": [{
                "type": "DAMAGE",
                "event_id": "e1",
                "actor_id": "ghost",
                "target_id": "ghost",
                "value": 3
            }]
        });
        let err = decode_envelope(&value, &state).unwrap_err();
        assert_eq!(err.code(), "RESPONSE_SCHEMA_INVALID");
        assert!(err.violations()[0].path.contains("tactical_events[0]"));
    }

    #[test]
    fn envelope_rejects_extra_properties() {
        let state = minimal_state();
        let value = json!({
            "narration": "hi",
            "mood": "ominous"
        });
        assert!(decode_envelope(&value, &state).is_err());
    }
}
