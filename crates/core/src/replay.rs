//! Deterministic replay verification.
//!
//! A replay bundle records an initial state and a sequence of actions with
//! expected event types and state hashes. The runner re-applies each step
//! and fails loudly on the first divergence — the conformance check behind
//! the determinism contract.

use serde::{Deserialize, Serialize};

use crate::action::{self, Action};
use crate::hash::state_hash;
use crate::invariant;
use crate::schema;
use crate::state::GameState;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplayMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One recorded step: the action plus what its application must produce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplayStep {
    pub action: Action,
    /// Expected event types, compared by length and type, strictly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_events: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_state_hash: Option<String>,
    /// When set, the step must be rejected with this code instead of
    /// succeeding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_rejection: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FinalExpectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_state_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplayBundle {
    #[serde(default)]
    pub meta: ReplayMeta,
    pub initial_state: GameState,
    pub steps: Vec<ReplayStep>,
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_expectation: Option<FinalExpectation>,
}

/// Result of a replay run.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayReport {
    pub ok: bool,
    /// Zero-based index of the first failing step, if any.
    pub failing_step: Option<usize>,
    pub errors: Vec<String>,
    pub final_state_hash: String,
    pub event_log: Vec<crate::event::EngineEvent>,
}

/// Replay a bundle step by step, verifying events, hashes, and invariants.
pub fn run_replay(bundle: &ReplayBundle) -> ReplayReport {
    let mut errors = Vec::new();
    let mut event_log = Vec::new();

    // The initial state must itself be well-formed before any step runs.
    if let Err(err) = schema::check_schema_version(&bundle.initial_state) {
        return failed_at(None, vec![err.to_string()], &bundle.initial_state, event_log);
    }
    let initial_violations = invariant::check_invariants(&bundle.initial_state);
    if !initial_violations.is_empty() {
        let messages = initial_violations
            .iter()
            .map(|violation| format!("{}: {}", violation.code.as_ref(), violation.message))
            .collect();
        return failed_at(None, messages, &bundle.initial_state, event_log);
    }

    let mut state = bundle.initial_state.clone();

    for (index, step) in bundle.steps.iter().enumerate() {
        let outcome = action::apply_action(&state, &step.action);

        if let Some(expected_code) = &step.expected_rejection {
            if outcome.success {
                errors.push(format!(
                    "step {index}: expected rejection '{expected_code}' but the action succeeded"
                ));
                return failed_at(Some(index), errors, &state, event_log);
            }
            let got = outcome.errors[0].code.as_ref().to_owned();
            if &got != expected_code {
                errors.push(format!(
                    "step {index}: expected rejection '{expected_code}', got '{got}'"
                ));
                return failed_at(Some(index), errors, &state, event_log);
            }
            // Rejected as recorded; the state is untouched by contract.
            continue;
        }

        if !outcome.success {
            let codes = outcome
                .errors
                .iter()
                .map(|rejection| rejection.code.as_ref())
                .collect::<Vec<_>>()
                .join(", ");
            errors.push(format!("step {index}: action rejected ({codes})"));
            return failed_at(Some(index), errors, &state, event_log);
        }

        event_log.extend(outcome.events.iter().cloned());

        if let Some(expected) = &step.expected_events {
            let produced: Vec<&str> = outcome
                .events
                .iter()
                .map(|event| event.event_type())
                .collect();
            if produced.len() != expected.len()
                || produced
                    .iter()
                    .zip(expected.iter())
                    .any(|(got, want)| got != want)
            {
                errors.push(format!(
                    "step {index}: events {produced:?} do not match expected {expected:?}"
                ));
                return failed_at(Some(index), errors, &outcome.state, event_log);
            }
        }

        let hash = state_hash(&outcome.state);
        if let Some(expected) = &step.expected_state_hash
            && &hash != expected
        {
            errors.push(format!(
                "step {index}: state hash mismatch: computed {hash}, recorded {expected}"
            ));
            return failed_at(Some(index), errors, &outcome.state, event_log);
        }

        let violations = invariant::check_invariants(&outcome.state);
        if !violations.is_empty() {
            for violation in &violations {
                errors.push(format!(
                    "step {index}: invariant {}: {}",
                    violation.code.as_ref(),
                    violation.message
                ));
            }
            return failed_at(Some(index), errors, &outcome.state, event_log);
        }

        state = outcome.state;
    }

    let final_state_hash = state_hash(&state);
    if let Some(final_expectation) = &bundle.final_expectation
        && let Some(expected) = &final_expectation.expected_state_hash
        && expected != &final_state_hash
    {
        errors.push(format!(
            "final state hash mismatch: computed {final_state_hash}, recorded {expected}"
        ));
        return ReplayReport {
            ok: false,
            failing_step: Some(bundle.steps.len()),
            errors,
            final_state_hash,
            event_log,
        };
    }

    ReplayReport {
        ok: true,
        failing_step: None,
        errors,
        final_state_hash,
        event_log,
    }
}

fn failed_at(
    failing_step: Option<usize>,
    errors: Vec<String>,
    state: &GameState,
    event_log: Vec<crate::event::EngineEvent>,
) -> ReplayReport {
    ReplayReport {
        ok: false,
        failing_step,
        errors,
        final_state_hash: state_hash(state),
        event_log,
    }
}

/// Record a bundle by running `actions` against `initial_state`, capturing
/// the produced event types and hashes as expectations.
///
/// The standard way to author a replay fixture: record once, verify
/// forever.
pub fn record_bundle(initial_state: &GameState, actions: &[Action]) -> ReplayBundle {
    let mut state = initial_state.clone();
    let mut steps = Vec::with_capacity(actions.len());

    for action in actions {
        let outcome = action::apply_action(&state, action);
        if outcome.success {
            steps.push(ReplayStep {
                action: action.clone(),
                expected_events: Some(
                    outcome
                        .events
                        .iter()
                        .map(|event| event.event_type().to_owned())
                        .collect(),
                ),
                expected_state_hash: Some(state_hash(&outcome.state)),
                expected_rejection: None,
            });
            state = outcome.state;
        } else {
            steps.push(ReplayStep {
                action: action.clone(),
                expected_events: None,
                expected_state_hash: None,
                expected_rejection: Some(outcome.errors[0].code.as_ref().to_owned()),
            });
        }
    }

    let final_hash = state_hash(&state);
    ReplayBundle {
        meta: ReplayMeta::default(),
        initial_state: initial_state.clone(),
        steps,
        final_expectation: Some(FinalExpectation {
            expected_state_hash: Some(final_hash),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{AttackAction, MoveAction};
    use crate::state::{
        Entity, EntityId, EntityKind, MapState, Position, RngState, SizeClass, Stats,
    };

    fn fighter(id: &str, kind: EntityKind, position: Position, hp: i64) -> Entity {
        Entity {
            id: EntityId::from(id),
            kind,
            name: id.to_owned(),
            size: SizeClass::M,
            position,
            stats: Stats {
                hp_current: hp,
                hp_max: hp,
                ac: 12,
                movement_speed: 6,
                attack_bonus: Some(3),
                damage_die: Some("1d6".to_owned()),
            },
            conditions: Vec::new(),
            condition_durations: Default::default(),
            ability_cooldowns: Default::default(),
            resources: Default::default(),
            inventory: Vec::new(),
            ability_ids: Vec::new(),
            controller: None,
        }
    }

    fn seeded_board() -> GameState {
        let mut state = GameState::new(MapState::open(10, 10));
        state.rng = RngState::seeded("replay-tests");
        state
            .entities
            .players
            .push(fighter("pc", EntityKind::Player, Position::new(2, 2), 20));
        state
            .entities
            .npcs
            .push(fighter("npc", EntityKind::Npc, Position::new(2, 3), 8));
        state
    }

    fn scripted_actions() -> Vec<Action> {
        vec![
            Action::RollInitiative,
            Action::Attack(AttackAction {
                attacker_id: EntityId::from("pc"),
                target_id: EntityId::from("npc"),
            }),
        ]
    }

    #[test]
    fn recorded_bundle_replays_clean() {
        let state = seeded_board();
        let bundle = record_bundle(&state, &scripted_actions());
        let report = run_replay(&bundle);
        assert!(report.ok, "errors: {:?}", report.errors);
        assert_eq!(report.failing_step, None);
        assert_eq!(
            Some(report.final_state_hash.as_str()),
            bundle
                .final_expectation
                .as_ref()
                .unwrap()
                .expected_state_hash
                .as_deref()
        );
    }

    #[test]
    fn corrupted_step_hash_fails_with_computed_value() {
        let state = seeded_board();
        let mut bundle = record_bundle(&state, &scripted_actions());

        // Flip one character of step 1's recorded hash.
        let recorded = bundle.steps[1].expected_state_hash.clone().unwrap();
        let mut corrupted = recorded.clone();
        let flipped = if corrupted.ends_with('0') { '1' } else { '0' };
        corrupted.pop();
        corrupted.push(flipped);
        bundle.steps[1].expected_state_hash = Some(corrupted);

        let report = run_replay(&bundle);
        assert!(!report.ok);
        assert_eq!(report.failing_step, Some(1));
        assert!(report.errors[0].contains("hash mismatch"));
        // The report carries the actually computed hash.
        assert_eq!(report.final_state_hash, recorded);
    }

    #[test]
    fn wrong_event_expectation_fails() {
        let state = seeded_board();
        let mut bundle = record_bundle(&state, &scripted_actions());
        bundle.steps[0].expected_events = Some(vec!["SEED_SET".to_owned()]);
        let report = run_replay(&bundle);
        assert!(!report.ok);
        assert_eq!(report.failing_step, Some(0));
    }

    #[test]
    fn expected_rejection_steps_pass_through() {
        let state = seeded_board();
        let actions = vec![Action::Move(MoveAction {
            entity_id: EntityId::from("pc"),
            path: vec![Position::new(2, 3)], // npc standing there
        })];
        let bundle = record_bundle(&state, &actions);
        assert_eq!(
            bundle.steps[0].expected_rejection.as_deref(),
            Some("MOVE_TILE_OCCUPIED")
        );
        let report = run_replay(&bundle);
        assert!(report.ok, "errors: {:?}", report.errors);
    }

    #[test]
    fn invalid_initial_state_fails_before_steps() {
        let mut state = seeded_board();
        state.schema_version = "9.0.0".to_owned();
        let bundle = record_bundle(&state, &[]);
        let report = run_replay(&bundle);
        assert!(!report.ok);
        assert_eq!(report.failing_step, None);
    }

    #[test]
    fn bundle_roundtrips_through_json() {
        let state = seeded_board();
        let bundle = record_bundle(&state, &scripted_actions());
        let json = serde_json::to_string(&bundle).unwrap();
        let decoded: ReplayBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, bundle);
        assert!(run_replay(&decoded).ok);
    }
}
