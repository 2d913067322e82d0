//! The turn pipeline: one intent in, one validated bundle out (or none).
//!
//! The pipeline wraps the pure core with the side-effectful edges: state
//! load, the adapter call, and the bundle write. Gates run inline in the
//! order the gatekeeper reviews them; the first failure short-circuits the
//! turn and leaves the previous `latest` pointers untouched.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use warden_core::{
    EngineEvent, GameState, ModelEnvelope, RngState, VersionCheck, ability, check_invariants,
    check_schema_version, decode_envelope, decode_state, tactical,
};

use crate::adapter::{AdapterError, Intent, ModelAdapter};
use crate::bundle::{BundleStore, TurnBundle, new_meta};
use crate::error::PipelineError;
use crate::gatekeeper::GateId;
use crate::rules::{self, RulesReport};

pub struct TurnPipeline {
    adapter: Arc<dyn ModelAdapter>,
    store: BundleStore,
    adapter_timeout: Duration,
}

/// One turn request against a file-backed state.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub state_path: PathBuf,
    pub intent: Intent,
    pub seed: Option<u64>,
    /// Read the envelope from this file instead of calling the adapter.
    pub fixture: Option<PathBuf>,
    pub request_id: Option<String>,
}

/// What a turn produced, success or not.
#[derive(Debug)]
pub struct TurnOutcome {
    pub ok: bool,
    pub bundle_path: Option<PathBuf>,
    pub bundle_name: Option<String>,
    pub failure_gate: Option<GateId>,
    pub violations: Vec<String>,
    pub log: Vec<String>,
    pub error: Option<String>,
}

impl TurnOutcome {
    fn failed(gate: GateId, violations: Vec<String>, log: Vec<String>) -> Self {
        Self {
            ok: false,
            bundle_path: None,
            bundle_name: None,
            failure_gate: Some(gate),
            violations,
            log,
            error: None,
        }
    }
}

impl TurnPipeline {
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        store: BundleStore,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            adapter,
            store,
            adapter_timeout,
        }
    }

    pub fn store(&self) -> &BundleStore {
        &self.store
    }

    /// Drive one complete turn.
    pub async fn run_turn(&self, request: &TurnRequest) -> TurnOutcome {
        let mut log = Vec::new();

        // 1. Load and schema-validate the state.
        let state = match self.load_state(request, &mut log) {
            Ok(state) => state,
            Err(outcome) => return *outcome,
        };

        // 2. Obtain the envelope (fixture or adapter), untrusted either way.
        let envelope_json = match self.obtain_envelope(&state, request, &mut log).await {
            Ok(value) => value,
            Err(outcome) => return *outcome,
        };

        // 3. Envelope schema gate.
        let envelope = match decode_envelope(&envelope_json, &state) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(code = err.code(), "envelope rejected by schema gate");
                return TurnOutcome::failed(
                    GateId::ResponseSchema,
                    err.violations()
                        .iter()
                        .map(|violation| format!("{}: {}", violation.path, violation.message))
                        .collect(),
                    log,
                );
            }
        };
        log.push("envelope schema: pass".to_owned());

        // 4. Rules-legality gate.
        let rules_report = rules::evaluate_rules(&state, &envelope);
        if !rules_report.ok {
            tracing::warn!(
                errors = rules_report.error_count(),
                "turn rejected by rules gate"
            );
            return TurnOutcome::failed(
                GateId::RulesLegality,
                rules_report
                    .findings
                    .iter()
                    .filter(|finding| finding.severity == rules::RuleSeverity::Error)
                    .map(|finding| format!("{}: {}", finding.code, finding.message))
                    .collect(),
                log,
            );
        }
        log.push(format!(
            "rules legality: pass ({} findings)",
            rules_report.findings.len()
        ));

        // 5. Apply exactly one mutation channel.
        let (post_state, events) = match self.apply_channel(&state, &envelope, &mut log) {
            Ok(applied) => applied,
            Err(outcome) => return *outcome,
        };

        // 6. Invariant gate on the post-state.
        let violations = check_invariants(&post_state);
        if !violations.is_empty() {
            tracing::error!(count = violations.len(), "post-state failed invariants");
            return TurnOutcome::failed(
                GateId::Invariants,
                violations
                    .iter()
                    .map(|violation| {
                        format!("{}: {}", violation.code.as_ref(), violation.message)
                    })
                    .collect(),
                log,
            );
        }
        log.push("invariants: pass".to_owned());

        // 7. Persist the bundle; latest pointers flip only on full success.
        self.persist(request, &state, &envelope, post_state, rules_report, events, log)
            .unwrap_or_else(|(err, log)| TurnOutcome {
                ok: false,
                bundle_path: None,
                bundle_name: None,
                failure_gate: Some(GateId::BundleWrite),
                violations: vec![err.to_string()],
                log,
                error: Some(err.code().to_owned()),
            })
    }

    fn load_state(
        &self,
        request: &TurnRequest,
        log: &mut Vec<String>,
    ) -> Result<GameState, Box<TurnOutcome>> {
        let raw = match std::fs::read_to_string(&request.state_path) {
            Ok(raw) => raw,
            Err(err) => {
                return Err(Box::new(TurnOutcome::failed(
                    GateId::StateSchema,
                    vec![format!(
                        "cannot read state file {}: {err}",
                        request.state_path.display()
                    )],
                    std::mem::take(log),
                )));
            }
        };
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                return Err(Box::new(TurnOutcome::failed(
                    GateId::StateSchema,
                    vec![format!("state file is not JSON: {err}")],
                    std::mem::take(log),
                )));
            }
        };
        let mut state = match decode_state(&value) {
            Ok(state) => state,
            Err(err) => {
                return Err(Box::new(TurnOutcome::failed(
                    GateId::StateSchema,
                    err.violations()
                        .iter()
                        .map(|violation| format!("{}: {}", violation.path, violation.message))
                        .collect(),
                    std::mem::take(log),
                )));
            }
        };

        match check_schema_version(&state) {
            Ok(VersionCheck::Ok) => {}
            Ok(VersionCheck::MinorDrift { found }) => {
                tracing::warn!(found = %found, "schema version drift accepted");
                log.push(format!("schema version drift: '{found}'"));
            }
            Err(err) => {
                return Err(Box::new(TurnOutcome::failed(
                    GateId::SchemaVersion,
                    vec![err.to_string()],
                    std::mem::take(log),
                )));
            }
        }
        log.push("state schema: pass".to_owned());

        if let Some(seed) = request.seed {
            state.rng = RngState::seeded(seed.to_string());
            log.push(format!("rng re-seeded with '{seed}'"));
        }

        Ok(state)
    }

    async fn obtain_envelope(
        &self,
        state: &GameState,
        request: &TurnRequest,
        log: &mut Vec<String>,
    ) -> Result<Value, Box<TurnOutcome>> {
        if let Some(fixture) = &request.fixture {
            let raw = std::fs::read_to_string(fixture).map_err(|err| {
                Box::new(TurnOutcome::failed(
                    GateId::Adapter,
                    vec![format!("cannot read fixture {}: {err}", fixture.display())],
                    log.clone(),
                ))
            })?;
            let value = serde_json::from_str(&raw).map_err(|err| {
                Box::new(TurnOutcome::failed(
                    GateId::Adapter,
                    vec![format!("fixture is not JSON: {err}")],
                    log.clone(),
                ))
            })?;
            log.push(format!("envelope from fixture {}", fixture.display()));
            return Ok(value);
        }

        let proposal = tokio::time::timeout(
            self.adapter_timeout,
            self.adapter.propose(state, &request.intent, request.seed),
        )
        .await;

        match proposal {
            Err(_) => {
                let err = AdapterError::Timeout {
                    adapter: self.adapter.name().to_owned(),
                    timeout: self.adapter_timeout,
                };
                tracing::error!(%err, "adapter timed out");
                let mut outcome =
                    TurnOutcome::failed(GateId::Adapter, vec![err.to_string()], log.clone());
                outcome.error = Some("ADAPTER_TIMEOUT".to_owned());
                Err(Box::new(outcome))
            }
            Ok(Err(err)) => {
                tracing::error!(%err, "adapter failed");
                let mut outcome =
                    TurnOutcome::failed(GateId::Adapter, vec![err.to_string()], log.clone());
                outcome.error = Some("ADAPTER_ERROR".to_owned());
                Err(Box::new(outcome))
            }
            Ok(Ok(value)) => {
                log.push(format!("envelope from adapter '{}'", self.adapter.name()));
                Ok(value)
            }
        }
    }

    fn apply_channel(
        &self,
        state: &GameState,
        envelope: &ModelEnvelope,
        log: &mut Vec<String>,
    ) -> Result<(GameState, Vec<EngineEvent>), Box<TurnOutcome>> {
        let mut seq = state.log.sequence();

        let (mut post, events) = if !envelope.tactical_events().is_empty() {
            match tactical::apply_events(state, envelope.tactical_events(), &mut seq) {
                Ok(applied) => applied,
                Err(err) => {
                    tracing::warn!(code = err.code(), "tactical batch rejected at apply");
                    return Err(Box::new(TurnOutcome::failed(
                        GateId::RulesLegality,
                        vec![format!("{}: {err}", err.code())],
                        std::mem::take(log),
                    )));
                }
            }
        } else if !envelope.ability_uses().is_empty() {
            let catalogue = ability::AbilityCatalogue::for_state(state);
            match ability::resolve_uses(state, &catalogue, envelope.ability_uses(), &mut seq) {
                Ok(applied) => applied,
                Err(err) => {
                    return Err(Box::new(TurnOutcome::failed(
                        GateId::RulesLegality,
                        vec![err.to_string()],
                        std::mem::take(log),
                    )));
                }
            }
        } else {
            log.push("no mutation channel; narration-only turn".to_owned());
            (state.clone(), Vec::new())
        };

        for event in &events {
            if let EngineEvent::HealApplied(heal) = event
                && heal.actual_heal == 0
                && heal.amount > 0
            {
                tracing::warn!(target_id = %heal.target_id, "heal had no effect");
            }
        }

        post.log.append(&events);
        log.push(format!("applied {} event(s)", events.len()));
        Ok((post, events))
    }

    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        request: &TurnRequest,
        initial_state: &GameState,
        envelope: &ModelEnvelope,
        post_state: GameState,
        rules_report: RulesReport,
        events: Vec<EngineEvent>,
        mut log: Vec<String>,
    ) -> Result<TurnOutcome, (PipelineError, Vec<String>)> {
        let bundle = TurnBundle {
            meta: new_meta(Utc::now(), initial_state, request.request_id.clone()),
            intent: request.intent.clone(),
            envelope: envelope.clone(),
            initial_state: initial_state.clone(),
            post_state,
            rules_report,
            events,
        };

        let bundle_path = match self.store.write(&bundle) {
            Ok(path) => path,
            Err(err) => return Err((err, log)),
        };
        let bundle_name = bundle_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        log.push(format!("bundle written to {}", bundle_path.display()));
        tracing::info!(bundle = ?bundle_name, "turn accepted");

        Ok(TurnOutcome {
            ok: true,
            bundle_path: Some(bundle_path),
            bundle_name,
            failure_gate: None,
            violations: Vec::new(),
            log,
            error: None,
        })
    }
}
