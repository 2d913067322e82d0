//! Sequential acceptance gates over completed turn outputs.
//!
//! Five gates, in order: envelope schema, rules legality, schema version,
//! state schema, invariants. A failing gate marks the rest SKIP; warnings
//! never fail the run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_core::{GameState, VersionCheck, check_invariants, check_schema_version, decode_envelope, decode_state};

use crate::rules::RulesReport;

/// Identifies a pipeline gate. The gatekeeper runs the five review gates;
/// the pipeline reuses the same ids (plus the adapter and bundle-write
/// edges) for its `failure_gate` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateId {
    Adapter,
    ResponseSchema,
    RulesLegality,
    SchemaVersion,
    StateSchema,
    Invariants,
    BundleWrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    Pass,
    Fail,
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateOutcome {
    pub gate: GateId,
    pub status: GateStatus,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatekeeperReport {
    pub ok: bool,
    pub gates: Vec<GateOutcome>,
}

impl GatekeeperReport {
    pub fn failure_gate(&self) -> Option<GateId> {
        self.gates
            .iter()
            .find(|outcome| outcome.status == GateStatus::Fail)
            .map(|outcome| outcome.gate)
    }
}

/// Everything the gatekeeper reviews: the raw envelope, the state it was
/// produced against, the rules report, and the resulting post-state.
pub struct GateInputs<'a> {
    pub envelope_json: &'a Value,
    pub initial_state: &'a GameState,
    pub rules_report: &'a RulesReport,
    pub post_state: &'a GameState,
}

/// Run the five review gates in order.
pub fn run_gates(inputs: &GateInputs<'_>) -> GatekeeperReport {
    let mut gates: Vec<GateOutcome> = Vec::with_capacity(5);
    let mut failed = false;

    let run = |gate: GateId,
                   gates: &mut Vec<GateOutcome>,
                   failed: &mut bool,
                   check: &dyn Fn() -> (Vec<String>, Vec<String>)| {
        if *failed {
            gates.push(GateOutcome {
                gate,
                status: GateStatus::Skip,
                violations: Vec::new(),
                warnings: Vec::new(),
            });
            return;
        }
        let (violations, warnings) = check();
        let status = if violations.is_empty() {
            GateStatus::Pass
        } else {
            *failed = true;
            GateStatus::Fail
        };
        gates.push(GateOutcome {
            gate,
            status,
            violations,
            warnings,
        });
    };

    run(GateId::ResponseSchema, &mut gates, &mut failed, &|| {
        match decode_envelope(inputs.envelope_json, inputs.initial_state) {
            Ok(_) => (Vec::new(), Vec::new()),
            Err(err) => (
                err.violations()
                    .iter()
                    .map(|violation| format!("{}: {}", violation.path, violation.message))
                    .collect(),
                Vec::new(),
            ),
        }
    });

    run(GateId::RulesLegality, &mut gates, &mut failed, &|| {
        if inputs.rules_report.ok {
            (Vec::new(), Vec::new())
        } else {
            (
                inputs
                    .rules_report
                    .findings
                    .iter()
                    .filter(|finding| {
                        finding.severity == crate::rules::RuleSeverity::Error
                    })
                    .map(|finding| format!("{}: {}", finding.code, finding.message))
                    .collect(),
                Vec::new(),
            )
        }
    });

    run(GateId::SchemaVersion, &mut gates, &mut failed, &|| {
        match check_schema_version(inputs.post_state) {
            Ok(VersionCheck::Ok) => (Vec::new(), Vec::new()),
            Ok(VersionCheck::MinorDrift { found }) => (
                Vec::new(),
                vec![format!("schema version drift: state carries '{found}'")],
            ),
            Err(err) => (vec![err.to_string()], Vec::new()),
        }
    });

    run(GateId::StateSchema, &mut gates, &mut failed, &|| {
        // Round-trip the post-state through the strict decoder; a state the
        // engine cannot re-read must not be committed.
        let value = match serde_json::to_value(inputs.post_state) {
            Ok(value) => value,
            Err(err) => return (vec![err.to_string()], Vec::new()),
        };
        match decode_state(&value) {
            Ok(_) => (Vec::new(), Vec::new()),
            Err(err) => (vec![err.to_string()], Vec::new()),
        }
    });

    run(GateId::Invariants, &mut gates, &mut failed, &|| {
        (
            check_invariants(inputs.post_state)
                .iter()
                .map(|violation| {
                    format!("{}: {}", violation.code.as_ref(), violation.message)
                })
                .collect(),
            Vec::new(),
        )
    });

    GatekeeperReport { ok: !failed, gates }
}
