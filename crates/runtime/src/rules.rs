//! The rules-legality report.
//!
//! Every declared ability use and tactical event is judged against the
//! core validators; the report records both the allowed and the forbidden,
//! and the turn fails on any `error`-severity finding.

use serde::{Deserialize, Serialize};

use warden_core::{AbilityCatalogue, GameState, ModelEnvelope, ability, tactical};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Info,
    Warning,
    Error,
}

/// One judged item: an ability use, a tactical event, or the envelope
/// itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleFinding {
    /// The use_id or event_id the finding is about ("envelope" when global).
    pub subject: String,
    pub code: String,
    pub severity: RuleSeverity,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RulesReport {
    pub ok: bool,
    pub findings: Vec<RuleFinding>,
}

impl RulesReport {
    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == RuleSeverity::Error)
            .count()
    }
}

/// Judge an envelope's mutation channel against the current state.
pub fn evaluate_rules(state: &GameState, envelope: &ModelEnvelope) -> RulesReport {
    let mut findings = Vec::new();

    let uses = envelope.ability_uses();
    if !uses.is_empty() {
        let catalogue = AbilityCatalogue::for_state(state);
        let violations = ability::validate_uses(state, &catalogue, uses);

        for violation in &violations {
            findings.push(RuleFinding {
                subject: violation.use_id.clone(),
                code: violation.code.as_ref().to_owned(),
                severity: RuleSeverity::Error,
                message: violation.message.clone(),
            });
        }
        for ability_use in uses {
            let clean = violations
                .iter()
                .all(|violation| violation.use_id != ability_use.use_id);
            if clean {
                findings.push(RuleFinding {
                    subject: ability_use.use_id.clone(),
                    code: "ABILITY_USE_LEGAL".to_owned(),
                    severity: RuleSeverity::Info,
                    message: format!(
                        "'{}' by '{}' is legal",
                        ability_use.ability_id, ability_use.actor_id
                    ),
                });
            }
        }
    }

    let events = envelope.tactical_events();
    if !events.is_empty() {
        let violations = tactical::validate_events(state, events);

        for violation in &violations {
            findings.push(RuleFinding {
                subject: violation.event_id.clone(),
                code: violation.code.as_ref().to_owned(),
                severity: RuleSeverity::Error,
                message: violation.message.clone(),
            });
        }
        for event in events {
            let clean = violations
                .iter()
                .all(|violation| violation.event_id != event.event_id());
            if clean {
                findings.push(RuleFinding {
                    subject: event.event_id().to_owned(),
                    code: "TACTICAL_EVENT_LEGAL".to_owned(),
                    severity: RuleSeverity::Info,
                    message: format!("event '{}' is consistent with state", event.event_id()),
                });
            }
        }
    }

    let ok = !findings
        .iter()
        .any(|finding| finding.severity == RuleSeverity::Error);
    RulesReport { ok, findings }
}
