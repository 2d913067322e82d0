//! End-to-end turn pipeline tests: gates, bundles, and failure routing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use warden_core::{EntityId, GameState, state_hash};
use warden_runtime::{
    BundleStore, FixtureAdapter, GateId, GateInputs, GateStatus, Intent, ModelAdapter,
    StaticAdapter, TurnPipeline, TurnRequest, evaluate_rules, run_gates,
};

use common::{fireball_envelope, skirmish_state, write_json};

fn pipeline_with(adapter: Arc<dyn ModelAdapter>, root: &std::path::Path) -> TurnPipeline {
    let store = BundleStore::new(root.join("bundles")).unwrap();
    TurnPipeline::new(adapter, store, Duration::from_secs(5))
}

fn request(state_path: std::path::PathBuf) -> TurnRequest {
    TurnRequest {
        state_path,
        intent: Intent::new("I hurl a fireball at the goblin"),
        seed: None,
        fixture: None,
        request_id: Some("req-1".to_owned()),
    }
}

#[tokio::test]
async fn accepted_turn_writes_a_complete_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = write_json(&dir.path().join("state.json"), &skirmish_state());

    let pipeline = pipeline_with(Arc::new(StaticAdapter::new(fireball_envelope())), dir.path());
    let outcome = pipeline.run_turn(&request(state_path)).await;

    assert!(outcome.ok, "violations: {:?}", outcome.violations);
    assert!(outcome.failure_gate.is_none());

    let bundle_path = outcome.bundle_path.unwrap();
    for file in [
        "meta.json",
        "intent.json",
        "envelope.json",
        "initial_state.json",
        "post_state.json",
        "rules_report.json",
        "events.json",
    ] {
        assert!(bundle_path.join(file).exists(), "missing {file}");
    }

    // The latest pointer reflects the post state: goblin took 8 damage.
    let latest: GameState = serde_json::from_str(
        &std::fs::read_to_string(pipeline.store().latest_state_path()).unwrap(),
    )
    .unwrap();
    let goblin = latest.entity(&EntityId::from("npc-1")).unwrap();
    assert_eq!(goblin.stats.hp_current, 0);
    assert!(goblin.has_condition("dead"));
    assert_eq!(
        latest.entity(&EntityId::from("pc-a")).unwrap().resource("mana"),
        1
    );
}

#[tokio::test]
async fn narration_only_turn_commits_the_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let state = skirmish_state();
    let state_path = write_json(&dir.path().join("state.json"), &state);

    let envelope =
        serde_json::to_value(warden_core::ModelEnvelope::narration_only("The party rests."))
            .unwrap();
    let pipeline = pipeline_with(Arc::new(StaticAdapter::new(envelope)), dir.path());
    let outcome = pipeline.run_turn(&request(state_path)).await;
    assert!(outcome.ok, "violations: {:?}", outcome.violations);

    let latest: GameState = serde_json::from_str(
        &std::fs::read_to_string(pipeline.store().latest_state_path()).unwrap(),
    )
    .unwrap();
    assert_eq!(state_hash(&latest), state_hash(&state));
}

#[tokio::test]
async fn conflicting_channels_fail_the_envelope_gate() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = write_json(&dir.path().join("state.json"), &skirmish_state());

    let mut envelope = fireball_envelope();
    envelope["tactical_events"] = json!([]);

    let pipeline = pipeline_with(Arc::new(StaticAdapter::new(envelope)), dir.path());
    let outcome = pipeline.run_turn(&request(state_path)).await;

    assert!(!outcome.ok);
    assert_eq!(outcome.failure_gate, Some(GateId::ResponseSchema));
    assert!(!pipeline.store().latest_state_path().exists());
}

#[tokio::test]
async fn compound_cost_fails_the_rules_gate_without_commit() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = write_json(&dir.path().join("state.json"), &skirmish_state());

    // Two fireballs at 4 mana each against a pool of 5.
    let mut envelope = fireball_envelope();
    envelope["ability_uses"] = json!([
        {"use_id": "fb-1", "actor_id": "pc-a", "ability_id": "fireball", "target_ids": ["npc-1"]},
        {"use_id": "fb-2", "actor_id": "pc-a", "ability_id": "fireball", "target_ids": ["npc-1"]}
    ]);

    let pipeline = pipeline_with(Arc::new(StaticAdapter::new(envelope)), dir.path());
    let outcome = pipeline.run_turn(&request(state_path)).await;

    assert!(!outcome.ok);
    assert_eq!(outcome.failure_gate, Some(GateId::RulesLegality));
    assert!(
        outcome
            .violations
            .iter()
            .any(|violation| violation.contains("ABILITY_COST_INSUFFICIENT"))
    );
    assert!(!pipeline.store().latest_state_path().exists());
}

#[tokio::test]
async fn tactical_channel_applies_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = write_json(&dir.path().join("state.json"), &skirmish_state());

    let envelope = json!({
        "narration": "The goblin staggers back, bleeding.",
        "tactical_events": [
            {"type": "MOVE", "event_id": "t1", "actor_id": "npc-1",
             "position_before": {"x": 4, "y": 2}, "position_after": {"x": 5, "y": 2}},
            {"type": "DAMAGE", "event_id": "t2", "actor_id": "pc-a",
             "target_id": "npc-1", "value": 3},
            {"type": "STATUS_APPLY", "event_id": "t3", "actor_id": "pc-a",
             "target_id": "npc-1", "status": "bleeding", "duration": 2}
        ]
    });

    let pipeline = pipeline_with(Arc::new(StaticAdapter::new(envelope)), dir.path());
    let outcome = pipeline.run_turn(&request(state_path)).await;
    assert!(outcome.ok, "violations: {:?}", outcome.violations);

    let latest: GameState = serde_json::from_str(
        &std::fs::read_to_string(pipeline.store().latest_state_path()).unwrap(),
    )
    .unwrap();
    let goblin = latest.entity(&EntityId::from("npc-1")).unwrap();
    assert_eq!(goblin.position.x, 5);
    assert_eq!(goblin.stats.hp_current, 5);
    assert!(goblin.has_condition("bleeding"));
}

#[tokio::test]
async fn tactical_overkill_fails_at_the_rules_gate_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = write_json(&dir.path().join("state.json"), &skirmish_state());

    let envelope = json!({
        "narration": "An impossible blow.",
        "tactical_events": [
            {"type": "DAMAGE", "event_id": "t1", "actor_id": "pc-a",
             "target_id": "npc-1", "value": 999}
        ]
    });

    let pipeline = pipeline_with(Arc::new(StaticAdapter::new(envelope)), dir.path());
    let outcome = pipeline.run_turn(&request(state_path)).await;
    assert!(!outcome.ok);
    assert_eq!(outcome.failure_gate, Some(GateId::RulesLegality));
    assert!(
        outcome
            .violations
            .iter()
            .any(|violation| violation.contains("TACTICAL_HP_BELOW_ZERO"))
    );
}

#[tokio::test]
async fn slow_adapter_times_out_without_commit() {
    struct SlowAdapter;

    #[async_trait::async_trait]
    impl ModelAdapter for SlowAdapter {
        fn name(&self) -> &str {
            "slow"
        }
        async fn propose(
            &self,
            _state: &GameState,
            _intent: &Intent,
            _seed: Option<u64>,
        ) -> Result<Value, warden_runtime::AdapterError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let state_path = write_json(&dir.path().join("state.json"), &skirmish_state());

    let store = BundleStore::new(dir.path().join("bundles")).unwrap();
    let pipeline = TurnPipeline::new(Arc::new(SlowAdapter), store, Duration::from_millis(50));
    let outcome = pipeline.run_turn(&request(state_path)).await;

    assert!(!outcome.ok);
    assert_eq!(outcome.failure_gate, Some(GateId::Adapter));
    assert_eq!(outcome.error.as_deref(), Some("ADAPTER_TIMEOUT"));
    assert!(!pipeline.store().latest_state_path().exists());
}

#[tokio::test]
async fn fixture_file_feeds_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = write_json(&dir.path().join("state.json"), &skirmish_state());
    let fixture_path = write_json(&dir.path().join("envelope.json"), &fireball_envelope());

    // The adapter would explode if called; the fixture must win.
    struct PanicAdapter;
    #[async_trait::async_trait]
    impl ModelAdapter for PanicAdapter {
        fn name(&self) -> &str {
            "panic"
        }
        async fn propose(
            &self,
            _state: &GameState,
            _intent: &Intent,
            _seed: Option<u64>,
        ) -> Result<Value, warden_runtime::AdapterError> {
            panic!("adapter must not be called when a fixture is supplied");
        }
    }

    let pipeline = pipeline_with(Arc::new(PanicAdapter), dir.path());
    let mut req = request(state_path);
    req.fixture = Some(fixture_path);
    let outcome = pipeline.run_turn(&req).await;
    assert!(outcome.ok, "violations: {:?}", outcome.violations);
}

#[tokio::test]
async fn fixture_adapter_reads_envelopes_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fixture_path = write_json(&dir.path().join("envelope.json"), &fireball_envelope());

    let adapter = FixtureAdapter::new(&fixture_path);
    let value = adapter
        .propose(&skirmish_state(), &Intent::new("x"), None)
        .await
        .unwrap();
    assert_eq!(value, fireball_envelope());
}

#[test]
fn gatekeeper_passes_clean_outputs_and_skips_after_failure() {
    let state = skirmish_state();
    let envelope_json = fireball_envelope();
    let envelope = warden_core::decode_envelope(&envelope_json, &state).unwrap();
    let rules_report = evaluate_rules(&state, &envelope);

    let mut seq = state.log.sequence();
    let catalogue = warden_core::AbilityCatalogue::for_state(&state);
    let (post, events) =
        warden_core::ability::resolve_uses(&state, &catalogue, envelope.ability_uses(), &mut seq)
            .unwrap();
    let mut post = post;
    post.log.append(&events);

    let report = run_gates(&GateInputs {
        envelope_json: &envelope_json,
        initial_state: &state,
        rules_report: &rules_report,
        post_state: &post,
    });
    assert!(report.ok);
    assert_eq!(report.gates.len(), 5);
    assert!(report.gates.iter().all(|gate| gate.status == GateStatus::Pass));

    // Break the post state: the invariants gate never runs because the
    // version gate fails first and the rest are skipped.
    let mut broken = post.clone();
    broken.schema_version = "9.9.9".to_owned();
    broken.combat.round = 7;
    let report = run_gates(&GateInputs {
        envelope_json: &envelope_json,
        initial_state: &state,
        rules_report: &rules_report,
        post_state: &broken,
    });
    assert!(!report.ok);
    assert_eq!(report.failure_gate(), Some(GateId::SchemaVersion));
    let statuses: Vec<GateStatus> = report.gates.iter().map(|gate| gate.status).collect();
    assert_eq!(
        statuses,
        vec![
            GateStatus::Pass,
            GateStatus::Pass,
            GateStatus::Fail,
            GateStatus::Skip,
            GateStatus::Skip
        ]
    );
}

#[tokio::test]
async fn seed_parameter_reseeds_the_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = skirmish_state();
    state.rng = warden_core::RngState::unseeded();
    let state_path = write_json(&dir.path().join("state.json"), &state);

    let pipeline = pipeline_with(Arc::new(StaticAdapter::new(fireball_envelope())), dir.path());
    let mut req = request(state_path);
    req.seed = Some(1234);
    let outcome = pipeline.run_turn(&req).await;
    assert!(outcome.ok);

    let latest: GameState = serde_json::from_str(
        &std::fs::read_to_string(pipeline.store().latest_state_path()).unwrap(),
    )
    .unwrap();
    assert_eq!(latest.rng.seed.as_deref(), Some("1234"));
    assert_eq!(state_hash(&latest).len(), 16);
}
