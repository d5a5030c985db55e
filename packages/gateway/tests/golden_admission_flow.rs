use std::sync::Arc;

use paladin_core::{AgentId, Intent, Plan, PlanStep};
use paladin_drift::{DriftConfig, DriftEngine};
use paladin_gateway::PaladinCore;
use paladin_ledger::{AuditLedger, HmacDemoSigner, InMemoryStore};
use paladin_policy::{PolicyEngine, Rule, RuleSet};
use paladin_simulator::StubRegistry;
use serde_json::json;

fn core_with(rules: Vec<Rule>, drift: DriftConfig) -> PaladinCore {
    let ledger = AuditLedger::open(
        Box::new(InMemoryStore::new()),
        Box::new(HmacDemoSigner::new("golden-test", b"secret".to_vec())),
    )
    .unwrap();
    let mut stubs = StubRegistry::new();
    stubs.register("calendar.check", |args: &serde_json::Value| {
        json!({ "available": true, "slot": args["time"].clone() })
    });
    stubs.register("calendar.book", |args: &serde_json::Value| {
        json!({ "booking_id": "bk-1", "slot": args["slot"].clone() })
    });
    PaladinCore::new(
        Arc::new(PolicyEngine::new(RuleSet { rules })),
        Arc::new(DriftEngine::new(drift.clone())),
        drift,
        Arc::new(ledger),
        stubs,
    )
}

/// A plan whose second step consumes the first step's stub output via a
/// chained argument reference. Neither step ever touches a real calendar.
#[test]
fn simulate_plan_chains_step_outputs_and_logs_one_ledger_entry() {
    let core = core_with(vec![], DriftConfig::default());
    let plan = Plan::new(
        "scheduler",
        vec![
            PlanStep::new(0, "calendar.check", json!({ "time": "14:00" })),
            PlanStep::new(1, "calendar.book", json!({ "slot": "$steps[0].slot" })),
        ],
    );

    let result = core.simulate_plan(&AgentId::new("scheduler"), &plan).unwrap();
    assert_eq!(result.allowed_count, 2);
    assert_eq!(result.blocked_count, 0);
    assert_eq!(result.steps[1].stub_output.as_ref().unwrap()["slot"], "14:00");

    // simulating never mutates the real fingerprint or appends more than
    // the one PLAN_SIMULATED entry.
    let status = core.agent_status(&AgentId::new("scheduler"));
    assert_eq!(status.score_history.len(), 0);
    let verification = core.verify_ledger().unwrap();
    assert!(verification.is_intact());
}

/// A run of widening-capability intents from the same agent should climb
/// through the risk ladder until the agent is suspended, and a resurrected
/// agent should be admissible again afterward. Exercises the full public
/// surface (`verify_intent`, `agent_status`, `resurrect`, `verify_ledger`)
/// together rather than in isolation.
#[test]
fn repeated_widening_intents_escalate_then_recover_after_resurrection() {
    let drift = DriftConfig {
        learning_phase_len: 0,
        threshold_warning: 0.05,
        threshold_throttle: 0.15,
        threshold_pause: 0.3,
        threshold_kill: 0.45,
        ..DriftConfig::default()
    };
    let core = core_with(vec![], drift);
    let agent = AgentId::new("widener");

    let capabilities = [
        "calendar.check",
        "email.send",
        "offer.generate",
        "payroll.adjust",
        "admin.grant_access",
    ];
    let mut last_level = None;
    for (i, capability) in capabilities.iter().enumerate() {
        let decision = core
            .verify_intent(Intent::new("widener", *capability, json!({ "step": i })))
            .unwrap();
        last_level = Some(decision.risk_level);
    }
    assert!(last_level.unwrap().blocks_allow());

    let denied = core
        .verify_intent(Intent::new("widener", "calendar.check", json!({})))
        .unwrap();
    assert!(!denied.is_allowed());

    core.resurrect(&agent, "admin-1", "reviewed false positive").unwrap();
    let recovered = core
        .verify_intent(Intent::new("widener", "calendar.check", json!({})))
        .unwrap();
    assert!(recovered.is_allowed());

    assert!(core.verify_ledger().unwrap().is_intact());
}
