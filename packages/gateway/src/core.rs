//! `PaladinCore`: the typed mediator/facade that every tool invocation
//! must pass through before its side effects run. Rather than decorating
//! agent methods with runtime wrapping, admission is expressed as an
//! owned facade composing the four pillar engines.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use paladin_core::{AgentId, Intent, IntentId, Plan};
use paladin_drift::{DriftConfig, DriftEngine, DriftError};
use paladin_drift::risk::{DriftAlert, RiskLevel, RiskState};
use paladin_ledger::{AuditLedger, ChainVerification};
use paladin_policy::{Decision, PolicyEngine, Remediation, Verdict};
use paladin_simulator::{Simulator, SimulationResult, StubRegistry};

use crate::error::GatewayError;

/// Ledger event kinds, carried as the audit entry's `event_kind`
/// attribute. The ledger crate stores payloads as opaque JSON, so the
/// kind travels as a `"kind"` field inside the payload rather than a
/// typed column — this keeps `paladin-ledger` ignorant of what the core
/// actually records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    IntentVerified,
    PlanSimulated,
    DriftAlert,
    Enforcement,
    ForensicSnapshot,
    Resurrection,
}

/// Host-visible outcome of `verify_intent`: whether the action is
/// admissible, the composite verdict behind that decision, and the
/// agent's current drift standing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdmissionDecision {
    pub decision: Decision,
    pub verdict: Verdict,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub patch: Option<Value>,
    pub alert: Option<DriftAlert>,
    pub ledger_sequence: u64,
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self.decision, Decision::Allow | Decision::Modify | Decision::Warn)
    }
}

/// Composes the policy engine, drift engine, plan simulator, and audit
/// ledger behind a host-visible admission API. Holds no independent
/// business logic beyond sequencing the pipeline and shaping one ledger
/// entry per call.
pub struct PaladinCore {
    policy: Arc<PolicyEngine>,
    drift: Arc<DriftEngine>,
    drift_config: DriftConfig,
    ledger: Arc<AuditLedger>,
    stubs: StubRegistry,
}

impl PaladinCore {
    pub fn new(
        policy: Arc<PolicyEngine>,
        drift: Arc<DriftEngine>,
        drift_config: DriftConfig,
        ledger: Arc<AuditLedger>,
        stubs: StubRegistry,
    ) -> Self {
        Self {
            policy,
            drift,
            drift_config,
            ledger,
            stubs,
        }
    }

    /// Cold-start entry point: rebuilds every agent's fingerprint and risk
    /// state from the audit log alone, per the two-artifact persistence
    /// design (the ledger is authoritative; `FORENSIC_SNAPSHOT` checkpoints
    /// only shorten the replay). Walks entries oldest-first, fast-forwards
    /// to the most recent snapshot it finds for an agent via
    /// `DriftEngine::load_snapshot`, then replays every `INTENT_VERIFIED`
    /// entry recorded after that point through `DriftEngine::restore_intent`.
    /// A ledger that fails to open, or a snapshot that fails structural
    /// validation, does not abort startup — the affected agent is simply
    /// quarantined into `UNKNOWN` by `load_snapshot` itself and every other
    /// agent still reconstructs normally.
    pub fn restore(
        policy: Arc<PolicyEngine>,
        drift_config: DriftConfig,
        ledger: Arc<AuditLedger>,
        stubs: StubRegistry,
    ) -> Result<Self, GatewayError> {
        let drift = Arc::new(DriftEngine::new(drift_config.clone()));
        let snapshot = ledger.snapshot()?;

        for entry in &snapshot.entries {
            let Some(kind) = entry.payload.get("kind").and_then(Value::as_str) else {
                continue;
            };
            match kind {
                "FORENSIC_SNAPSHOT" => {
                    let Some(agent_id) = entry.payload.get("agent_id").and_then(Value::as_str) else {
                        continue;
                    };
                    let Some(fingerprint) = entry.payload.get("fingerprint").cloned() else {
                        continue;
                    };
                    let Some(risk_state) = entry.payload.get("risk_state").cloned() else {
                        continue;
                    };
                    match (
                        serde_json::from_value(fingerprint),
                        serde_json::from_value(risk_state),
                    ) {
                        (Ok(fingerprint), Ok(risk_state)) => {
                            let agent = AgentId::new(agent_id);
                            if let Err(err) = drift.load_snapshot(&agent, fingerprint, risk_state) {
                                warn!(agent_id, error = %err, "forensic snapshot failed validation during replay");
                            }
                        }
                        _ => warn!(agent_id, "forensic snapshot entry could not be deserialized during replay"),
                    }
                }
                "INTENT_VERIFIED" => {
                    if entry.payload.get("throttled").and_then(Value::as_bool).unwrap_or(false) {
                        continue;
                    }
                    if let Some(intent) = reconstruct_intent(&entry.payload) {
                        let decision = entry
                            .payload
                            .get("decision")
                            .and_then(|v| serde_json::from_value::<Decision>(v.clone()).ok())
                            .unwrap_or(Decision::Allow);
                        drift.restore_intent(&intent, decision);
                    } else {
                        warn!(sequence = entry.sequence, "intent_verified entry could not be reconstructed during replay");
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            policy,
            drift,
            drift_config,
            ledger,
            stubs,
        })
    }

    /// The single admission entry point: every tool invocation must pass
    /// through here before its side effects run. Evaluates policy,
    /// observes drift, enforces PAUSE/KILL/THROTTLE, and appends exactly
    /// one `INTENT_VERIFIED` ledger entry (plus a `DRIFT_ALERT` entry on
    /// transition, and a `FORENSIC_SNAPSHOT` + `ENFORCEMENT` entry on a
    /// fresh KILL) — every evaluated intent leaves exactly this trail.
    pub fn verify_intent(&self, intent: Intent) -> Result<AdmissionDecision, GatewayError> {
        if self.drift.should_throttle_deny(&intent.agent_id) {
            let status = self.drift.status(&intent.agent_id);
            let verdict = throttled_verdict();
            let entry = self.ledger.append(intent_verified_payload(
                &intent,
                &verdict,
                status.score,
                status.level,
                true,
            ))?;
            return Ok(AdmissionDecision {
                decision: verdict.decision,
                verdict,
                risk_score: status.score,
                risk_level: status.level,
                patch: None,
                alert: None,
                ledger_sequence: entry.sequence,
            });
        }

        let status_before = self.drift.status(&intent.agent_id);
        if status_before.level.blocks_allow() {
            let verdict = suspended_verdict(status_before.level, status_before.pause_or_kill_reason.clone());
            let entry = self.ledger.append(intent_verified_payload(
                &intent,
                &verdict,
                status_before.score,
                status_before.level,
                false,
            ))?;
            return Ok(AdmissionDecision {
                decision: verdict.decision,
                verdict,
                risk_score: status_before.score,
                risk_level: status_before.level,
                patch: None,
                alert: None,
                ledger_sequence: entry.sequence,
            });
        }

        let policy_verdict = self.policy.evaluate(&intent);

        let (risk_score, risk_level, alert, entered_kill, observed, final_verdict) =
            match self.drift.observe(&intent, policy_verdict.decision) {
                Ok(outcome) => {
                    let final_verdict = if outcome.risk_level.blocks_allow() {
                        suspended_verdict(outcome.risk_level, None)
                    } else {
                        policy_verdict.clone()
                    };
                    (
                        outcome.risk_score,
                        outcome.risk_level,
                        outcome.alert,
                        outcome.entered_kill,
                        true,
                        final_verdict,
                    )
                }
                Err(DriftError::Suspended { level }) => {
                    (status_before.score, level, None, false, false, suspended_verdict(level, None))
                }
                Err(other) => return Err(GatewayError::Resurrection(other)),
            };

        let entry = self.ledger.append(intent_verified_payload(
            &intent,
            &final_verdict,
            risk_score,
            risk_level,
            false,
        ))?;

        if !policy_verdict.crashed_rules.is_empty() {
            self.ledger.append(rule_crash_alert_payload(
                &intent.agent_id,
                &intent.id,
                &policy_verdict.crashed_rules,
                risk_score,
                risk_level,
            ))?;
        }

        if let Some(ref alert) = alert {
            self.ledger.append(json!({
                "kind": EventKind::DriftAlert,
                "agent_id": intent.agent_id.to_string(),
                "alert": alert,
            }))?;
        }

        if entered_kill {
            let fingerprint = self.drift.fingerprint_snapshot(&intent.agent_id);
            let risk_state = self.drift.status(&intent.agent_id);
            self.ledger.append(json!({
                "kind": EventKind::ForensicSnapshot,
                "agent_id": intent.agent_id.to_string(),
                "reason": "risk score crossed KILL threshold",
                "fingerprint": fingerprint,
                "risk_state": risk_state,
            }))?;
            self.ledger.append(json!({
                "kind": EventKind::Enforcement,
                "agent_id": intent.agent_id.to_string(),
                "action": "kill",
                "triggering_intent_id": intent.id.to_string(),
            }))?;
        } else if observed && self.drift_config.snapshot_interval > 0 {
            let fingerprint = self.drift.fingerprint_snapshot(&intent.agent_id);
            if fingerprint.total_intents % self.drift_config.snapshot_interval == 0 {
                let risk_state = self.drift.status(&intent.agent_id);
                self.ledger.append(json!({
                    "kind": EventKind::ForensicSnapshot,
                    "agent_id": intent.agent_id.to_string(),
                    "reason": "periodic checkpoint",
                    "fingerprint": fingerprint,
                    "risk_state": risk_state,
                }))?;
            }
        }

        Ok(AdmissionDecision {
            decision: final_verdict.decision,
            verdict: final_verdict,
            risk_score,
            risk_level,
            patch: policy_verdict.patch,
            alert,
            ledger_sequence: entry.sequence,
        })
    }

    /// Speculatively runs `plan` against the policy engine and a cloned
    /// snapshot of the agent's fingerprint; appends exactly one
    /// `PLAN_SIMULATED` entry and mutates nothing real.
    pub fn simulate_plan(&self, agent_id: &AgentId, plan: &Plan) -> Result<SimulationResult, GatewayError> {
        let fingerprint = self.drift.fingerprint_snapshot(agent_id);
        let simulator = Simulator::new(&self.policy, &self.drift_config, &self.stubs);
        let result = simulator.simulate(agent_id, plan, &fingerprint);

        self.ledger.append(json!({
            "kind": EventKind::PlanSimulated,
            "agent_id": agent_id.to_string(),
            "plan_id": plan.id.to_string(),
            "result": &result,
        }))?;

        Ok(result)
    }

    pub fn agent_status(&self, agent_id: &AgentId) -> RiskState {
        self.drift.status(agent_id)
    }

    /// Admin-approved resume of a killed agent. Emits one `RESURRECTION`
    /// ledger entry regardless of outcome, so a denied resurrection
    /// attempt is itself part of the auditable trail.
    pub fn resurrect(
        &self,
        agent_id: &AgentId,
        admin_id: &str,
        reason: &str,
    ) -> Result<u32, GatewayError> {
        let result = self.drift.resurrect(agent_id);
        self.ledger.append(json!({
            "kind": EventKind::Resurrection,
            "agent_id": agent_id.to_string(),
            "admin_id": admin_id,
            "reason": reason,
            "ok": result.is_ok(),
            "resurrection_count": result.as_ref().ok(),
        }))?;
        Ok(result?)
    }

    pub fn verify_ledger(&self) -> Result<ChainVerification, GatewayError> {
        Ok(self.ledger.verify_chain()?)
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }
}

fn throttled_verdict() -> Verdict {
    Verdict {
        decision: Decision::Deny,
        triggered_rules: vec!["drift.throttle".to_string()],
        reasons: vec!["agent is throttled: per-minute action budget exhausted".to_string()],
        patch: None,
        remediation: Some(Remediation {
            suggestion: "retry after the current one-minute throttle window elapses".to_string(),
            auto_fix: None,
            reversibility: paladin_policy::Reversibility::High,
        }),
        crashed_rules: Vec::new(),
    }
}

fn suspended_verdict(level: RiskLevel, reason: Option<String>) -> Verdict {
    let rule_id = match level {
        RiskLevel::Kill => "drift.kill",
        RiskLevel::Pause => "drift.pause",
        _ => "drift.unknown",
    };
    Verdict {
        decision: Decision::Deny,
        triggered_rules: vec![rule_id.to_string()],
        reasons: vec![reason.unwrap_or_else(|| format!("agent is suspended at {level:?}"))],
        patch: None,
        remediation: Some(Remediation {
            suggestion: "admin review and resurrect/resume required".to_string(),
            auto_fix: None,
            reversibility: paladin_policy::Reversibility::Low,
        }),
        crashed_rules: Vec::new(),
    }
}

/// Carries enough of the originating intent to reconstruct it byte-for-byte
/// during cold-start replay (see `PaladinCore::restore`): `arguments` feeds
/// back into the same deterministic hash embedding the live path used, and
/// `submitted_at`/`description` round-trip through `Intent::from_ledger_record`.
fn intent_verified_payload(
    intent: &Intent,
    verdict: &Verdict,
    risk_score: f64,
    risk_level: RiskLevel,
    throttled: bool,
) -> Value {
    json!({
        "kind": EventKind::IntentVerified,
        "intent_id": intent.id.to_string(),
        "agent_id": intent.agent_id.to_string(),
        "capability": intent.capability,
        "arguments": intent.arguments,
        "description": intent.description,
        "submitted_at": intent.submitted_at,
        "decision": verdict.decision,
        "triggered_rules": verdict.triggered_rules,
        "reasons": verdict.reasons,
        "risk_score": risk_score,
        "risk_level": risk_level,
        "throttled": throttled,
    })
}

/// Rebuilds an `Intent` from an `INTENT_VERIFIED` ledger payload, the
/// inverse of `intent_verified_payload`. Returns `None` on any missing or
/// malformed field rather than erroring, since a single unreconstructable
/// historical entry should not abort the whole cold-start replay.
fn reconstruct_intent(payload: &Value) -> Option<Intent> {
    let id = IntentId::parse(payload.get("intent_id")?.as_str()?)?;
    let agent_id = payload.get("agent_id")?.as_str()?.to_string();
    let capability = payload.get("capability")?.as_str()?.to_string();
    let arguments = payload.get("arguments")?.clone();
    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let submitted_at = serde_json::from_value(payload.get("submitted_at")?.clone()).ok()?;
    Some(Intent::from_ledger_record(id, agent_id, capability, arguments, description, submitted_at))
}

/// Payload for the `DRIFT_ALERT`/CRITICAL entry raised when a policy rule
/// panics during evaluation, distinct from the drift engine's own
/// score-threshold alerts but sharing the same ledger `kind` so a forensic
/// reviewer sees both under one event type.
fn rule_crash_alert_payload(agent_id: &AgentId, intent_id: &IntentId, crashed_rules: &[String], risk_score: f64, risk_level: RiskLevel) -> Value {
    json!({
        "kind": EventKind::DriftAlert,
        "agent_id": agent_id.to_string(),
        "alert": {
            "triggering_intent_id": intent_id.to_string(),
            "crashed_rules": crashed_rules,
            "risk_score": risk_score,
            "risk_level": risk_level,
            "severity": "CRITICAL",
            "explanation": "a policy rule panicked during evaluation and was isolated as a deny",
        },
    })
}
