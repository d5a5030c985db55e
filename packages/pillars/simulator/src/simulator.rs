//! `Simulator`: speculatively replays a plan through the policy engine
//! and a cloned fingerprint, with no observable effect on real tools or
//! on the agent's actual drift state.

use std::time::{Duration, Instant};

use serde_json::Value;

use paladin_core::{AgentId, Intent, Plan, PlanStep};
use paladin_core::plan::StepReference;
use paladin_drift::config::DriftConfig;
use paladin_drift::embedding::HashEmbedder;
use paladin_drift::fingerprint::Fingerprint;
use paladin_drift::risk::RiskLevel;
use paladin_drift::scoring;
use paladin_policy::{Decision, PolicyEngine};

use crate::result::{OverallVerdict, SimulationResult, StepResult, StepStatus};
use crate::stub::StubRegistry;

/// Per-step deadline for stub dispatch. `None` means no timeout is
/// enforced (the common case: stubs are pure in-process functions and
/// essentially instantaneous).
pub type StepDeadline = Option<Duration>;

pub struct Simulator<'a> {
    policy: &'a PolicyEngine,
    drift_config: &'a DriftConfig,
    stubs: &'a StubRegistry,
    embedder: HashEmbedder,
}

impl<'a> Simulator<'a> {
    pub fn new(policy: &'a PolicyEngine, drift_config: &'a DriftConfig, stubs: &'a StubRegistry) -> Self {
        let embedder = HashEmbedder::new(drift_config.embedding_dimensions);
        Self {
            policy,
            drift_config,
            stubs,
            embedder,
        }
    }

    /// Run `plan` against a clone of `fingerprint`. The clone is dropped
    /// at the end of the call; nothing here is ever written back to the
    /// agent's real fingerprint (invariant: simulator non-interference).
    pub fn simulate(&self, agent_id: &AgentId, plan: &Plan, fingerprint: &Fingerprint) -> SimulationResult {
        self.run(agent_id, plan, fingerprint.clone(), None)
    }

    /// Identical to [`Self::simulate`], but takes an explicit override of
    /// the fingerprint snapshot to score against — used to preview "what
    /// would happen if this agent's history looked like X" without ever
    /// touching the real agent's state.
    pub fn what_if(
        &self,
        agent_id: &AgentId,
        plan: &Plan,
        hypothetical_fingerprint: Fingerprint,
        per_step_deadline: StepDeadline,
    ) -> SimulationResult {
        self.run(agent_id, plan, hypothetical_fingerprint, per_step_deadline)
    }

    fn run(
        &self,
        agent_id: &AgentId,
        plan: &Plan,
        mut cloned_fingerprint: Fingerprint,
        per_step_deadline: StepDeadline,
    ) -> SimulationResult {
        let mut step_outputs: Vec<Option<Value>> = vec![None; plan.steps.len()];
        let mut step_statuses: Vec<StepStatus> = Vec::with_capacity(plan.steps.len());
        let mut results = Vec::with_capacity(plan.steps.len());
        let mut max_cloned_risk_score: f64 = 0.0;
        let mut crossed_pause_threshold = false;

        let base_time = chrono::Utc::now();

        for step in &plan.steps {
            let (resolved_args, dependency_blocked) =
                resolve_arguments(&step.arguments, &step_outputs, &step_statuses);

            if dependency_blocked {
                step_statuses.push(StepStatus::DependencyBlocked);
                results.push(StepResult {
                    index: step.index,
                    capability: step.capability.clone(),
                    status: StepStatus::DependencyBlocked,
                    verdict: None,
                    stub_output: None,
                    cloned_risk_score: max_cloned_risk_score,
                    remediation: None,
                });
                continue;
            }

            let synthetic_at = base_time + chrono::Duration::microseconds(step.index as i64 + 1);
            let intent = Intent::new(agent_id.clone(), step.capability.clone(), resolved_args.clone())
                .with_submitted_at(synthetic_at);

            let verdict = self.policy.evaluate(&intent);
            let was_violation = verdict.decision == Decision::Deny;

            let embedding = self.embedder.embed_intent(&intent);
            cloned_fingerprint.record(&intent, embedding.clone(), was_violation, self.drift_config);
            let breakdown = scoring::score(&cloned_fingerprint, &intent, &embedding, was_violation, self.drift_config);
            max_cloned_risk_score = max_cloned_risk_score.max(breakdown.composite);
            if breakdown.composite >= self.drift_config.threshold_pause {
                crossed_pause_threshold = true;
            }

            let (status, stub_output) = if was_violation {
                (StepStatus::Denied, None)
            } else if let Some(stub) = self.stubs.get(&step.capability) {
                match invoke_with_deadline(stub, &resolved_args, per_step_deadline) {
                    Some(output) => (StepStatus::Allowed, Some(output)),
                    None => (StepStatus::StubTimeout, None),
                }
            } else {
                (StepStatus::Allowed, None)
            };

            let remediation = verdict.remediation.clone();
            step_outputs[step.index] = stub_output.clone();
            step_statuses.push(status);
            results.push(StepResult {
                index: step.index,
                capability: step.capability.clone(),
                status,
                verdict: Some(verdict),
                stub_output,
                cloned_risk_score: breakdown.composite,
                remediation,
            });
        }

        let blocked_count = results.iter().filter(|r| r.status.counts_as_blocked()).count();
        let allowed_count = results.len() - blocked_count;
        let overall = if blocked_count == 0 && !crossed_pause_threshold {
            OverallVerdict::Allowed
        } else {
            OverallVerdict::Blocked
        };

        SimulationResult {
            plan_id: plan.id.to_string(),
            agent_id: agent_id.to_string(),
            overall,
            allowed_count,
            blocked_count,
            steps: results,
            max_cloned_risk_score,
            crossed_pause_threshold,
        }
    }
}

/// Walk `arguments` replacing any string value matching `$steps[k].field`
/// with the prior step's recorded stub output (if that step was
/// `ALLOWED`). Returns `(resolved, dependency_blocked)`: if the
/// referenced step never ran or wasn't allowed, the whole step is marked
/// dependency-blocked and its original arguments are returned unused.
fn resolve_arguments(
    arguments: &Value,
    step_outputs: &[Option<Value>],
    step_statuses: &[StepStatus],
) -> (Value, bool) {
    match arguments {
        Value::String(s) => {
            if let Some(reference) = StepReference::parse(s) {
                let allowed = step_statuses
                    .get(reference.step_index)
                    .map(|s| s.permits_chaining())
                    .unwrap_or(false);
                if !allowed {
                    return (arguments.clone(), true);
                }
                let resolved = step_outputs
                    .get(reference.step_index)
                    .and_then(|o| o.as_ref())
                    .and_then(|v| lookup_field(v, &reference.field_path));
                match resolved {
                    Some(v) => (v, false),
                    None => (arguments.clone(), true),
                }
            } else {
                (arguments.clone(), false)
            }
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            let mut blocked = false;
            for (k, v) in map {
                let (resolved, b) = resolve_arguments(v, step_outputs, step_statuses);
                blocked |= b;
                out.insert(k.clone(), resolved);
            }
            (Value::Object(out), blocked)
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            let mut blocked = false;
            for item in items {
                let (resolved, b) = resolve_arguments(item, step_outputs, step_statuses);
                blocked |= b;
                out.push(resolved);
            }
            (Value::Array(out), blocked)
        }
        other => (other.clone(), false),
    }
}

fn lookup_field(value: &Value, field_path: &str) -> Option<Value> {
    value.get(field_path).cloned()
}

fn invoke_with_deadline(
    stub: &dyn paladin_core::ports::ToolStub,
    args: &Value,
    deadline: StepDeadline,
) -> Option<Value> {
    match deadline {
        None => Some(stub.call(args)),
        Some(budget) => {
            let start = Instant::now();
            let output = stub.call(args);
            if start.elapsed() > budget {
                None
            } else {
                Some(output)
            }
        }
    }
}

/// Helper used by callers to decide whether to halt an in-progress
/// multi-plan batch: whether this plan's cloned risk ever implied the
/// real agent would have been paused had it actually executed.
pub fn implied_real_level(result: &SimulationResult, config: &DriftConfig) -> RiskLevel {
    if result.max_cloned_risk_score >= config.threshold_kill {
        RiskLevel::Kill
    } else if result.max_cloned_risk_score >= config.threshold_pause {
        RiskLevel::Pause
    } else if result.max_cloned_risk_score >= config.threshold_throttle {
        RiskLevel::Throttle
    } else if result.max_cloned_risk_score >= config.threshold_warning {
        RiskLevel::Warning
    } else {
        RiskLevel::Ok
    }
}
