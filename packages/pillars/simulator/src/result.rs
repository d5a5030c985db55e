//! Per-step and overall simulation outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use paladin_policy::{Decision, Remediation, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Allowed,
    Denied,
    /// The step referenced an earlier step's output via `$steps[k].field`,
    /// but that earlier step was not `ALLOWED`, so this step never ran.
    DependencyBlocked,
    /// The registered stub exceeded its caller-supplied deadline; treated
    /// as a `Deny` for the purpose of the overall verdict.
    StubTimeout,
}

impl StepStatus {
    pub fn permits_chaining(&self) -> bool {
        matches!(self, StepStatus::Allowed)
    }

    pub fn counts_as_blocked(&self) -> bool {
        !matches!(self, StepStatus::Allowed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub capability: String,
    pub status: StepStatus,
    pub verdict: Option<Verdict>,
    pub stub_output: Option<Value>,
    /// Composite risk score after folding this step into the cloned
    /// fingerprint; never observable on the real agent fingerprint.
    pub cloned_risk_score: f64,
    pub remediation: Option<Remediation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallVerdict {
    Allowed,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub plan_id: String,
    pub agent_id: String,
    pub overall: OverallVerdict,
    pub allowed_count: usize,
    pub blocked_count: usize,
    pub steps: Vec<StepResult>,
    /// Highest cloned risk level reached by any step, used to decide
    /// whether the plan as a whole would have crossed PAUSE even if every
    /// individual step's policy verdict was non-denying.
    pub max_cloned_risk_score: f64,
    pub crossed_pause_threshold: bool,
}

impl SimulationResult {
    pub fn step_decision(step: &StepResult) -> Option<Decision> {
        step.verdict.as_ref().map(|v| v.decision)
    }
}
