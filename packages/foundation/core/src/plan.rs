//! `Plan`: a proposed multi-step sequence of actions submitted to the
//! simulator before an agent commits to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AgentId, PlanId};

/// One step of a plan. `arguments` may reference the outputs of earlier
/// steps via the chained-template syntax `"$steps[k].field"`, resolved by
/// the simulator immediately before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub index: usize,
    pub capability: String,
    pub arguments: Value,
}

impl PlanStep {
    pub fn new(index: usize, capability: impl Into<String>, arguments: Value) -> Self {
        Self {
            index,
            capability: capability.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub agent_id: AgentId,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(agent_id: impl Into<AgentId>, steps: Vec<PlanStep>) -> Self {
        Self {
            id: PlanId::new(),
            agent_id: agent_id.into(),
            steps,
        }
    }
}

/// Reference into a prior step's recorded output, e.g. `$steps[0].booking_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReference {
    pub step_index: usize,
    pub field_path: String,
}

impl StepReference {
    /// Parse a `"$steps[k].field"` template string. Returns `None` for any
    /// string that isn't a step-reference (plain literal arguments pass
    /// through untouched).
    pub fn parse(template: &str) -> Option<Self> {
        let rest = template.strip_prefix("$steps[")?;
        let close = rest.find(']')?;
        let step_index: usize = rest[..close].parse().ok()?;
        let after = &rest[close + 1..];
        let field_path = after.strip_prefix('.')?.to_string();
        if field_path.is_empty() {
            return None;
        }
        Some(Self {
            step_index,
            field_path,
        })
    }
}
