//! The `Verdict`: composite outcome of evaluating every applicable rule
//! against one intent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rule::Reversibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
    Modify,
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    pub suggestion: String,
    pub auto_fix: Option<Value>,
    pub reversibility: Reversibility,
}

/// Outcome of `PolicyEngine::evaluate`, immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    /// Rule ids that actually fired (Deny/Modify/Warn), in evaluation
    /// order, not just the headline one.
    pub triggered_rules: Vec<String>,
    pub reasons: Vec<String>,
    /// Accumulated patch for MODIFY, merged field-by-field across every
    /// contributing rule (they are required to target disjoint fields).
    pub patch: Option<Value>,
    /// Present only when `decision == Deny` and the denying rule supplied
    /// one; the headline remediation belongs to the first Deny by
    /// precedence (lowest rule id).
    pub remediation: Option<Remediation>,
    /// Ids of rules that panicked during this evaluation rather than
    /// returning a normal outcome. Empty in the overwhelming common case.
    /// A crashed rule is still folded into `decision`/`reasons` as a Deny
    /// (per spec.md §4.1's failure semantics), but callers that need to
    /// distinguish "a rule legitimately denied this" from "a rule crashed
    /// and was treated as a deny" — e.g. to raise a DRIFT_ALERT —
    /// check this field instead of string-matching `reasons`.
    #[serde(default)]
    pub crashed_rules: Vec<String>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            triggered_rules: Vec::new(),
            reasons: Vec::new(),
            patch: None,
            remediation: None,
            crashed_rules: Vec::new(),
        }
    }

    pub fn is_allowed_for_execution(&self) -> bool {
        matches!(self.decision, Decision::Allow | Decision::Modify | Decision::Warn)
    }
}
