//! Paladin Policy: rule-based admissibility for a single (agent, tool,
//! arguments, context) tuple, with structured verdicts and remediation
//! hints.

pub mod engine;
pub mod error;
pub mod pii;
pub mod rule;
pub mod verdict;

pub use engine::{PolicyEngine, RuleDescriptor, RuleSet};
pub use error::PolicyError;
pub use rule::{Reversibility, Rule, RuleOutcome};
pub use verdict::{Decision, Remediation, Verdict};
