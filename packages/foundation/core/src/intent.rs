//! The `Intent`: a single admission request, the unit both the policy
//! engine and the drift engine reason about.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AgentId, IntentId};

/// One proposed action from an agent, submitted for admission.
///
/// `capability` doubles as both the tool name and the (possibly
/// comma-joined) declared capability set rules and the drift engine key
/// off of — a single dispatch string rather than a separate tool-name
/// field plus a capability list, since every rule and signal in this
/// kernel keys off capability strings, never off a distinct tool
/// identifier. `description` is the free-text annotation a caller may
/// attach; it is carried through to the ledger but never interpreted by
/// policy or drift logic. There is no embedding field here — embeddings
/// are computed on demand by an `EmbeddingProvider` rather than stored on
/// the intent itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub agent_id: AgentId,
    pub capability: String,
    pub arguments: Value,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    pub submitted_at: DateTime<Utc>,
}

impl Intent {
    pub fn new(agent_id: impl Into<AgentId>, capability: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: IntentId::new(),
            agent_id: agent_id.into(),
            capability: capability.into(),
            arguments,
            description: String::new(),
            context: HashMap::new(),
            submitted_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_submitted_at(mut self, ts: DateTime<Utc>) -> Self {
        self.submitted_at = ts;
        self
    }

    /// Reconstructs an intent with an explicit id and timestamp rather
    /// than minting fresh ones. Used only when rebuilding a historical
    /// intent from its persisted ledger payload during cold-start replay,
    /// where the original id/timestamp must be preserved for the
    /// fingerprint's history and inter-arrival statistics to replay
    /// identically.
    pub fn from_ledger_record(
        id: IntentId,
        agent_id: impl Into<AgentId>,
        capability: impl Into<String>,
        arguments: Value,
        description: String,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            agent_id: agent_id.into(),
            capability: capability.into(),
            arguments,
            description,
            context: HashMap::new(),
            submitted_at,
        }
    }

    /// Look up a single argument field by dotted-free top-level key.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_lookup() {
        let intent = Intent::new("agent-1", "send_email", serde_json::json!({"to": "a@b.com"}));
        assert_eq!(intent.argument("to").unwrap(), "a@b.com");
        assert!(intent.argument("missing").is_none());
    }

    #[test]
    fn context_builder_accumulates() {
        let intent = Intent::new("agent-1", "noop", serde_json::json!({}))
            .with_context("trace_id", serde_json::json!("t-1"))
            .with_context("region", serde_json::json!("us"));
        assert_eq!(intent.context.len(), 2);
    }

    #[test]
    fn description_defaults_empty_and_is_settable() {
        let intent = Intent::new("agent-1", "noop", serde_json::json!({}));
        assert!(intent.description.is_empty());
        let described = intent.with_description("quarterly reconciliation sweep");
        assert_eq!(described.description, "quarterly reconciliation sweep");
    }
}
