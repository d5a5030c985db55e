//! External interfaces: seams where the host plugs in real
//! infrastructure (an embedding API, a rule-document store, tool stubs)
//! without pillar crates depending on any concrete implementation.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;
use crate::intent::Intent;

/// Produces a fixed-dimensionality embedding vector for an intent. Must be
/// safe to call concurrently; failures are non-fatal to the admission
/// pipeline (the drift engine falls back to a deterministic hash
/// embedding and tags the fingerprint update as degraded).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, intent: &Intent) -> Result<Vec<f32>, CoreError>;

    /// Dimensionality of vectors this provider returns. Implementations
    /// that can't answer without a call may return `None`.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

/// A single registered, side-effect-free tool stub invoked by the plan
/// simulator. Implementations must be deterministic: same arguments in,
/// same synthetic result out, no I/O.
pub trait ToolStub: Send + Sync {
    fn call(&self, arguments: &Value) -> Value;
}

impl<F> ToolStub for F
where
    F: Fn(&Value) -> Value + Send + Sync,
{
    fn call(&self, arguments: &Value) -> Value {
        self(arguments)
    }
}

/// Supplies the raw declarative rule document (YAML) backing the policy
/// engine. Kept as a raw-bytes seam rather than a typed one so that core
/// never depends on the policy crate's rule model.
pub trait PolicyRuleSource: Send + Sync {
    fn load_yaml(&self) -> Result<String, CoreError>;
}

/// A rule source backed by a fixed in-memory string, mainly for tests and
/// for hosts that embed their rule document at compile time.
pub struct StaticRuleSource(pub String);

impl PolicyRuleSource for StaticRuleSource {
    fn load_yaml(&self) -> Result<String, CoreError> {
        Ok(self.0.clone())
    }
}
