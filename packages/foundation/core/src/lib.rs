//! Paladin Core: shared types and seams for the safety kernel.
//!
//! Every pillar crate (policy, drift, simulator, ledger) depends on this
//! crate for the `Intent`/`Plan` data model, the canonical byte encoding
//! used wherever content is hashed or signed, and the external-interface
//! traits (`EmbeddingProvider`, `ToolStub`, `PolicyRuleSource`) that let a
//! host swap implementations without touching pillar internals.

pub mod canonical;
pub mod error;
pub mod ids;
pub mod intent;
pub mod plan;
pub mod ports;

pub use error::CoreError;
pub use ids::{AgentId, IntentId, PlanId};
pub use intent::Intent;
pub use plan::{Plan, PlanStep};
pub use ports::{EmbeddingProvider, PolicyRuleSource, ToolStub};
