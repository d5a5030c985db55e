//! Deployment configuration for the gateway binary. Configuration
//! loading is a thin layer over the core, so this is intentionally
//! minimal: enough to stand up `PaladinCore` from a rule document and a
//! ledger path, nothing resembling a general config framework.

use std::path::PathBuf;
use std::sync::Arc;

use paladin_drift::DriftConfig;
use paladin_ledger::{AuditLedger, Ed25519Signer, FileStore, HmacDemoSigner, InMemoryStore, LedgerStore, Signer};
use paladin_policy::{PolicyEngine, RuleSet};
use paladin_simulator::StubRegistry;
use serde::{Deserialize, Serialize};

use tracing::warn;

use crate::core::PaladinCore;
use crate::error::GatewayError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub rule_source_path: PathBuf,
    /// `None` uses an in-memory ledger (tests, local dev); `Some(path)`
    /// opens an append-only `FileStore` at that path.
    pub ledger_path: Option<PathBuf>,
    /// If true, sign with `HmacDemoSigner` and tag every entry
    /// `demo_signed = true` rather than generating a real Ed25519 key.
    pub demo_signing: bool,
    pub drift: DriftConfig,
    pub bind_addr: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rule_source_path: PathBuf::from("rules.yaml"),
            ledger_path: None,
            demo_signing: true,
            drift: DriftConfig::default(),
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Build the composed `PaladinCore` this configuration describes.
    /// Fails closed: a rule document that exists but fails to parse is an
    /// error here. A missing file is treated as "no rules configured yet"
    /// (an empty rule set, logged) rather than an error, so a fresh
    /// deployment can start before its rule document is in place.
    pub fn build(&self) -> Result<PaladinCore, GatewayError> {
        let rule_set = match std::fs::read_to_string(&self.rule_source_path) {
            Ok(source) if !source.trim().is_empty() => RuleSet::from_yaml(&source)?,
            Ok(_) => RuleSet::default(),
            Err(err) => {
                warn!(
                    path = %self.rule_source_path.display(),
                    error = %err,
                    "rule source unreadable, starting with an empty rule set"
                );
                RuleSet::default()
            }
        };
        let policy = Arc::new(PolicyEngine::new(rule_set));

        let store: Box<dyn LedgerStore> = match &self.ledger_path {
            Some(path) => {
                let file_store = FileStore::open(path)?;
                file_store.recover()?;
                Box::new(file_store)
            }
            None => Box::new(InMemoryStore::new()),
        };
        let signer: Box<dyn Signer> = if self.demo_signing {
            Box::new(HmacDemoSigner::new("paladin-gateway-demo", b"demo-only-key".to_vec()))
        } else {
            Box::new(Ed25519Signer::generate("paladin-gateway"))
        };
        let ledger = Arc::new(AuditLedger::open(store, signer)?);

        PaladinCore::restore(policy, self.drift.clone(), ledger, StubRegistry::new())
    }
}
