//! Gateway-level error taxonomy. The admission pipeline never throws to
//! the host for normal policy/drift outcomes — those are structured
//! `AdmissionDecision`s. Only storage and integrity failures, which
//! invalidate the ledger's contract, surface as errors here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("audit ledger write failed: {0}")]
    LedgerWrite(#[from] paladin_ledger::LedgerError),

    #[error("ledger integrity check failed at entry {at_sequence}: {detail}")]
    LedgerIntegrity { at_sequence: u64, detail: String },

    #[error("resurrection refused: {0}")]
    Resurrection(#[from] paladin_drift::DriftError),

    #[error("policy misconfiguration on reload: {0}")]
    PolicyMisconfiguration(#[from] paladin_policy::PolicyError),
}
