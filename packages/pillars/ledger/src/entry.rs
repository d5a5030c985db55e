//! `AuditEntry`: one immutable, hash-linked record in the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record appended to the ledger. `hash` is the SHA-256 of this
/// entry's canonical payload *including* `previous_hash`, so the chain
/// cannot be reordered without every downstream hash changing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    /// Free-form structured payload: a verdict, a risk-state transition, a
    /// simulation result, whatever the caller is recording.
    pub payload: Value,
    pub previous_hash: String,
    pub hash: String,
    pub signature: String,
    pub signer: String,
    /// True when `signature` was produced by the HMAC demo signer rather
    /// than a real asymmetric key. Forensic exports must never claim
    /// demo-signed entries have the integrity properties of real ones.
    pub demo_signed: bool,
}

/// The subset of an entry's fields that get hashed and signed — everything
/// except the hash/signature themselves, which are computed from this.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct EntryPreimage<'a> {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub payload: &'a Value,
    pub previous_hash: &'a str,
}
