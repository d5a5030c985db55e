//! `AuditLedger`: the single-writer facade over a `LedgerStore` and a
//! `Signer`, providing append/verify/snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::entry::{AuditEntry, EntryPreimage};
use crate::error::LedgerError;
use crate::signer::Signer;
use crate::store::LedgerStore;
use crate::GENESIS_HASH;

/// Outcome of `verify_chain`: either the whole chain is intact, or it
/// reports the first broken link so the caller can triage from there
/// rather than re-scanning everything themselves.
#[derive(Debug, Clone, Serialize)]
pub enum ChainVerification {
    Intact { entries_checked: u64 },
    Broken { at_sequence: u64, detail: String },
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainVerification::Intact { .. })
    }
}

/// A point-in-time forensic export: the full entry list plus the
/// verification outcome as of the moment it was taken.
#[derive(Debug, Clone, Serialize)]
pub struct ForensicSnapshot {
    pub taken_at: DateTime<Utc>,
    pub entry_count: u64,
    pub head_hash: String,
    pub entries: Vec<AuditEntry>,
}

pub struct AuditLedger {
    store: Box<dyn LedgerStore>,
    signer: Box<dyn Signer>,
    /// Guarantees append is a single critical section end to end: read
    /// tail hash, compute new hash, sign, persist. Without this lock two
    /// concurrent appends could both read the same tail and fork the chain.
    write_lock: Mutex<()>,
    next_sequence: AtomicU64,
    head_hash: Mutex<String>,
}

impl AuditLedger {
    pub fn open(store: Box<dyn LedgerStore>, signer: Box<dyn Signer>) -> Result<Self, LedgerError> {
        let existing = store.read_all()?;
        let next_sequence = existing.len() as u64;
        let head_hash = existing
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        Ok(Self {
            store,
            signer,
            write_lock: Mutex::new(()),
            next_sequence: AtomicU64::new(next_sequence),
            head_hash: Mutex::new(head_hash),
        })
    }

    /// Append one payload to the ledger, returning the entry as written.
    pub fn append(&self, payload: impl Serialize) -> Result<AuditEntry, LedgerError> {
        let payload = serde_json::to_value(payload)?;
        let _guard = self.write_lock.lock();

        let sequence = self.next_sequence.load(Ordering::SeqCst);
        let mut head = self.head_hash.lock();
        let recorded_at = Utc::now();

        let preimage = EntryPreimage {
            sequence,
            recorded_at,
            payload: &payload,
            previous_hash: head.as_str(),
        };
        let hash = paladin_core::canonical::content_hash(&preimage)?;
        let signature = self.signer.sign(hash.as_bytes());

        let entry = AuditEntry {
            sequence,
            recorded_at,
            payload,
            previous_hash: head.clone(),
            hash: hash.clone(),
            signature,
            signer: self.signer.signer_id().to_string(),
            demo_signed: self.signer.is_demo(),
        };

        self.store.append(&entry)?;
        *head = hash;
        self.next_sequence.store(sequence + 1, Ordering::SeqCst);

        info!(
            sequence = entry.sequence,
            hash = %entry.hash,
            demo_signed = entry.demo_signed,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Walk every entry, recomputing its hash from its recorded payload
    /// and checking both the chain link and the signature. Independent of
    /// `append`'s in-memory state: a tampered on-disk entry is caught even
    /// if this ledger handle never appended anything itself.
    pub fn verify_chain(&self) -> Result<ChainVerification, LedgerError> {
        let entries = self.store.read_all()?;
        let mut expected_previous = GENESIS_HASH.to_string();

        for entry in &entries {
            if entry.previous_hash != expected_previous {
                warn!(sequence = entry.sequence, "chain link mismatch detected");
                return Ok(ChainVerification::Broken {
                    at_sequence: entry.sequence,
                    detail: format!(
                        "expected previous_hash {}, found {}",
                        expected_previous, entry.previous_hash
                    ),
                });
            }

            let preimage = EntryPreimage {
                sequence: entry.sequence,
                recorded_at: entry.recorded_at,
                payload: &entry.payload,
                previous_hash: &entry.previous_hash,
            };
            let recomputed = paladin_core::canonical::content_hash(&preimage)?;
            if recomputed != entry.hash {
                return Ok(ChainVerification::Broken {
                    at_sequence: entry.sequence,
                    detail: "recomputed hash does not match stored hash".to_string(),
                });
            }

            if !self.signer.verify(entry.hash.as_bytes(), &entry.signature) {
                return Ok(ChainVerification::Broken {
                    at_sequence: entry.sequence,
                    detail: "signature does not verify".to_string(),
                });
            }

            expected_previous = entry.hash.clone();
        }

        Ok(ChainVerification::Intact {
            entries_checked: entries.len() as u64,
        })
    }

    pub fn snapshot(&self) -> Result<ForensicSnapshot, LedgerError> {
        let entries = self.store.read_all()?;
        let head_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        Ok(ForensicSnapshot {
            taken_at: Utc::now(),
            entry_count: entries.len() as u64,
            head_hash,
            entries,
        })
    }

    /// Export the ledger as a single canonical JSON document, suitable
    /// for handing to an external auditor.
    pub fn export(&self) -> Result<Value, LedgerError> {
        let snapshot = self.snapshot()?;
        Ok(serde_json::to_value(snapshot)?)
    }
}
