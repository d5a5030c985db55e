use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize ledger entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("hash chain broken at entry {at_id}: expected previous_hash {expected}, found {found}")]
    ChainBroken {
        at_id: u64,
        expected: String,
        found: String,
    },

    #[error("entry {at_id} signature does not verify")]
    SignatureInvalid { at_id: u64 },

    #[error("ledger writer lock poisoned")]
    WriterPoisoned,

    #[error("ledger store is empty, nothing to snapshot")]
    EmptyLedger,

    #[error(transparent)]
    Core(#[from] paladin_core::error::CoreError),
}
