//! Paladin Ledger: the append-only, hash-chained, signed audit trail
//! every admission decision is written to.
//!
//! Every entry carries the SHA-256 of its canonical payload, a link to the
//! previous entry's hash, and a signature over that link — so altering or
//! deleting any entry breaks `verify_chain` for every entry after it.

pub mod entry;
pub mod error;
pub mod ledger;
pub mod signer;
pub mod store;

pub use entry::AuditEntry;
pub use error::LedgerError;
pub use ledger::{AuditLedger, ChainVerification, ForensicSnapshot};
pub use signer::{Ed25519Signer, HmacDemoSigner, Signer};
pub use store::{FileStore, InMemoryStore, LedgerStore};

/// `previous_hash` of the first entry ever appended: 64 zeros, matching
/// the hex width of a real SHA-256 digest.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
