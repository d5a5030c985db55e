//! Shared low-level error kind. Pillar crates define their own richer
//! error enums (`PolicyError`, `DriftError`, ...) and wrap this one where a
//! core operation (canonical encoding, embedding lookup) can fail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to encode value canonically: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),
}
