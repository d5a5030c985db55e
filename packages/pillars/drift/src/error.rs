use thiserror::Error;

use crate::risk::RiskLevel;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("agent is suspended at level {level:?}")]
    Suspended { level: RiskLevel },

    #[error("resurrection limit exceeded: agent already resurrected the maximum number of times")]
    ResurrectionLimitExceeded,

    #[error("agent is not currently in KILL state, nothing to resurrect")]
    NotKilled,

    #[error("fingerprint for agent is corrupted or unreadable, quarantined")]
    FingerprintCorrupted,

    #[error(transparent)]
    Core(#[from] paladin_core::error::CoreError),
}
