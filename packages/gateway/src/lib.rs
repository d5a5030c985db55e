//! Paladin Gateway: composes the policy engine, drift engine, plan
//! simulator, and audit ledger behind a host-visible admission API.
//! No independent business logic — sequencing the admission pipeline and
//! shaping ledger entries is all this crate does.

pub mod config;
pub mod core;
pub mod error;

pub use config::GatewayConfig;
pub use core::{AdmissionDecision, EventKind, PaladinCore};
pub use error::GatewayError;
