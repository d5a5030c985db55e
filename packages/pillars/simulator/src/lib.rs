//! Paladin Simulator: speculative execution of a multi-step plan against
//! non-destructive tool stubs, aggregating per-step verdicts without any
//! observable side effect on real tools or on the agent's fingerprint.

pub mod error;
pub mod result;
pub mod simulator;
pub mod stub;

pub use error::SimError;
pub use result::{OverallVerdict, SimulationResult, StepResult, StepStatus};
pub use simulator::{implied_real_level, Simulator, StepDeadline};
pub use stub::StubRegistry;
