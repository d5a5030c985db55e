//! Tunable weights, thresholds, and policy knobs for the drift engine.
//! Kept as plain `serde`-friendly data so a deployment can ship its own
//! profile as a config document rather than a recompile.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalWeights {
    pub embedding_drift: f64,
    pub capability_surprisal: f64,
    pub violation_rate: f64,
    pub velocity_anomaly: f64,
    pub temporal_contextual: f64,
}

impl SignalWeights {
    pub fn sum(&self) -> f64 {
        self.embedding_drift
            + self.capability_surprisal
            + self.violation_rate
            + self.velocity_anomaly
            + self.temporal_contextual
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            embedding_drift: 0.30,
            capability_surprisal: 0.25,
            violation_rate: 0.20,
            velocity_anomaly: 0.15,
            temporal_contextual: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    pub weights: SignalWeights,
    /// Ring buffer size for intent history and the embedding centroid window.
    pub history_window: usize,
    /// Number of intents during which PAUSE/KILL thresholds never fire.
    pub learning_phase_len: u64,
    /// Window size for the violation-rate signal (spec fixes this at 10).
    pub violation_window: usize,
    pub threshold_warning: f64,
    pub threshold_throttle: f64,
    pub threshold_pause: f64,
    pub threshold_kill: f64,
    pub max_resurrections: u32,
    /// Policy knob (see design notes): the composite risk a resurrected
    /// agent's fingerprint is reset to. Recommended default is the
    /// WARNING threshold minus epsilon.
    pub resurrection_reset_score: f64,
    /// Policy knob: during the learning phase, suppress the embedding
    /// term entirely (weight 0) and redistribute its weight
    /// proportionally across the other four signals, rather than scoring
    /// it normally against a still-forming centroid.
    pub suppress_embedding_during_learning: bool,
    pub throttle_actions_per_minute: u32,
    pub embedding_dimensions: usize,
    /// EMA smoothing factor for inter-arrival time.
    pub velocity_ema_lambda: f64,
    /// Laplace smoothing alpha for unseen capabilities.
    pub capability_laplace_alpha: f64,
    /// Squashing constant `k` in `x / (x + k)` for capability surprisal.
    pub capability_squash_k: f64,
    /// Number of admitted intents between periodic fingerprint
    /// checkpoints the gateway appends to the ledger as `FORENSIC_SNAPSHOT`
    /// entries, used to shorten cold-start replay. Snapshots are an
    /// optimization only — replay from genesis with this set arbitrarily
    /// high still reconstructs identical state.
    pub snapshot_interval: u64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            history_window: 20,
            learning_phase_len: 20,
            violation_window: 10,
            threshold_warning: 0.30,
            threshold_throttle: 0.50,
            threshold_pause: 0.70,
            threshold_kill: 0.85,
            max_resurrections: 3,
            resurrection_reset_score: 0.29,
            suppress_embedding_during_learning: true,
            throttle_actions_per_minute: 10,
            embedding_dimensions: 128,
            velocity_ema_lambda: 0.2,
            capability_laplace_alpha: 0.01,
            capability_squash_k: 3.0,
            snapshot_interval: 50,
        }
    }
}

impl DriftConfig {
    /// A stricter profile: lower thresholds, shorter learning phase.
    pub fn strict() -> Self {
        Self {
            threshold_warning: 0.20,
            threshold_throttle: 0.35,
            threshold_pause: 0.55,
            threshold_kill: 0.70,
            learning_phase_len: 10,
            ..Self::default()
        }
    }

    /// A looser profile for noisy/experimental agents.
    pub fn permissive() -> Self {
        Self {
            threshold_warning: 0.45,
            threshold_throttle: 0.65,
            threshold_pause: 0.85,
            threshold_kill: 0.95,
            learning_phase_len: 40,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = SignalWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }
}
