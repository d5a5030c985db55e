//! The composite risk score: a pure function of a fingerprint and the
//! latest observed intent. No mutation happens here — [`crate::engine::DriftEngine`]
//! calls `score` only after the fingerprint has already been updated with
//! the new intent, so the score is always recomputed fresh from state
//! rather than nudged incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paladin_core::Intent;

use crate::config::DriftConfig;
use crate::embedding::cosine_similarity;
use crate::fingerprint::Fingerprint;
use crate::risk::SignalContribution;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub embedding_drift: f64,
    pub capability_surprisal: f64,
    pub violation_rate: f64,
    pub velocity_anomaly: f64,
    pub temporal_contextual: f64,
    pub composite: f64,
}

impl ScoreBreakdown {
    /// Top two signals by their weighted contribution, descending.
    pub fn dominant_signals(&self, weights: &crate::config::SignalWeights) -> Vec<SignalContribution> {
        let mut contributions = vec![
            ("embedding_drift", self.embedding_drift * weights.embedding_drift),
            (
                "capability_surprisal",
                self.capability_surprisal * weights.capability_surprisal,
            ),
            ("violation_rate", self.violation_rate * weights.violation_rate),
            ("velocity_anomaly", self.velocity_anomaly * weights.velocity_anomaly),
            (
                "temporal_contextual",
                self.temporal_contextual * weights.temporal_contextual,
            ),
        ];
        contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        contributions
            .into_iter()
            .take(2)
            .map(|(signal, contribution)| SignalContribution {
                signal: signal.to_string(),
                contribution,
            })
            .collect()
    }
}

/// Compute every sub-signal for `intent` against `fingerprint` (which must
/// already include `intent` in its history — the score is a function of
/// post-update state), then combine via the configured weights.
///
/// During the learning phase the embedding term is suppressed (weight 0)
/// and its weight redistributed proportionally across the other four,
/// per the explicit policy knob in [`DriftConfig::suppress_embedding_during_learning`].
pub fn score(
    fingerprint: &Fingerprint,
    intent: &Intent,
    new_embedding: &[f32],
    was_violation_just_recorded: bool,
    config: &DriftConfig,
) -> ScoreBreakdown {
    let embedding_drift = embedding_drift_signal(fingerprint, new_embedding);
    let capability_surprisal = capability_surprisal_signal(fingerprint, intent, config);
    let violation_rate = violation_rate_signal(fingerprint, config);
    let velocity_anomaly = velocity_anomaly_signal(fingerprint, intent.submitted_at, config);
    let temporal_contextual = temporal_contextual_signal(fingerprint, intent.submitted_at);
    let _ = was_violation_just_recorded; // already folded into fingerprint.violation_count_window

    let in_learning = fingerprint.is_in_learning_phase(config);
    let weights = effective_weights(config, in_learning);

    let composite = embedding_drift * weights.embedding_drift
        + capability_surprisal * weights.capability_surprisal
        + violation_rate * weights.violation_rate
        + velocity_anomaly * weights.velocity_anomaly
        + temporal_contextual * weights.temporal_contextual;

    ScoreBreakdown {
        embedding_drift,
        capability_surprisal,
        violation_rate,
        velocity_anomaly,
        temporal_contextual,
        composite: composite.clamp(0.0, 1.0),
    }
}

/// Weights actually applied for this scoring pass: unchanged outside the
/// learning phase, or with the embedding weight zeroed and redistributed
/// proportionally to the remaining four during it.
pub fn effective_weights(config: &DriftConfig, in_learning: bool) -> crate::config::SignalWeights {
    let w = config.weights.clone();
    if !in_learning || !config.suppress_embedding_during_learning {
        return w;
    }
    let remainder = w.capability_surprisal + w.violation_rate + w.velocity_anomaly + w.temporal_contextual;
    if remainder <= 0.0 {
        return w;
    }
    let scale = (remainder + w.embedding_drift) / remainder;
    crate::config::SignalWeights {
        embedding_drift: 0.0,
        capability_surprisal: w.capability_surprisal * scale,
        violation_rate: w.violation_rate * scale,
        velocity_anomaly: w.velocity_anomaly * scale,
        temporal_contextual: w.temporal_contextual * scale,
    }
}

fn embedding_drift_signal(fingerprint: &Fingerprint, new_embedding: &[f32]) -> f64 {
    if fingerprint.centroid.is_empty() || new_embedding.is_empty() {
        return 0.0;
    }
    (1.0 - cosine_similarity(new_embedding, &fingerprint.centroid)).clamp(0.0, 1.0)
}

fn capability_surprisal_signal(fingerprint: &Fingerprint, intent: &Intent, config: &DriftConfig) -> f64 {
    let capabilities: Vec<&str> = intent.capability.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let capabilities = if capabilities.is_empty() {
        vec![intent.capability.as_str()]
    } else {
        capabilities
    };
    let mean_surprisal: f64 = capabilities
        .iter()
        .map(|c| {
            let p = fingerprint.capability_probability(c, config.capability_laplace_alpha);
            -p.ln()
        })
        .sum::<f64>()
        / capabilities.len() as f64;
    let x = mean_surprisal.max(0.0);
    (x / (x + config.capability_squash_k)).clamp(0.0, 1.0)
}

fn violation_rate_signal(fingerprint: &Fingerprint, config: &DriftConfig) -> f64 {
    (fingerprint.violation_count_window as f64 / config.violation_window.max(1) as f64).clamp(0.0, 1.0)
}

fn velocity_anomaly_signal(fingerprint: &Fingerprint, now: DateTime<Utc>, config: &DriftConfig) -> f64 {
    let Some(baseline) = fingerprint.mean_inter_arrival_secs else {
        return 0.0;
    };
    let Some(previous) = fingerprint.last_intent_at else {
        return 0.0;
    };
    if baseline <= 0.0 {
        return 0.0;
    }
    let observed = (now - previous).num_milliseconds() as f64 / 1000.0;
    let delta = (observed - baseline).abs();
    (delta / baseline).clamp(0.0, 1.0)
}

fn temporal_contextual_signal(fingerprint: &Fingerprint, at: DateTime<Utc>) -> f64 {
    (1.0 - fingerprint.hour_bucket_relative_mass(at)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paladin_core::AgentId;
    use serde_json::json;

    #[test]
    fn score_stays_within_unit_interval() {
        let config = DriftConfig::default();
        let mut fp = Fingerprint::new(AgentId::new("a"));
        for i in 0..5 {
            let intent = Intent::new("a", format!("cap.{i}"), json!({}));
            fp.record(&intent, vec![i as f32, 0.0], i % 2 == 0, &config);
        }
        let intent = Intent::new("a", "cap.new", json!({}));
        let breakdown = score(&fp, &intent, &[9.0, 9.0], false, &config);
        assert!((0.0..=1.0).contains(&breakdown.composite));
        assert!((0.0..=1.0).contains(&breakdown.embedding_drift));
        assert!((0.0..=1.0).contains(&breakdown.capability_surprisal));
    }

    #[test]
    fn learning_phase_zeroes_embedding_weight() {
        let config = DriftConfig::default();
        let w = effective_weights(&config, true);
        assert_eq!(w.embedding_drift, 0.0);
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn outside_learning_phase_weights_are_unchanged() {
        let config = DriftConfig::default();
        let w = effective_weights(&config, false);
        assert_eq!(w.embedding_drift, config.weights.embedding_drift);
    }

    #[test]
    fn novel_capability_scores_higher_surprisal_than_frequent_one() {
        let config = DriftConfig::default();
        let mut fp = Fingerprint::new(AgentId::new("a"));
        for _ in 0..10 {
            let intent = Intent::new("a", "email.send", json!({}));
            fp.record(&intent, vec![1.0, 0.0], false, &config);
        }
        let frequent = capability_surprisal_signal(&fp, &Intent::new("a", "email.send", json!({})), &config);
        let novel = capability_surprisal_signal(&fp, &Intent::new("a", "hris.delete_all", json!({})), &config);
        assert!(novel > frequent);
    }
}
