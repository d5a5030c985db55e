//! `Fingerprint`: the per-agent behavioral profile the drift engine scores
//! every new intent against. Mutated in place by [`crate::engine::DriftEngine`]
//! under the agent's exclusive lock; never shared by reference across a
//! lock boundary.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use paladin_core::{AgentId, Intent};

use crate::config::DriftConfig;

/// One entry in the bounded intent-history ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub intent_id: String,
    pub capability: String,
    pub submitted_at: DateTime<Utc>,
    pub was_violation: bool,
}

/// Fixed-capacity ring buffer over [`HistoryEntry`]. A `Vec` that only
/// ever grows to `capacity` then overwrites from the front by rotation —
/// chosen over a growing list per the design notes (centroid
/// recomputation is O(W) and W is small, so there's no reason to pay for
/// an unbounded history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: Vec<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: Vec::with_capacity(capacity),
        }
    }

    /// Push, dropping the oldest entry once at capacity. Order is always
    /// oldest-first, so `items.last()` is the most recent.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.remove(0);
        }
        self.items.push(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

/// The statistical profile of one agent's normal behavior, updated on
/// every intent it submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub agent_id: AgentId,
    pub history: RingBuffer<HistoryEntry>,
    /// Running centroid over the embeddings of entries currently in
    /// `history`. Recomputed from scratch on every insert (not updated
    /// incrementally): correctness over micro-optimization, per design.
    pub centroid: Vec<f32>,
    /// The embeddings backing `history`, kept parallel to it so the
    /// centroid can be recomputed without re-embedding anything.
    pub embeddings: RingBuffer<Vec<f32>>,
    pub capability_counts: HashMap<String, u64>,
    pub total_intents: u64,
    /// 24 buckets, one per hour-of-day, counting intents observed in
    /// that hour (UTC).
    pub hour_histogram: [u64; 24],
    /// Exponential moving average of inter-arrival time, in seconds.
    pub mean_inter_arrival_secs: Option<f64>,
    pub last_intent_at: Option<DateTime<Utc>>,
    /// Ring of `(was_violation)` flags is folded into `history`; this is
    /// the running count of how many of the last `violation_window`
    /// intents were policy DENYs, recomputed from history on read.
    pub violation_count_window: u64,
    pub max_privilege_level: u32,
    pub resurrection_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Fingerprint {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            history: RingBuffer::new(20),
            centroid: Vec::new(),
            embeddings: RingBuffer::new(20),
            capability_counts: HashMap::new(),
            total_intents: 0,
            hour_histogram: [0; 24],
            mean_inter_arrival_secs: None,
            last_intent_at: None,
            violation_count_window: 0,
            max_privilege_level: 0,
            resurrection_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_window(agent_id: AgentId, window: usize) -> Self {
        let mut fp = Self::new(agent_id);
        fp.history = RingBuffer::new(window);
        fp.embeddings = RingBuffer::new(window);
        fp
    }

    pub fn is_in_learning_phase(&self, config: &DriftConfig) -> bool {
        self.total_intents < config.learning_phase_len
    }

    /// Record one observed intent. Mutates every tracked statistic;
    /// callers own serializing access (the engine's per-agent lock).
    pub fn record(&mut self, intent: &Intent, embedding: Vec<f32>, was_violation: bool, config: &DriftConfig) {
        let entry = HistoryEntry {
            intent_id: intent.id.to_string(),
            capability: intent.capability.clone(),
            submitted_at: intent.submitted_at,
            was_violation,
        };

        if let Some(previous) = self.last_intent_at {
            let delta = (intent.submitted_at - previous).num_milliseconds() as f64 / 1000.0;
            let delta = delta.max(0.0);
            self.mean_inter_arrival_secs = Some(match self.mean_inter_arrival_secs {
                Some(mean) => config.velocity_ema_lambda * delta + (1.0 - config.velocity_ema_lambda) * mean,
                None => delta,
            });
        }
        self.last_intent_at = Some(intent.submitted_at);

        *self.capability_counts.entry(intent.capability.clone()).or_insert(0) += 1;
        self.hour_histogram[intent.submitted_at.hour() as usize] += 1;
        self.total_intents += 1;

        self.history.push(entry);
        self.embeddings.push(embedding);
        self.recompute_centroid();
        self.recompute_violation_window(config);
    }

    fn recompute_centroid(&mut self) {
        let dim = self.embeddings.iter().map(|v| v.len()).find(|&l| l > 0);
        let Some(dim) = dim else {
            self.centroid.clear();
            return;
        };
        let mut sum = vec![0f32; dim];
        let mut n = 0usize;
        for v in self.embeddings.iter() {
            if v.len() == dim {
                for (s, x) in sum.iter_mut().zip(v.iter()) {
                    *s += x;
                }
                n += 1;
            }
        }
        if n == 0 {
            self.centroid.clear();
            return;
        }
        for s in sum.iter_mut() {
            *s /= n as f32;
        }
        self.centroid = sum;
    }

    fn recompute_violation_window(&mut self, config: &DriftConfig) {
        let window = config.violation_window.max(1);
        let count = self
            .history
            .iter()
            .rev()
            .take(window)
            .filter(|e| e.was_violation)
            .count();
        self.violation_count_window = count as u64;
    }

    /// Laplace-smoothed relative frequency of `capability` in the
    /// fingerprint's capability map: `(count + alpha) / (total + alpha * distinct)`.
    pub fn capability_probability(&self, capability: &str, alpha: f64) -> f64 {
        let distinct = self.capability_counts.len().max(1) as f64;
        let count = *self.capability_counts.get(capability).unwrap_or(&0) as f64;
        let total = self.total_intents as f64;
        (count + alpha) / (total + alpha * distinct)
    }

    /// Relative mass of the hour-of-day bucket containing `at`, against
    /// the busiest bucket observed so far. `1.0` if the agent has no
    /// history yet (nothing to compare against).
    pub fn hour_bucket_relative_mass(&self, at: DateTime<Utc>) -> f64 {
        let max = *self.hour_histogram.iter().max().unwrap_or(&0);
        if max == 0 {
            return 1.0;
        }
        let bucket = self.hour_histogram[at.hour() as usize] as f64;
        bucket / max as f64
    }

    pub fn note_privilege_level(&mut self, level: u32) {
        self.max_privilege_level = self.max_privilege_level.max(level);
    }

    pub fn resurrect(&mut self) {
        self.resurrection_count += 1;
        self.violation_count_window = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent_at(capability: &str, hour: u32) -> Intent {
        let ts = Utc::now()
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc();
        Intent::new("agent-1", capability, json!({})).with_submitted_at(ts)
    }

    #[test]
    fn ring_buffer_bounds_history_to_window() {
        let mut fp = Fingerprint::with_window(AgentId::new("a"), 3);
        let config = DriftConfig::default();
        for i in 0..5 {
            fp.record(&intent_at("x", (i % 24) as u32), vec![1.0, 0.0], false, &config);
        }
        assert_eq!(fp.history.len(), 3);
        assert_eq!(fp.total_intents, 5);
    }

    #[test]
    fn centroid_tracks_mean_embedding() {
        let mut fp = Fingerprint::new(AgentId::new("a"));
        let config = DriftConfig::default();
        fp.record(&intent_at("x", 1), vec![1.0, 0.0], false, &config);
        fp.record(&intent_at("x", 1), vec![0.0, 1.0], false, &config);
        assert!((fp.centroid[0] - 0.5).abs() < 1e-6);
        assert!((fp.centroid[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn capability_probability_is_smoothed_for_unseen() {
        let fp = Fingerprint::new(AgentId::new("a"));
        let p = fp.capability_probability("never_seen", 0.01);
        assert!(p > 0.0 && p <= 1.0);
    }

    #[test]
    fn violation_window_counts_recent_denies_only() {
        let mut fp = Fingerprint::with_window(AgentId::new("a"), 20);
        let config = DriftConfig::default();
        for _ in 0..10 {
            fp.record(&intent_at("x", 1), vec![1.0], true, &config);
        }
        assert_eq!(fp.violation_count_window, 10);
    }

    #[test]
    fn resurrection_resets_violation_window_and_increments_count() {
        let mut fp = Fingerprint::new(AgentId::new("a"));
        let config = DriftConfig::default();
        fp.record(&intent_at("x", 1), vec![1.0], true, &config);
        fp.resurrect();
        assert_eq!(fp.resurrection_count, 1);
        assert_eq!(fp.violation_count_window, 0);
    }
}
