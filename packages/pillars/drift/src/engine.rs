//! `DriftEngine`: owns every agent's fingerprint and risk state, scores
//! each new intent, and enforces threshold-driven transitions.
//!
//! Fingerprints live behind a sharded map: a read-mostly outer
//! `RwLock<HashMap<..>>` locates an agent's `Arc<Mutex<AgentRecord>>`, and
//! all mutation happens under that per-agent mutex. No call ever holds
//! more than one agent's lock, so there is no cross-agent deadlock
//! surface, and unrelated agents never contend with each other.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use paladin_core::ports::EmbeddingProvider;
use paladin_core::{AgentId, Intent};
use paladin_policy::Decision;

use crate::config::DriftConfig;
use crate::embedding::HashEmbedder;
use crate::error::DriftError;
use crate::fingerprint::Fingerprint;
use crate::risk::{AlertSeverity, DriftAlert, RiskLevel, RiskState, SignalContribution};
use crate::scoring::{self, ScoreBreakdown};

struct AgentRecord {
    fingerprint: Fingerprint,
    risk_state: RiskState,
    /// Timestamps of recent intents, used only while `THROTTLE`d to
    /// enforce `throttle_actions_per_minute` without doing full scoring
    /// work on every rejected call.
    recent_actions: VecDeque<chrono::DateTime<Utc>>,
}

impl AgentRecord {
    fn new(agent_id: AgentId, window: usize) -> Self {
        Self {
            fingerprint: Fingerprint::with_window(agent_id.clone(), window),
            risk_state: RiskState::new(agent_id.as_str()),
            recent_actions: VecDeque::new(),
        }
    }
}

/// Result of one `observe` call: the freshly computed score and level,
/// any alert raised by this transition, and flags the gateway needs to
/// decide follow-up actions (e.g. whether to capture a forensic
/// snapshot) without reaching into engine internals.
#[derive(Debug, Clone)]
pub struct ObserveOutcome {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub breakdown: ScoreBreakdown,
    pub alert: Option<DriftAlert>,
    pub embedding_degraded: bool,
    pub entered_kill: bool,
}

pub struct DriftEngine {
    config: DriftConfig,
    records: RwLock<HashMap<AgentId, Arc<Mutex<AgentRecord>>>>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    fallback: HashEmbedder,
}

impl DriftEngine {
    pub fn new(config: DriftConfig) -> Self {
        let fallback = HashEmbedder::new(config.embedding_dimensions);
        Self {
            config,
            records: RwLock::new(HashMap::new()),
            provider: None,
            fallback,
        }
    }

    pub fn with_provider(config: DriftConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let mut engine = Self::new(config);
        engine.provider = Some(provider);
        engine
    }

    fn record_for(&self, agent_id: &AgentId) -> Arc<Mutex<AgentRecord>> {
        if let Some(existing) = self.records.read().get(agent_id) {
            return existing.clone();
        }
        let mut write = self.records.write();
        write
            .entry(agent_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(AgentRecord::new(agent_id.clone(), self.config.history_window))))
            .clone()
    }

    /// Read-only snapshot of an agent's current risk status. Returns a
    /// fresh `RiskState` for an agent never observed before, rather than
    /// an error: checking status on an unknown agent is not exceptional.
    pub fn status(&self, agent_id: &AgentId) -> RiskState {
        let record = self.record_for(agent_id);
        let guard = record.lock();
        guard.risk_state.clone()
    }

    /// A clone of the agent's current fingerprint, for callers that need
    /// to score against live state without holding the agent's lock —
    /// the plan simulator's `simulate`, and forensic snapshot capture on
    /// KILL. The clone is immediately detached: nothing written to it
    /// flows back into the real fingerprint.
    pub fn fingerprint_snapshot(&self, agent_id: &AgentId) -> Fingerprint {
        let record = self.record_for(agent_id);
        let guard = record.lock();
        guard.fingerprint.clone()
    }

    /// Score and record one intent against the agent's fingerprint,
    /// returning the resulting risk state and any alert. Uses the
    /// fallback hash embedding directly; see [`Self::observe_with_embedding_provider`]
    /// for the deadline-bounded real-provider path.
    pub fn observe(&self, intent: &Intent, policy_decision: Decision) -> Result<ObserveOutcome, DriftError> {
        let embedding = self.fallback.embed_intent(intent);
        self.observe_with_embedding(intent, policy_decision, embedding, false)
    }

    /// Same as [`Self::observe`], but first attempts the real embedding
    /// provider with `deadline`. On timeout or error, falls back to the
    /// deterministic hash embedding and tags the outcome
    /// `embedding_degraded = true` — the pipeline is never blocked on an
    /// unreachable provider.
    pub async fn observe_with_embedding_provider(
        &self,
        intent: &Intent,
        policy_decision: Decision,
        deadline: Duration,
    ) -> Result<ObserveOutcome, DriftError> {
        let (embedding, degraded) = match &self.provider {
            Some(provider) => match tokio::time::timeout(deadline, provider.embed(intent)).await {
                Ok(Ok(vector)) => (vector, false),
                Ok(Err(err)) => {
                    warn!(error = %err, "embedding provider failed, falling back to hash embedding");
                    (self.fallback.embed_intent(intent), true)
                }
                Err(_) => {
                    warn!("embedding provider timed out, falling back to hash embedding");
                    (self.fallback.embed_intent(intent), true)
                }
            },
            None => (self.fallback.embed_intent(intent), false),
        };
        self.observe_with_embedding(intent, policy_decision, embedding, degraded)
    }

    fn observe_with_embedding(
        &self,
        intent: &Intent,
        policy_decision: Decision,
        embedding: Vec<f32>,
        embedding_degraded: bool,
    ) -> Result<ObserveOutcome, DriftError> {
        let record = self.record_for(&intent.agent_id);
        let mut guard = record.lock();

        // Post-KILL freeze: an agent at PAUSE/KILL/UNKNOWN produces no
        // further fingerprint mutation or ALLOW verdicts until
        // resurrected or resumed.
        if guard.risk_state.level.blocks_allow() {
            return Err(DriftError::Suspended {
                level: guard.risk_state.level,
            });
        }

        let was_violation = matches!(policy_decision, Decision::Deny);
        Ok(self.apply_intent(&mut guard, intent, was_violation, embedding, embedding_degraded, true))
    }

    /// Replay one historical intent against an agent's fingerprint
    /// without emitting alerts or touching the ledger — used only by
    /// cold-start reconstruction (see [`Self::load_snapshot`] and
    /// `paladin_gateway::PaladinCore::restore`), where the decision this
    /// intent produced already happened and only the resulting
    /// fingerprint/risk state needs to be rebuilt. Mirrors `observe`'s
    /// post-KILL freeze: replaying an intent that arrives after the agent
    /// was already suspended at the time of replay is a silent no-op,
    /// exactly as the original non-mutating deny was.
    pub fn restore_intent(&self, intent: &Intent, policy_decision: Decision) {
        let record = self.record_for(&intent.agent_id);
        let mut guard = record.lock();
        if guard.risk_state.level.blocks_allow() {
            return;
        }
        let was_violation = matches!(policy_decision, Decision::Deny);
        let embedding = self.fallback.embed_intent(intent);
        self.apply_intent(&mut guard, intent, was_violation, embedding, false, false);
    }

    /// Mutates the fingerprint and recomputes risk state for one intent.
    /// Shared by the live `observe` path and the replay-only
    /// `restore_intent` path; `emit_alert` suppresses alert construction
    /// (and the `tracing` call announcing it) during replay, where the
    /// alert already fired the first time this intent was observed.
    fn apply_intent(
        &self,
        guard: &mut AgentRecord,
        intent: &Intent,
        was_violation: bool,
        embedding: Vec<f32>,
        embedding_degraded: bool,
        emit_alert: bool,
    ) -> ObserveOutcome {
        guard
            .fingerprint
            .record(intent, embedding.clone(), was_violation, &self.config);

        let breakdown = scoring::score(&guard.fingerprint, intent, &embedding, was_violation, &self.config);
        let score = breakdown.composite;

        let in_learning = guard.fingerprint.is_in_learning_phase(&self.config);
        let mut computed_level = self.level_for_score(score);
        if in_learning && matches!(computed_level, RiskLevel::Pause | RiskLevel::Kill) {
            computed_level = RiskLevel::Throttle;
        }

        // Transitions are one-directional except through resurrection /
        // admin resume: never step a risk level back down purely because
        // this intent happened to score lower than a prior one.
        let previous_level = guard.risk_state.level;
        let new_level = std::cmp::max(previous_level, computed_level);

        guard.risk_state.push_score(score);

        let mut alert = None;
        let entered_kill = new_level == RiskLevel::Kill && previous_level != RiskLevel::Kill;
        if new_level > previous_level
            && matches!(new_level, RiskLevel::Warning | RiskLevel::Pause | RiskLevel::Kill)
        {
            let dominant_signals = breakdown.dominant_signals(&scoring::effective_weights(&self.config, in_learning));
            let reason = level_reason(new_level, &dominant_signals);
            guard.risk_state.transition_to(new_level, Some(reason.clone()));
            if emit_alert {
                let built = build_alert(
                    &intent.agent_id,
                    &intent.id.to_string(),
                    score,
                    new_level,
                    dominant_signals,
                    embedding_degraded,
                );
                info!(
                    agent_id = %intent.agent_id,
                    risk_level = ?new_level,
                    risk_score = score,
                    "drift alert raised"
                );
                alert = Some(built);
            }
        } else if new_level != previous_level {
            guard.risk_state.transition_to(new_level, None);
        }

        ObserveOutcome {
            risk_score: score,
            risk_level: new_level,
            breakdown,
            alert,
            embedding_degraded,
            entered_kill,
        }
    }

    /// Installs a previously captured fingerprint and risk state for an
    /// agent, replacing whatever (if anything) is currently held — the
    /// fast-forward path cold-start reconstruction uses to skip straight
    /// to a periodic `FORENSIC_SNAPSHOT` checkpoint instead of replaying
    /// every intent since genesis. Rejects and quarantines the agent into
    /// `UNKNOWN` (spec.md §4.2's "fingerprint corruption detected on
    /// load" path) if the snapshot fails basic structural validation,
    /// rather than installing state that could silently misscore future
    /// intents.
    pub fn load_snapshot(
        &self,
        agent_id: &AgentId,
        fingerprint: Fingerprint,
        risk_state: RiskState,
    ) -> Result<(), DriftError> {
        if fingerprint.agent_id != *agent_id || risk_state.agent_id != agent_id.as_str() {
            self.quarantine(agent_id, "fingerprint snapshot agent id does not match its own record on load");
            return Err(DriftError::FingerprintCorrupted);
        }
        if fingerprint.history.len() > self.config.history_window {
            self.quarantine(agent_id, "fingerprint snapshot history exceeds the configured window");
            return Err(DriftError::FingerprintCorrupted);
        }

        let record = self.record_for(agent_id);
        let mut guard = record.lock();
        guard.fingerprint = fingerprint;
        guard.risk_state = risk_state;
        Ok(())
    }

    /// Consult `THROTTLE` backpressure without doing any scoring work:
    /// returns `true` if this call should be denied immediately because
    /// the agent has already used its per-minute action budget.
    pub fn should_throttle_deny(&self, agent_id: &AgentId) -> bool {
        let record = self.record_for(agent_id);
        let mut guard = record.lock();
        if guard.risk_state.level != RiskLevel::Throttle {
            return false;
        }
        let now = Utc::now();
        let window_start = now - chrono::Duration::seconds(60);
        while guard.recent_actions.front().is_some_and(|t| *t < window_start) {
            guard.recent_actions.pop_front();
        }
        if guard.recent_actions.len() as u32 >= self.config.throttle_actions_per_minute {
            return true;
        }
        guard.recent_actions.push_back(now);
        false
    }

    /// Admin-approved transition of a killed agent back to `OK`. Refuses
    /// once the agent has already hit `max_resurrections`. Resets the
    /// composite risk to `resurrection_reset_score` and clears the
    /// violation counter, but preserves history and the capability map
    /// (see DESIGN.md for the Open Question decision this encodes).
    pub fn resurrect(&self, agent_id: &AgentId) -> Result<u32, DriftError> {
        let record = self.record_for(agent_id);
        let mut guard = record.lock();

        if guard.risk_state.level != RiskLevel::Kill {
            return Err(DriftError::NotKilled);
        }
        if guard.fingerprint.resurrection_count >= self.config.max_resurrections {
            return Err(DriftError::ResurrectionLimitExceeded);
        }

        guard.fingerprint.resurrect();
        guard.risk_state.transition_to(RiskLevel::Ok, None);
        guard.risk_state.push_score(self.config.resurrection_reset_score);
        guard.recent_actions.clear();
        info!(agent_id = %agent_id, resurrection_count = guard.fingerprint.resurrection_count, "agent resurrected");
        Ok(guard.fingerprint.resurrection_count)
    }

    /// Forcibly quarantine an agent into `UNKNOWN`, used when a loaded
    /// fingerprint is found to be corrupted. Equivalent to `PAUSE` for
    /// admission purposes but distinguished so an admin knows the
    /// fingerprint itself needs attention.
    pub fn quarantine(&self, agent_id: &AgentId, reason: impl Into<String>) {
        let record = self.record_for(agent_id);
        let mut guard = record.lock();
        guard.risk_state.transition_to(RiskLevel::Unknown, Some(reason.into()));
    }

    fn level_for_score(&self, score: f64) -> RiskLevel {
        let c = &self.config;
        if score >= c.threshold_kill {
            RiskLevel::Kill
        } else if score >= c.threshold_pause {
            RiskLevel::Pause
        } else if score >= c.threshold_throttle {
            RiskLevel::Throttle
        } else if score >= c.threshold_warning {
            RiskLevel::Warning
        } else {
            RiskLevel::Ok
        }
    }
}

fn level_reason(level: RiskLevel, dominant: &[SignalContribution]) -> String {
    let top = dominant.first().map(|s| s.signal.as_str()).unwrap_or("unknown");
    match level {
        RiskLevel::Warning => format!("risk score crossed WARNING threshold, dominated by {top}"),
        RiskLevel::Pause => format!("risk score crossed PAUSE threshold, dominated by {top}"),
        RiskLevel::Kill => format!("risk score crossed KILL threshold, dominated by {top}"),
        other => format!("transitioned to {other:?}"),
    }
}

fn build_alert(
    agent_id: &AgentId,
    intent_id: &str,
    score: f64,
    level: RiskLevel,
    dominant_signals: Vec<SignalContribution>,
    embedding_degraded: bool,
) -> DriftAlert {
    let top_signal = dominant_signals.first().map(|s| s.signal.clone()).unwrap_or_default();
    let explanation = match top_signal.as_str() {
        "capability_surprisal" => "capability surprisal spiked: a capability outside the agent's baseline was invoked".to_string(),
        "embedding_drift" => "intent embedding diverged sharply from the agent's behavioral centroid".to_string(),
        "violation_rate" => "policy denials over the recent window crossed the alert threshold".to_string(),
        "velocity_anomaly" => "inter-action timing deviated sharply from the agent's normal cadence".to_string(),
        "temporal_contextual" => "action occurred well outside the agent's normal hour-of-day pattern".to_string(),
        _ => "composite risk score crossed a threshold".to_string(),
    };
    let severity = match level {
        RiskLevel::Kill => AlertSeverity::Critical,
        RiskLevel::Pause => AlertSeverity::Warning,
        _ => AlertSeverity::Info,
    };
    let suggested_admin_action = match level {
        RiskLevel::Kill => "review forensic snapshot and resurrect if the action was legitimate".to_string(),
        RiskLevel::Pause => "review recent intents and resume the agent if safe".to_string(),
        RiskLevel::Warning => "monitor the agent's next few intents".to_string(),
        _ => "no action required".to_string(),
    };
    DriftAlert {
        agent_id: agent_id.to_string(),
        triggering_intent_id: intent_id.to_string(),
        risk_score: score,
        risk_level: level,
        dominant_signals,
        explanation,
        severity,
        suggested_admin_action,
        embedding_degraded,
        occurred_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent(agent: &str, capability: &str) -> Intent {
        Intent::new(agent, capability, json!({}))
    }

    #[test]
    fn benign_repeated_action_stays_ok() {
        let engine = DriftEngine::new(DriftConfig::default());
        for _ in 0..5 {
            let outcome = engine.observe(&intent("scheduler", "calendar.book"), Decision::Allow).unwrap();
            assert_eq!(outcome.risk_level, RiskLevel::Ok);
        }
    }

    #[test]
    fn fingerprint_history_bounded_to_window() {
        let engine = DriftEngine::new(DriftConfig {
            history_window: 5,
            learning_phase_len: 1000,
            ..DriftConfig::default()
        });
        for i in 0..12 {
            engine
                .observe(&intent("agent-1", &format!("cap.{i}")), Decision::Allow)
                .unwrap();
        }
        let status = engine.status(&AgentId::new("agent-1"));
        assert_eq!(status.score_history.len(), 12.min(50));
    }

    #[test]
    fn gradual_capability_widening_drifts_into_pause_or_kill() {
        let config = DriftConfig {
            learning_phase_len: 0,
            ..DriftConfig::default()
        };
        let engine = DriftEngine::new(config);
        let capability_sets = [
            "email.send",
            "email.send,hris.read",
            "email.send,hris.read,payroll.read",
            "hris.read,perf.read,hris.export",
            "hris.read,hris.export,hris.delete_all",
        ];
        let mut last_outcome = None;
        for caps in capability_sets {
            let it = intent("drifting-agent", caps);
            match engine.observe(&it, Decision::Allow) {
                Ok(outcome) => last_outcome = Some(outcome.risk_level),
                Err(DriftError::Suspended { level }) => {
                    last_outcome = Some(level);
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(matches!(last_outcome, Some(RiskLevel::Pause) | Some(RiskLevel::Kill)));
    }

    #[test]
    fn post_kill_freeze_denies_until_resurrected() {
        let config = DriftConfig {
            learning_phase_len: 0,
            threshold_kill: 0.0, // force immediate KILL on first observation
            ..DriftConfig::default()
        };
        let engine = DriftEngine::new(config);
        let agent = AgentId::new("bad-agent");
        let outcome = engine.observe(&intent("bad-agent", "x"), Decision::Allow).unwrap();
        assert_eq!(outcome.risk_level, RiskLevel::Kill);

        let err = engine.observe(&intent("bad-agent", "y"), Decision::Allow).unwrap_err();
        assert!(matches!(err, DriftError::Suspended { level: RiskLevel::Kill }));

        let resurrections = engine.resurrect(&agent).unwrap();
        assert_eq!(resurrections, 1);
        assert_eq!(engine.status(&agent).level, RiskLevel::Ok);
    }

    #[test]
    fn resurrection_cap_is_enforced() {
        let config = DriftConfig {
            learning_phase_len: 0,
            threshold_kill: 0.0,
            max_resurrections: 1,
            ..DriftConfig::default()
        };
        let engine = DriftEngine::new(config);
        let agent = AgentId::new("repeat-offender");
        engine.observe(&intent("repeat-offender", "x"), Decision::Allow).unwrap();
        engine.resurrect(&agent).unwrap();

        // drive back to KILL
        engine.observe(&intent("repeat-offender", "y"), Decision::Allow).unwrap();
        let err = engine.resurrect(&agent).unwrap_err();
        assert!(matches!(err, DriftError::ResurrectionLimitExceeded));
    }

    #[test]
    fn resurrect_on_non_killed_agent_fails() {
        let engine = DriftEngine::new(DriftConfig::default());
        let agent = AgentId::new("fine-agent");
        engine.observe(&intent("fine-agent", "x"), Decision::Allow).unwrap();
        let err = engine.resurrect(&agent).unwrap_err();
        assert!(matches!(err, DriftError::NotKilled));
    }

    #[test]
    fn restore_intent_reproduces_live_observe_state() {
        let config = DriftConfig {
            learning_phase_len: 0,
            ..DriftConfig::default()
        };
        let live = DriftEngine::new(config.clone());
        let agent = AgentId::new("replay-agent");
        let intents = [
            intent("replay-agent", "email.send"),
            intent("replay-agent", "hris.read"),
            intent("replay-agent", "payroll.read"),
        ];
        for it in &intents {
            live.observe(it, Decision::Allow).ok();
        }
        let live_status = live.status(&agent);

        let replayed = DriftEngine::new(config);
        for it in &intents {
            replayed.restore_intent(it, Decision::Allow);
        }
        let replayed_status = replayed.status(&agent);

        assert_eq!(live_status.level, replayed_status.level);
        assert_eq!(live_status.score, replayed_status.score);
        assert_eq!(live_status.score_history, replayed_status.score_history);
    }

    #[test]
    fn load_snapshot_fast_forwards_to_captured_state() {
        let engine = DriftEngine::new(DriftConfig::default());
        let agent = AgentId::new("checkpointed-agent");
        for i in 0..5 {
            engine.observe(&intent("checkpointed-agent", &format!("cap.{i}")), Decision::Allow).unwrap();
        }
        let fingerprint = engine.fingerprint_snapshot(&agent);
        let risk_state = engine.status(&agent);

        let restored = DriftEngine::new(DriftConfig::default());
        restored.load_snapshot(&agent, fingerprint, risk_state.clone()).unwrap();
        assert_eq!(restored.status(&agent).score_history, risk_state.score_history);
        assert_eq!(restored.fingerprint_snapshot(&agent).total_intents, 5);
    }

    #[test]
    fn load_snapshot_rejects_and_quarantines_on_agent_id_mismatch() {
        let engine = DriftEngine::new(DriftConfig::default());
        let wrong_agent = AgentId::new("someone-else");
        engine.observe(&intent("someone-else", "x"), Decision::Allow).unwrap();
        let fingerprint = engine.fingerprint_snapshot(&wrong_agent);
        let risk_state = engine.status(&wrong_agent);

        let restored = DriftEngine::new(DriftConfig::default());
        let target = AgentId::new("expected-agent");
        let err = restored.load_snapshot(&target, fingerprint, risk_state).unwrap_err();
        assert!(matches!(err, DriftError::FingerprintCorrupted));
        assert_eq!(restored.status(&target).level, RiskLevel::Unknown);
    }
}
