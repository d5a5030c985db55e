//! Transient per-agent risk status and drift alerts.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Ok,
    Warning,
    Throttle,
    Pause,
    Kill,
    /// A fingerprint failed to load or deserialize. Treated equivalently
    /// to `Pause` by the admission path, but surfaced distinctly so an
    /// admin knows the fingerprint itself, not just the score, needs
    /// attention.
    Unknown,
}

impl RiskLevel {
    pub fn blocks_allow(&self) -> bool {
        matches!(self, RiskLevel::Pause | RiskLevel::Kill | RiskLevel::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// One named contributing signal with its numeric contribution to the
/// composite score, used to build the "dominant signals" summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalContribution {
    pub signal: String,
    pub contribution: f64,
}

/// Emitted on any transition into WARNING/THROTTLE/PAUSE/KILL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAlert {
    pub agent_id: String,
    pub triggering_intent_id: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub dominant_signals: Vec<SignalContribution>,
    pub explanation: String,
    pub severity: AlertSeverity,
    pub suggested_admin_action: String,
    pub embedding_degraded: bool,
    pub occurred_at: DateTime<Utc>,
}

const HISTORY_CAPACITY: usize = 50;

/// Read-only runtime snapshot of an agent's current risk status, derived
/// from its fingerprint plus the latest scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub agent_id: String,
    pub score: f64,
    pub level: RiskLevel,
    pub score_history: VecDeque<f64>,
    pub last_transition_at: DateTime<Utc>,
    pub pause_or_kill_reason: Option<String>,
}

impl RiskState {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            score: 0.0,
            level: RiskLevel::Ok,
            score_history: VecDeque::with_capacity(HISTORY_CAPACITY),
            last_transition_at: Utc::now(),
            pause_or_kill_reason: None,
        }
    }

    pub fn push_score(&mut self, score: f64) {
        if self.score_history.len() == HISTORY_CAPACITY {
            self.score_history.pop_front();
        }
        self.score_history.push_back(score);
        self.score = score;
    }

    pub fn transition_to(&mut self, level: RiskLevel, reason: Option<String>) {
        self.level = level;
        self.last_transition_at = Utc::now();
        self.pause_or_kill_reason = reason;
    }
}
