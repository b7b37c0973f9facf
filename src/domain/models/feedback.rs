//! Learning feedback data model (spec §3.5, §4.11).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hypothesis evaluated as part of a completed goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisOutcome {
    pub id: String,
    pub confidence_pred: f64,
    pub accuracy: f64,
}

impl HypothesisOutcome {
    /// `predicted_confidence - accuracy`, per spec §4.11 step 2.
    pub fn calibration_error(&self) -> f64 {
        self.confidence_pred - self.accuracy
    }
}

/// Per-goal-completion feedback record (spec §3.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub goal_id: String,
    pub domain: String,
    pub hypotheses: Vec<HypothesisOutcome>,
    pub trace_quality: f64,
    pub outcome_correlation: f64,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn mean_calibration_error(&self) -> f64 {
        if self.hypotheses.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.hypotheses.iter().map(HypothesisOutcome::calibration_error).sum();
        sum / self.hypotheses.len() as f64
    }

    pub fn mean_accuracy(&self) -> f64 {
        if self.hypotheses.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.hypotheses.iter().map(|h| h.accuracy).sum();
        sum / self.hypotheses.len() as f64
    }
}

/// Per-domain exploration parameters (spec §3.5, `exploration_heuristics:{domain}`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExplorationHeuristics {
    pub exploration_rate: f64,
    pub curiosity_bonus: f64,
}

impl Default for ExplorationHeuristics {
    fn default() -> Self {
        Self {
            exploration_rate: 0.3,
            curiosity_bonus: 1.0,
        }
    }
}
