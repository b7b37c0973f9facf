//! Learning Feedback (C11, spec §4.11): turns completed/failed goals into
//! adjustments of the per-domain learning parameters the goal poller and
//! autonomy cycle read back (`confidence_scaling`, `exploration_heuristics`,
//! `inference_weights`), plus a durable feedback record per goal.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::CoreResult;
use crate::domain::models::{ExplorationHeuristics, FeedbackRecord, HypothesisOutcome};
use crate::domain::ports::{subjects, BusEvent, EventBus, KvStore};

/// Calibration-error dead-band: scaling only moves when the mean
/// calibration error exceeds this in magnitude (spec §4.11 step 3,
/// "if mean calibration error > +ε ... if < −ε").
const CALIBRATION_EPSILON: f64 = 0.05;
const SCALING_STEP: f64 = 0.05;
const EXPLORATION_STEP: f64 = 0.02;
const INFERENCE_WEIGHT_LEARNING_RATE: f64 = 0.1;
const QUALITY_HIGH_THRESHOLD: f64 = 0.7;
const QUALITY_LOW_THRESHOLD: f64 = 0.3;
const FEEDBACK_LOG_CAP: isize = 199;

fn confidence_scaling_key(domain: &str) -> String {
    format!("confidence_scaling:{domain}")
}
fn exploration_heuristics_key(domain: &str) -> String {
    format!("exploration_heuristics:{domain}")
}
fn inference_weight_key(domain: &str, rule_id: &str) -> String {
    format!("inference_weights:{domain}:{rule_id}")
}
fn feedback_log_key(domain: &str) -> String {
    format!("feedback:{domain}")
}

/// Bounded 0-1 reasoning-quality score from trace step count (spec §4.11
/// step 2, "from number/structure of trace steps"). Saturates at 10 steps:
/// a handful of steps is already a well-formed trace, more adds little.
pub fn trace_quality_from_steps(steps: usize) -> f64 {
    (steps as f64 / 10.0).min(1.0)
}

/// Weighted combination of accuracy, calibration, and trace quality (spec
/// §4.11 step 2, "Alignment = weighted combination of the above").
pub fn alignment_score(mean_accuracy: f64, mean_calibration_error: f64, trace_quality: f64) -> f64 {
    let calibration_component = (1.0 - mean_calibration_error.abs()).clamp(0.0, 1.0);
    ((mean_accuracy.clamp(0.0, 1.0) + calibration_component + trace_quality.clamp(0.0, 1.0)) / 3.0).clamp(0.0, 1.0)
}

/// Raw payload shape the out-of-scope planner/executor attaches to
/// `goal.completed`/`goal.failed` events so C11 can score the goal without
/// a dedicated trace-store port.
#[derive(Debug, Clone, serde::Deserialize)]
struct CompletionPayload {
    goal_id: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    hypotheses: Vec<HypothesisOutcome>,
    #[serde(default)]
    trace_steps: usize,
}

pub struct LearningFeedback {
    bus: Arc<dyn EventBus>,
    kv: Arc<dyn KvStore>,
}

impl LearningFeedback {
    pub fn new(bus: Arc<dyn EventBus>, kv: Arc<dyn KvStore>) -> Self {
        Self { bus, kv }
    }

    pub fn spawn(self: Arc<Self>) {
        let completed = self.clone();
        let failed = self.clone();
        tokio::spawn(async move {
            if let Err(err) = completed.run_subscription(subjects::GOAL_COMPLETED).await {
                warn!(error = %err, "learning feedback completed-subscription ended");
            }
        });
        tokio::spawn(async move {
            if let Err(err) = failed.run_subscription(subjects::GOAL_FAILED).await {
                warn!(error = %err, "learning feedback failed-subscription ended");
            }
        });
    }

    async fn run_subscription(&self, subject: &str) -> CoreResult<()> {
        let mut rx = self.bus.subscribe(subject).await?;
        while let Some(event) = rx.recv().await {
            if let Err(err) = self.handle_event(&event).await {
                warn!(error = %err, subject, "failed to process feedback event");
            }
        }
        Ok(())
    }

    /// Processes a single `goal.completed`/`goal.failed` event (spec §4.11
    /// steps 1-4). Returns the feedback record it derived and applied.
    pub async fn handle_event(&self, event: &BusEvent) -> CoreResult<FeedbackRecord> {
        let payload: CompletionPayload = serde_json::from_value(event.payload.clone())
            .map_err(|e| crate::domain::errors::CoreError::Serialization(e.to_string()))?;

        let trace_quality = trace_quality_from_steps(payload.trace_steps);
        let record = FeedbackRecord {
            goal_id: payload.goal_id,
            domain: payload.domain,
            hypotheses: payload.hypotheses,
            trace_quality,
            outcome_correlation: 0.0,
            created_at: chrono::Utc::now(),
        };
        let alignment = alignment_score(record.mean_accuracy(), record.mean_calibration_error(), record.trace_quality);
        let mut record = record;
        record.outcome_correlation = alignment;

        self.update_confidence_scaling(&record).await?;
        self.update_exploration_heuristics(&record, alignment).await?;
        self.update_inference_weights(&record).await?;
        self.append_record(&record).await?;

        debug!(goal_id = %record.goal_id, domain = %record.domain, alignment, "applied learning feedback");
        Ok(record)
    }

    async fn update_confidence_scaling(&self, record: &FeedbackRecord) -> CoreResult<()> {
        let key = confidence_scaling_key(&record.domain);
        let mut scaling = self.kv.get(&key).await?.and_then(|v| v.parse::<f64>().ok()).unwrap_or(1.0);
        let mce = record.mean_calibration_error();
        if mce > CALIBRATION_EPSILON {
            scaling -= SCALING_STEP;
        } else if mce < -CALIBRATION_EPSILON {
            scaling += SCALING_STEP;
        }
        self.kv.set(&key, &scaling.clamp(0.1, 3.0).to_string()).await
    }

    async fn update_exploration_heuristics(&self, record: &FeedbackRecord, alignment: f64) -> CoreResult<()> {
        let key = exploration_heuristics_key(&record.domain);
        let mut heuristics = match self.kv.get(&key).await? {
            Some(raw) => serde_json::from_str::<ExplorationHeuristics>(&raw).unwrap_or_default(),
            None => ExplorationHeuristics::default(),
        };

        if record.trace_quality < QUALITY_LOW_THRESHOLD {
            heuristics.exploration_rate += EXPLORATION_STEP;
            heuristics.curiosity_bonus += EXPLORATION_STEP;
        } else if record.trace_quality >= QUALITY_HIGH_THRESHOLD && alignment >= QUALITY_HIGH_THRESHOLD {
            heuristics.exploration_rate -= EXPLORATION_STEP;
            heuristics.curiosity_bonus -= EXPLORATION_STEP;
        }
        heuristics.exploration_rate = heuristics.exploration_rate.clamp(0.0, 1.0);
        heuristics.curiosity_bonus = heuristics.curiosity_bonus.clamp(0.0, 5.0);

        let serialized = serde_json::to_string(&heuristics)
            .map_err(|e| crate::domain::errors::CoreError::Serialization(e.to_string()))?;
        self.kv.set(&key, &serialized).await
    }

    async fn update_inference_weights(&self, record: &FeedbackRecord) -> CoreResult<()> {
        for hypothesis in &record.hypotheses {
            let key = inference_weight_key(&record.domain, &hypothesis.id);
            let weight = self.kv.get(&key).await?.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.5);
            let updated = weight + (hypothesis.accuracy - weight) * INFERENCE_WEIGHT_LEARNING_RATE;
            self.kv.set(&key, &updated.clamp(0.0, 1.0).to_string()).await?;
        }
        Ok(())
    }

    async fn append_record(&self, record: &FeedbackRecord) -> CoreResult<()> {
        let key = feedback_log_key(&record.domain);
        let serialized = serde_json::to_string(record)
            .map_err(|e| crate::domain::errors::CoreError::Serialization(e.to_string()))?;
        self.kv.lpush(&key, &serialized).await?;
        self.kv.ltrim(&key, 0, FEEDBACK_LOG_CAP).await
    }
}
