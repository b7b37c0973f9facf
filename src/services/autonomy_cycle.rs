//! Autonomy Cycle (C9, spec §4.9): periodically mines recent news and
//! reasoning events for candidate goals, deduplicates and (for
//! hypotheses) LLM-screens them, and writes survivors to the goal store.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::config::AutonomyConfig;
use crate::domain::models::{Goal, GoalType, LlmPriority, LlmRequest};
use crate::domain::ports::{subjects, BusEvent, EventBus, GoalRepository, KvStore};
use crate::services::fingerprint;
use crate::services::llm_queue::{LlmQueue, BG_ENABLED_KEY};

const EVENT_BUFFER_CAP: usize = 200;
const SCREENING_DEADLINE_SECS: i64 = 30;

/// A goal candidate emitted by a generator, before dedup/screening/write
/// (spec §4.9 step 2: `{description, type, domain, priority, context}`).
#[derive(Debug, Clone)]
pub struct CandidateGoal {
    pub description: String,
    pub goal_type: GoalType,
    pub domain: String,
    pub priority: u8,
    pub context: HashMap<String, serde_json::Value>,
    pub is_hypothesis: bool,
}

/// Pluggable candidate source (spec §4.9 step 2, "kind-specific generators
/// are pluggable").
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Whether this generator needs the LLM to produce candidates; such
    /// generators are skipped while `llm:bg_enabled` is false (spec §4.9,
    /// "Autonomy respects `llm:bg_enabled`").
    fn requires_llm(&self) -> bool {
        false
    }

    async fn generate(&self, news: &[BusEvent], reasoning: &[BusEvent]) -> Vec<CandidateGoal>;
}

fn event_domain(event: &BusEvent) -> String {
    event
        .payload
        .get("domain")
        .and_then(|v| v.as_str())
        .unwrap_or("general")
        .to_string()
}

fn event_summary(event: &BusEvent) -> Option<String> {
    event.payload.get("summary").and_then(|v| v.as_str()).map(str::to_string)
}

/// Gap-filling generator: turns unexplained news items into curiosity
/// goals. Does not require the LLM.
pub struct GapFillingGenerator;

#[async_trait]
impl CandidateGenerator for GapFillingGenerator {
    fn kind(&self) -> &'static str {
        "gap_filling"
    }

    async fn generate(&self, news: &[BusEvent], _reasoning: &[BusEvent]) -> Vec<CandidateGoal> {
        news.iter()
            .filter_map(|event| {
                let summary = event_summary(event)?;
                let mut context = HashMap::new();
                context.insert("category".to_string(), serde_json::json!("news_analysis"));
                Some(CandidateGoal {
                    description: format!("Investigate: {summary}"),
                    goal_type: GoalType::Curiosity,
                    domain: event_domain(event),
                    priority: 5,
                    context,
                    is_hypothesis: false,
                })
            })
            .collect()
    }
}

/// Active-learning generator: reasoning traces that flag a data gap turn
/// into an active-learning acquisition goal. Does not require the LLM.
pub struct ActiveLearningGenerator;

#[async_trait]
impl CandidateGenerator for ActiveLearningGenerator {
    fn kind(&self) -> &'static str {
        "active_learning"
    }

    async fn generate(&self, _news: &[BusEvent], reasoning: &[BusEvent]) -> Vec<CandidateGoal> {
        reasoning
            .iter()
            .filter(|event| event.payload.get("data_gap").and_then(|v| v.as_bool()).unwrap_or(false))
            .filter_map(|event| {
                let summary = event_summary(event)?;
                Some(CandidateGoal {
                    description: format!("Acquire data for: {summary}"),
                    goal_type: GoalType::ActiveLearning,
                    domain: event_domain(event),
                    priority: 4,
                    context: HashMap::new(),
                    is_hypothesis: false,
                })
            })
            .collect()
    }
}

/// Hypothesis-test generator: reasoning traces carrying an explicit
/// `hypothesis` field become candidates gated by LLM impact/tractability
/// screening (spec §4.9 step 4).
pub struct HypothesisGenerator;

#[async_trait]
impl CandidateGenerator for HypothesisGenerator {
    fn kind(&self) -> &'static str {
        "hypothesis_test"
    }

    fn requires_llm(&self) -> bool {
        true
    }

    async fn generate(&self, _news: &[BusEvent], reasoning: &[BusEvent]) -> Vec<CandidateGoal> {
        reasoning
            .iter()
            .filter_map(|event| {
                let hypothesis = event.payload.get("hypothesis").and_then(|v| v.as_str())?;
                Some(CandidateGoal {
                    description: format!("Test hypothesis: {hypothesis}"),
                    goal_type: GoalType::HypothesisTest,
                    domain: event_domain(event),
                    priority: 6,
                    context: HashMap::new(),
                    is_hypothesis: true,
                })
            })
            .collect()
    }
}

/// Parses a 0-1 score out of the screening model's free-text reply,
/// taking the first decimal or integer literal found. Unparseable replies
/// score 0.0 so unreadable screens fail closed rather than admit.
fn parse_screen_score(text: &str) -> f64 {
    let pattern = Regex::new(r"(-?\d+(\.\d+)?)").expect("static regex is valid");
    pattern
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

pub struct AutonomyCycle {
    bus: Arc<dyn EventBus>,
    kv: Arc<dyn KvStore>,
    goal_repo: Arc<dyn GoalRepository>,
    llm_queue: Arc<LlmQueue>,
    agent_id: String,
    interval: Duration,
    screen_threshold: f64,
    generators: Vec<Box<dyn CandidateGenerator>>,
    news_buffer: Mutex<VecDeque<BusEvent>>,
    reasoning_buffer: Mutex<VecDeque<BusEvent>>,
}

impl AutonomyCycle {
    pub fn new(
        config: &AutonomyConfig,
        screen_threshold: f64,
        agent_id: impl Into<String>,
        bus: Arc<dyn EventBus>,
        kv: Arc<dyn KvStore>,
        goal_repo: Arc<dyn GoalRepository>,
        llm_queue: Arc<LlmQueue>,
        generators: Vec<Box<dyn CandidateGenerator>>,
    ) -> Self {
        Self {
            bus,
            kv,
            goal_repo,
            llm_queue,
            agent_id: agent_id.into(),
            interval: Duration::from_secs(config.interval_secs),
            screen_threshold,
            generators,
            news_buffer: Mutex::new(VecDeque::with_capacity(EVENT_BUFFER_CAP)),
            reasoning_buffer: Mutex::new(VecDeque::with_capacity(EVENT_BUFFER_CAP)),
        }
    }

    pub fn spawn(self: Arc<Self>) {
        let news_self = self.clone();
        tokio::spawn(async move {
            match news_self.bus.subscribe(subjects::NEWS_GLOB).await {
                Ok(mut rx) => {
                    while let Some(event) = rx.recv().await {
                        push_bounded(&news_self.news_buffer, event);
                    }
                }
                Err(err) => warn!(error = %err, "autonomy cycle failed to subscribe to news"),
            }
        });

        let reasoning_self = self.clone();
        tokio::spawn(async move {
            match reasoning_self.bus.subscribe(subjects::REASONING_GLOB).await {
                Ok(mut rx) => {
                    while let Some(event) = rx.recv().await {
                        push_bounded(&reasoning_self.reasoning_buffer, event);
                    }
                }
                Err(err) => warn!(error = %err, "autonomy cycle failed to subscribe to reasoning"),
            }
        });

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.tick().await {
                    warn!(error = %err, "autonomy cycle tick failed");
                }
            }
        });
    }

    /// One generation pass (spec §4.9 steps 1-5). Returns the number of
    /// goals written.
    pub async fn tick(&self) -> CoreResult<usize> {
        let news = drain(&self.news_buffer);
        let reasoning = drain(&self.reasoning_buffer);
        let bg_enabled = self.kv.get(BG_ENABLED_KEY).await?.as_deref() != Some("false");

        let mut written = 0;
        for generator in &self.generators {
            if generator.requires_llm() && !bg_enabled {
                debug!(kind = generator.kind(), "skipping LLM-backed generator while background disabled");
                continue;
            }

            for candidate in generator.generate(&news, &reasoning).await {
                let fp = fingerprint::compute(&candidate.description, candidate.goal_type, &candidate.domain);
                if self.goal_repo.exists_by_fingerprint(&fp).await? {
                    continue;
                }

                if candidate.is_hypothesis {
                    let score = self.screen_hypothesis(&candidate).await?;
                    if score < self.screen_threshold {
                        debug!(score, threshold = self.screen_threshold, "hypothesis failed screening");
                        continue;
                    }
                }

                let mut goal = Goal::new(&self.agent_id, candidate.description, candidate.goal_type, candidate.domain, candidate.priority);
                goal.context = candidate.context;
                self.goal_repo.put(&goal).await?;
                self.bus
                    .publish(BusEvent::new(subjects::GOAL_CREATED, serde_json::json!({ "goal_id": goal.id })))
                    .await?;
                written += 1;
            }
        }
        Ok(written)
    }

    async fn screen_hypothesis(&self, candidate: &CandidateGoal) -> CoreResult<f64> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let request = LlmRequest {
            id: LlmRequest::new_id(),
            priority: LlmPriority::Low,
            prompt: format!(
                "On a scale of 0.0 to 1.0, rate the impact and tractability of testing this hypothesis: {}",
                candidate.description
            ),
            options: Default::default(),
            enqueued_at: Utc::now(),
            deadline: Some(Utc::now() + chrono::Duration::seconds(SCREENING_DEADLINE_SECS)),
        };
        self.llm_queue
            .enqueue(
                request,
                Box::new(move |result| {
                    let _ = tx.send(result);
                }),
            )
            .await?;

        let response = rx.await.map_err(|_| CoreError::Cancelled)??;
        Ok(parse_screen_score(&response.text))
    }
}

fn push_bounded(buffer: &Mutex<VecDeque<BusEvent>>, event: BusEvent) {
    let mut buf = buffer.lock().expect("autonomy cycle buffer mutex poisoned");
    buf.push_back(event);
    if buf.len() > EVENT_BUFFER_CAP {
        buf.pop_front();
    }
}

fn drain(buffer: &Mutex<VecDeque<BusEvent>>) -> Vec<BusEvent> {
    let mut buf = buffer.lock().expect("autonomy cycle buffer mutex poisoned");
    buf.drain(..).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{DatabaseConnection, SqliteGoalRepository};
    use crate::infrastructure::event_bus::BroadcastEventBus;
    use crate::infrastructure::kv::InMemoryKvStore;
    use crate::infrastructure::llm::MockLlmProvider;
    use crate::domain::models::config::LlmConfig;

    async fn cycle(generators: Vec<Box<dyn CandidateGenerator>>, screen_threshold: f64) -> Arc<AutonomyCycle> {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        let goal_repo: Arc<dyn GoalRepository> = Arc::new(SqliteGoalRepository::new(conn.pool().clone()));
        let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());
        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        let provider = Arc::new(MockLlmProvider::new(Duration::from_millis(1)));
        let llm_queue = LlmQueue::spawn(&LlmConfig::default(), provider, kv.clone());
        Arc::new(AutonomyCycle::new(
            &AutonomyConfig { interval_secs: 300 },
            screen_threshold,
            "agent-1",
            bus,
            kv,
            goal_repo,
            llm_queue,
            generators,
        ))
    }

    fn news_event(domain: &str, summary: &str) -> BusEvent {
        BusEvent::new(subjects::NEWS_GLOB, serde_json::json!({ "domain": domain, "summary": summary }))
    }

    #[tokio::test]
    async fn gap_filling_generator_writes_a_deduplicated_goal() {
        let cycle = cycle(vec![Box::new(GapFillingGenerator)], 0.6).await;
        push_bounded(&cycle.news_buffer, news_event("infra", "an outage was reported"));

        let written = cycle.tick().await.unwrap();
        assert_eq!(written, 1);

        // same news item fed again in a later tick is deduplicated
        push_bounded(&cycle.news_buffer, news_event("infra", "an outage was reported"));
        let written_again = cycle.tick().await.unwrap();
        assert_eq!(written_again, 0);
    }

    #[tokio::test]
    async fn llm_generator_skipped_when_background_disabled() {
        let cycle = cycle(vec![Box::new(HypothesisGenerator)], 0.0).await;
        cycle.kv.set(BG_ENABLED_KEY, "false").await.unwrap();
        push_bounded(
            &cycle.reasoning_buffer,
            BusEvent::new(subjects::REASONING_GLOB, serde_json::json!({ "domain": "infra", "hypothesis": "load correlates with drift" })),
        );

        let written = cycle.tick().await.unwrap();
        assert_eq!(written, 0);
    }

    #[test]
    fn screen_score_parses_leading_number() {
        assert_eq!(parse_screen_score("0.82 - high impact, tractable"), 0.82);
        assert_eq!(parse_screen_score("not a number"), 0.0);
    }
}
