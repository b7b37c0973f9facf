//! Goal Poller / Dispatcher (C7, spec §4.6): converts pending goals into
//! running workflows without exceeding workflow-engine capacity, prevents
//! duplicate concurrent execution of the same goal, and backs off when
//! the engine signals overload.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::config::GoalConfig;
use crate::domain::models::{Goal, GoalStatus};
use crate::domain::ports::{subjects, BusEvent, EventBus, GoalRepository, KvStore};
use crate::services::workflow_engine::WorkflowEngine;

/// One of the four routing buckets a goal's description/context is
/// classified into before submission (spec §4.6 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingHint {
    KnowledgeQuery,
    ToolCall,
    Reasoning,
    Default,
}

impl RoutingHint {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingHint::KnowledgeQuery => "knowledge_query",
            RoutingHint::ToolCall => "tool_call",
            RoutingHint::Reasoning => "reasoning",
            RoutingHint::Default => "default",
        }
    }
}

/// Classifies a goal by its `context.routing_hint` if present and
/// recognized, otherwise falls back to a lexical heuristic over the
/// description (spec §4.6 step 5).
pub fn classify(goal: &Goal) -> RoutingHint {
    if let Some(hint) = goal.routing_hint() {
        match hint {
            "knowledge_query" => return RoutingHint::KnowledgeQuery,
            "tool_call" => return RoutingHint::ToolCall,
            "reasoning" => return RoutingHint::Reasoning,
            "default" => return RoutingHint::Default,
            _ => {}
        }
    }

    let desc = goal.description.to_lowercase();
    if desc.contains("what is")
        || desc.contains("what are")
        || desc.contains("look up")
        || desc.contains("lookup")
        || desc.contains("explain")
        || desc.ends_with('?')
    {
        RoutingHint::KnowledgeQuery
    } else if desc.contains("run ")
        || desc.contains("execute")
        || desc.contains("invoke")
        || desc.contains("call the")
        || desc.contains("fetch")
    {
        RoutingHint::ToolCall
    } else if desc.contains("why")
        || desc.contains("analyze")
        || desc.contains("analyse")
        || desc.contains("reason about")
        || desc.contains("investigate")
    {
        RoutingHint::Reasoning
    } else {
        RoutingHint::Default
    }
}

/// Per-goal scoring inputs that come from C11's aggregate stats rather
/// than the goal record itself (spec §4.6.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringStats {
    pub recent_failure: bool,
    pub success_rate: f64,
    pub avg_value: f64,
}

/// Computes the dispatch score for a single goal (spec §4.6.2). Kept as
/// a free function so it can be unit tested without any I/O.
pub fn score(goal: &Goal, now: DateTime<Utc>, important_terms: &[String], generic_terms: &[String], stats: ScoringStats) -> f64 {
    let mut total = goal.priority as f64;

    if goal.context.get("category").and_then(|v| v.as_str()) == Some("news_analysis") {
        total += 2.0;
    }
    if goal.impact() == Some("high") {
        total += 3.0;
    }

    let age = goal.age(now);
    if age < chrono::Duration::hours(1) {
        total += 2.0;
    } else if age < chrono::Duration::hours(6) {
        total += 1.0;
    }

    let desc = goal.description.to_lowercase();
    if important_terms.iter().any(|term| desc.contains(&term.to_lowercase())) {
        total += 2.0;
    }
    if generic_terms.iter().any(|term| desc.contains(&term.to_lowercase())) {
        total -= 1.0;
    }

    if age > chrono::Duration::hours(12) {
        total -= 1.0;
    }
    if age > chrono::Duration::hours(24) {
        total -= 1.0;
    }

    if stats.recent_failure {
        total -= 1.5;
    }

    total += stats.success_rate.clamp(0.0, 1.0) * 3.0;
    total += stats.avg_value.clamp(0.0, 1.0) * 2.0;

    total
}

fn triggered_key(agent_id: &str, goal_id: &str) -> String {
    format!("triggered:{agent_id}:{goal_id}")
}

fn success_rate_key(goal: &Goal) -> String {
    format!("success_rate:{:?}:{}", goal.goal_type, goal.domain).to_lowercase()
}

fn avg_value_key(goal: &Goal) -> String {
    format!("avg_value:{:?}:{}", goal.goal_type, goal.domain).to_lowercase()
}

fn last_failure_key(goal: &Goal) -> String {
    format!("last_failure:{:?}:{}", goal.goal_type, goal.domain).to_lowercase()
}

pub struct GoalPoller {
    goal_repo: Arc<dyn GoalRepository>,
    engine: Arc<WorkflowEngine>,
    kv: Arc<dyn KvStore>,
    bus: Arc<dyn EventBus>,
    agent_id: String,
    fetch_batch: usize,
    triggered_ttl_secs: u64,
    base_interval_secs: u64,
    backoff_cap_secs: u64,
    current_interval_millis: AtomicU64,
    important_terms: Vec<String>,
    generic_terms: Vec<String>,
}

impl GoalPoller {
    pub fn new(
        config: &GoalConfig,
        agent_id: impl Into<String>,
        goal_repo: Arc<dyn GoalRepository>,
        engine: Arc<WorkflowEngine>,
        kv: Arc<dyn KvStore>,
        bus: Arc<dyn EventBus>,
        important_terms: Vec<String>,
        generic_terms: Vec<String>,
    ) -> Self {
        Self {
            goal_repo,
            engine,
            kv,
            bus,
            agent_id: agent_id.into(),
            fetch_batch: config.fetch_batch,
            triggered_ttl_secs: config.triggered_ttl_secs,
            base_interval_secs: config.poll_interval_secs,
            backoff_cap_secs: config.poll_backoff_cap_secs,
            current_interval_millis: AtomicU64::new(config.poll_interval_secs * 1000),
            important_terms,
            generic_terms,
        }
    }

    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let interval = Duration::from_millis(self.current_interval_millis.load(Ordering::Relaxed));
                tokio::time::sleep(interval).await;
                if let Err(err) = self.tick().await {
                    warn!(error = %err, "goal poller tick failed");
                }
            }
        });
    }

    /// Current poll interval, growing on `Overloaded` back-off and
    /// resetting on a successful dispatch (spec §4.6 step 9).
    pub fn current_poll_interval_millis(&self) -> u64 {
        self.current_interval_millis.load(Ordering::Relaxed)
    }

    /// One dispatch cycle (spec §4.6 steps 1-9). Returns the id of the
    /// goal dispatched this cycle, if any. Skips goals that already have
    /// a triggered-key entry or an already-running workflow (spec §8
    /// invariant 7, "no duplicate concurrent execution").
    pub async fn tick(&self) -> CoreResult<Option<String>> {
        let candidates = self.goal_repo.list_active(&self.agent_id, Some(self.fetch_batch)).await?;

        let mut eligible = Vec::with_capacity(candidates.len());
        for goal in candidates {
            if goal.status == GoalStatus::Active {
                continue;
            }
            let triggered = self.kv.get(&triggered_key(&self.agent_id, &goal.id)).await?.is_some();
            if triggered {
                continue;
            }
            if self.engine.has_running_for_goal(&goal.id).await? {
                continue;
            }
            eligible.push(goal);
        }

        let now = Utc::now();
        let mut best: Option<(f64, Goal)> = None;
        for goal in eligible {
            let stats = self.scoring_stats(&goal).await?;
            let s = score(&goal, now, &self.important_terms, &self.generic_terms, stats);
            best = match best {
                None => Some((s, goal)),
                Some((best_score, best_goal)) => {
                    let better = s > best_score
                        || (s == best_score && goal.priority > best_goal.priority)
                        || (s == best_score && goal.priority == best_goal.priority && goal.created_at < best_goal.created_at);
                    if better {
                        Some((s, goal))
                    } else {
                        Some((best_score, best_goal))
                    }
                }
            };
        }

        let Some((_, goal)) = best else {
            return Ok(None);
        };

        let routing_hint = classify(&goal);
        let submission = self
            .engine
            .submit_async(Some(goal.id.clone()), None, false, Some(routing_hint.as_str()))
            .await;

        match submission {
            Ok(workflow_id) => {
                self.reset_backoff();
                self.kv.set(&triggered_key(&self.agent_id, &goal.id), &workflow_id).await?;
                self.kv.expire(&triggered_key(&self.agent_id, &goal.id), self.triggered_ttl_secs).await?;
                self.goal_repo.update_status(&goal.id, GoalStatus::Active).await?;
                self.spawn_watcher(goal.id.clone(), workflow_id.clone());
                debug!(goal_id = %goal.id, workflow_id = %workflow_id, hint = routing_hint.as_str(), "dispatched goal");
                Ok(Some(goal.id))
            }
            Err(CoreError::Overloaded) => {
                self.grow_backoff();
                Ok(None)
            }
            Err(err) => {
                warn!(goal_id = %goal.id, error = %err, "goal submission failed, retrying next cycle");
                Ok(None)
            }
        }
    }

    async fn scoring_stats(&self, goal: &Goal) -> CoreResult<ScoringStats> {
        let success_rate = self
            .kv
            .get(&success_rate_key(goal))
            .await?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        let avg_value = self
            .kv
            .get(&avg_value_key(goal))
            .await?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        let recent_failure = match self.kv.get(&last_failure_key(goal)).await? {
            Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => Utc::now() - ts.with_timezone(&Utc) < chrono::Duration::hours(1),
                Err(_) => false,
            },
            None => false,
        };
        Ok(ScoringStats { recent_failure, success_rate, avg_value })
    }

    fn grow_backoff(&self) {
        let cap_millis = self.backoff_cap_secs * 1000;
        let current = self.current_interval_millis.load(Ordering::Relaxed);
        let next = (current * 2).min(cap_millis).max(self.base_interval_secs * 1000);
        self.current_interval_millis.store(next, Ordering::Relaxed);
        info!(next_interval_ms = next, "dispatcher backing off after overload");
    }

    fn reset_backoff(&self) {
        self.current_interval_millis.store(self.base_interval_secs * 1000, Ordering::Relaxed);
    }

    /// Spawns the watcher described in spec §4.6.3: polls workflow status
    /// until terminal, then transitions the goal, clears the triggered
    /// entry, and emits a completion event carrying the workflow id as
    /// correlation id for C11.
    fn spawn_watcher(&self, goal_id: String, workflow_id: String) {
        let engine = self.engine.clone();
        let goal_repo = self.goal_repo.clone();
        let kv = self.kv.clone();
        let bus = self.bus.clone();
        let agent_id = self.agent_id.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let workflow = match engine.get_status(&workflow_id).await {
                    Ok(w) => w,
                    Err(err) => {
                        warn!(workflow_id = %workflow_id, error = %err, "watcher lost workflow");
                        return;
                    }
                };
                use crate::domain::models::WorkflowStatus;
                let (new_status, subject) = match workflow.status {
                    WorkflowStatus::Completed => (GoalStatus::Completed, subjects::GOAL_COMPLETED),
                    WorkflowStatus::Failed => (GoalStatus::Failed, subjects::GOAL_FAILED),
                    WorkflowStatus::Queued | WorkflowStatus::Running => continue,
                };

                if let Err(err) = goal_repo.update_status(&goal_id, new_status).await {
                    warn!(goal_id = %goal_id, error = %err, "watcher failed to update goal status");
                }
                if let Err(err) = kv.del(&triggered_key(&agent_id, &goal_id)).await {
                    warn!(goal_id = %goal_id, error = %err, "watcher failed to clear triggered entry");
                }
                let _ = bus
                    .publish(BusEvent::new(
                        subject,
                        serde_json::json!({ "goal_id": goal_id, "workflow_id": workflow_id }),
                    ))
                    .await;
                return;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GoalType, Workflow};
    use crate::domain::ports::WorkflowRepository;
    use crate::infrastructure::database::{DatabaseConnection, SqliteGoalRepository, SqliteWorkflowRepository};
    use crate::infrastructure::event_bus::BroadcastEventBus;
    use crate::infrastructure::kv::InMemoryKvStore;
    use crate::domain::models::config::WorkflowConfig;

    fn goal_config() -> GoalConfig {
        GoalConfig {
            poll_interval_secs: 2,
            poll_backoff_cap_secs: 60,
            triggered_ttl_secs: 1800,
            fetch_batch: 50,
            important_terms: vec!["outage".to_string()],
            generic_terms: vec!["misc".to_string()],
        }
    }

    async fn poller(workflow_config: WorkflowConfig) -> (GoalPoller, Arc<dyn GoalRepository>, Arc<dyn WorkflowRepository>) {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        let goal_repo: Arc<dyn GoalRepository> = Arc::new(SqliteGoalRepository::new(conn.pool().clone()));
        let workflow_repo: Arc<dyn WorkflowRepository> = Arc::new(SqliteWorkflowRepository::new(conn.pool().clone()));
        let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());
        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
        let engine = Arc::new(WorkflowEngine::new(&workflow_config, workflow_repo.clone(), bus.clone()));
        let poller = GoalPoller::new(
            &goal_config(),
            "agent-1",
            goal_repo.clone(),
            engine,
            kv,
            bus,
            vec!["outage".to_string()],
            vec!["misc".to_string()],
        );
        (poller, goal_repo, workflow_repo)
    }

    #[tokio::test]
    async fn dispatches_highest_scoring_goal_and_marks_triggered() {
        let (poller, goal_repo, _workflow_repo) = poller(WorkflowConfig { max_ui: 4, max_bg: 2, timeout_secs: 600 }).await;
        let low = Goal::new("agent-1", "a quiet goal", GoalType::Curiosity, "physics", 2);
        let high = Goal::new("agent-1", "an outage is spreading", GoalType::Curiosity, "infra", 5);
        goal_repo.put(&low).await.unwrap();
        goal_repo.put(&high).await.unwrap();

        let dispatched = poller.tick().await.unwrap();
        assert_eq!(dispatched, Some(high.id.clone()));

        let updated = goal_repo.get(&high.id).await.unwrap().unwrap();
        assert_eq!(updated.status, GoalStatus::Active);
        assert!(poller.kv.get(&triggered_key("agent-1", &high.id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn triggered_goal_is_skipped_next_cycle() {
        let (poller, goal_repo, _workflow_repo) = poller(WorkflowConfig { max_ui: 4, max_bg: 2, timeout_secs: 600 }).await;
        let goal = Goal::new("agent-1", "investigate something", GoalType::Curiosity, "physics", 5);
        goal_repo.put(&goal).await.unwrap();

        poller.tick().await.unwrap();
        let second = poller.tick().await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn goal_with_already_running_workflow_is_skipped_even_without_triggered_key() {
        let (poller, goal_repo, workflow_repo) = poller(WorkflowConfig { max_ui: 4, max_bg: 2, timeout_secs: 600 }).await;
        let goal = Goal::new("agent-1", "investigate something", GoalType::Curiosity, "physics", 5);
        goal_repo.put(&goal).await.unwrap();
        workflow_repo.insert_running(&Workflow::new(Some(goal.id.clone()), None, false)).await.unwrap();

        let dispatched = poller.tick().await.unwrap();
        assert_eq!(dispatched, None);
        assert!(poller.kv.get(&triggered_key("agent-1", &goal.id)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overload_backs_off_without_marking_triggered() {
        let (poller, goal_repo, _workflow_repo) = poller(WorkflowConfig { max_ui: 0, max_bg: 0, timeout_secs: 600 }).await;
        let goal = Goal::new("agent-1", "investigate something", GoalType::Curiosity, "physics", 5);
        goal_repo.put(&goal).await.unwrap();

        let before = poller.current_interval_millis.load(Ordering::Relaxed);
        let dispatched = poller.tick().await.unwrap();
        assert_eq!(dispatched, None);
        let after = poller.current_interval_millis.load(Ordering::Relaxed);
        assert!(after > before);

        let unchanged = goal_repo.get(&goal.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, GoalStatus::Pending);
        assert!(poller.kv.get(&triggered_key("agent-1", &goal.id)).await.unwrap().is_none());
    }

    #[test]
    fn scoring_rewards_high_impact_and_recency() {
        let now = Utc::now();
        let mut base = Goal::new("agent-1", "a plain goal", GoalType::Curiosity, "physics", 5);
        base.created_at = now;
        let base_score = score(&base, now, &[], &[], ScoringStats::default());

        let mut boosted = base.clone();
        boosted.context.insert("impact".to_string(), serde_json::json!("high"));
        let boosted_score = score(&boosted, now, &[], &[], ScoringStats::default());
        assert!(boosted_score > base_score);
    }

    #[test]
    fn scoring_penalizes_aging_and_recent_failure() {
        let now = Utc::now();
        let mut stale = Goal::new("agent-1", "a plain goal", GoalType::Curiosity, "physics", 5);
        stale.created_at = now - chrono::Duration::hours(30);
        let fresh_score = score(&stale, stale.created_at, &[], &[], ScoringStats::default());
        let stale_score = score(&stale, now, &[], &[], ScoringStats::default());
        assert!(stale_score < fresh_score);

        let penalized = score(&stale, now, &[], &[], ScoringStats { recent_failure: true, ..Default::default() });
        assert!(penalized < stale_score);
    }

    #[test]
    fn classify_falls_back_to_lexical_heuristic() {
        let query = Goal::new("agent-1", "what is the capital of France?", GoalType::Curiosity, "geo", 3);
        assert_eq!(classify(&query), RoutingHint::KnowledgeQuery);

        let tool = Goal::new("agent-1", "run the deployment script", GoalType::Curiosity, "infra", 3);
        assert_eq!(classify(&tool), RoutingHint::ToolCall);

        let reasoning = Goal::new("agent-1", "investigate why latency increased", GoalType::Curiosity, "infra", 3);
        assert_eq!(classify(&reasoning), RoutingHint::Reasoning);

        let default = Goal::new("agent-1", "tidy up the backlog", GoalType::Curiosity, "infra", 3);
        assert_eq!(classify(&default), RoutingHint::Default);
    }

    #[test]
    fn explicit_routing_hint_overrides_heuristic() {
        let mut goal = Goal::new("agent-1", "run the deployment script", GoalType::Curiosity, "infra", 3);
        goal.context.insert("routing_hint".to_string(), serde_json::json!("reasoning"));
        assert_eq!(classify(&goal), RoutingHint::Reasoning);
    }
}
