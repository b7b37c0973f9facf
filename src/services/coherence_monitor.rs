//! Coherence Monitor (C10, spec §4.10): a periodic cross-subsystem
//! consistency check over beliefs, active goals, recorded strategies, and
//! a bounded activity log, emitting resolution goals for whatever it
//! finds.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::CoreResult;
use crate::domain::models::config::CoherenceConfig;
use crate::domain::models::{Goal, GoalStatus, GoalType};
use crate::domain::ports::{subjects, BusEvent, EventBus, GoalFilter, GoalRepository, KvStore};
use crate::services::fingerprint;

/// Lexical opposite-word pairs driving the contradiction heuristic (spec
/// §4.10, "simple lexical contradiction heuristic (opposite-word
/// pairs)"). Deliberately small and generic; domain-specific vocabularies
/// are out of scope.
const OPPOSITE_PAIRS: &[(&str, &str)] = &[
    ("increase", "decrease"),
    ("increasing", "decreasing"),
    ("rising", "falling"),
    ("enable", "disable"),
    ("enabled", "disabled"),
    ("safe", "unsafe"),
    ("stable", "unstable"),
    ("improve", "worsen"),
    ("improving", "worsening"),
    ("accept", "reject"),
    ("allow", "deny"),
    ("start", "stop"),
    ("success", "failure"),
    ("succeeding", "failing"),
    ("true", "false"),
    ("high", "low"),
    ("up", "down"),
    ("healthy", "degraded"),
];

fn contradicts(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    OPPOSITE_PAIRS.iter().any(|(x, y)| (a.contains(x) && b.contains(y)) || (a.contains(y) && b.contains(x)))
}

/// A recorded belief (not part of the formal data model; stored as JSON
/// under `beliefs:{domain}` in the KV store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belief {
    pub statement: String,
    pub confidence: f64,
}

/// A recorded code-generation strategy, stored under
/// `strategies:{category}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub approach: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct Inconsistency {
    pub kind: &'static str,
    pub description: String,
    pub domain: String,
    pub severity: f64,
}

fn severity_to_priority(severity: f64) -> u8 {
    ((severity * 10.0).round() as i64).clamp(1, 10) as u8
}

fn beliefs_key(domain: &str) -> String {
    format!("beliefs:{domain}")
}
fn strategies_key(category: &str) -> String {
    format!("strategies:{category}")
}
fn activity_log_key(agent_id: &str) -> String {
    format!("activity_log:{agent_id}")
}

pub struct CoherenceMonitor {
    goal_repo: Arc<dyn GoalRepository>,
    kv: Arc<dyn KvStore>,
    bus: Arc<dyn EventBus>,
    agent_id: String,
    interval: Duration,
    beliefs_per_domain: usize,
    drift_threshold: chrono::Duration,
    loop_repeat_count: usize,
    belief_domains: Vec<String>,
    strategy_categories: Vec<String>,
    domain_cursor: AtomicUsize,
}

impl CoherenceMonitor {
    pub fn new(
        config: &CoherenceConfig,
        agent_id: impl Into<String>,
        belief_domains: Vec<String>,
        strategy_categories: Vec<String>,
        goal_repo: Arc<dyn GoalRepository>,
        kv: Arc<dyn KvStore>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            goal_repo,
            kv,
            bus,
            agent_id: agent_id.into(),
            interval: Duration::from_secs(config.interval_secs),
            beliefs_per_domain: config.beliefs_per_domain,
            drift_threshold: chrono::Duration::seconds(config.drift_threshold_secs as i64),
            loop_repeat_count: config.loop_repeat_count,
            belief_domains,
            strategy_categories,
            domain_cursor: AtomicUsize::new(0),
        }
    }

    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.tick().await {
                    warn!(error = %err, "coherence monitor tick failed");
                }
            }
        });
    }

    /// One consistency pass (spec §4.10). Returns the number of resolution
    /// goals emitted.
    pub async fn tick(&self) -> CoreResult<usize> {
        let mut inconsistencies = Vec::new();
        inconsistencies.extend(self.check_belief_contradictions().await?);
        inconsistencies.extend(self.check_policy_conflicts().await?);
        inconsistencies.extend(self.check_strategy_conflicts().await?);
        inconsistencies.extend(self.check_goal_drift().await?);
        inconsistencies.extend(self.check_behavior_loops().await?);

        let mut emitted = 0;
        for inconsistency in inconsistencies {
            if self.emit_resolution_goal(&inconsistency).await? {
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    /// Compares at most `beliefs_per_domain` beliefs across at most one
    /// domain per tick (spec §4.10, strict bounds per §9's open question
    /// resolution).
    async fn check_belief_contradictions(&self) -> CoreResult<Vec<Inconsistency>> {
        if self.belief_domains.is_empty() {
            return Ok(Vec::new());
        }
        let idx = self.domain_cursor.fetch_add(1, Ordering::Relaxed) % self.belief_domains.len();
        let domain = &self.belief_domains[idx];

        let raw = self.kv.lrange(&beliefs_key(domain), 0, self.beliefs_per_domain as isize - 1).await?;
        let beliefs: Vec<Belief> = raw.iter().filter_map(|s| serde_json::from_str(s).ok()).collect();

        let mut found = Vec::new();
        for i in 0..beliefs.len() {
            for j in (i + 1)..beliefs.len() {
                if contradicts(&beliefs[i].statement, &beliefs[j].statement) {
                    let severity = (beliefs[i].confidence * beliefs[j].confidence).clamp(0.0, 1.0);
                    found.push(Inconsistency {
                        kind: "belief_contradiction",
                        description: format!("conflicting beliefs in {domain}: \"{}\" vs \"{}\"", beliefs[i].statement, beliefs[j].statement),
                        domain: domain.clone(),
                        severity,
                    });
                }
            }
        }
        Ok(found)
    }

    /// Pairwise scan of active goals sharing a `context.target` for
    /// opposing imperatives (spec §4.10).
    async fn check_policy_conflicts(&self) -> CoreResult<Vec<Inconsistency>> {
        let active = self.goal_repo.list(GoalFilter { status: Some(GoalStatus::Active), domain: None }).await?;
        let mut found = Vec::new();
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let a = &active[i];
                let b = &active[j];
                let same_target = match (target_of(a), target_of(b)) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                };
                if same_target && contradicts(&a.description, &b.description) {
                    found.push(Inconsistency {
                        kind: "policy_conflict",
                        description: format!("opposing goals on target: \"{}\" vs \"{}\"", a.description, b.description),
                        domain: a.domain.clone(),
                        severity: 0.7,
                    });
                }
            }
        }
        Ok(found)
    }

    async fn check_strategy_conflicts(&self) -> CoreResult<Vec<Inconsistency>> {
        let mut found = Vec::new();
        for category in &self.strategy_categories {
            let raw = self.kv.lrange(&strategies_key(category), 0, -1).await?;
            let strategies: Vec<Strategy> = raw.iter().filter_map(|s| serde_json::from_str(s).ok()).collect();
            for i in 0..strategies.len() {
                for j in (i + 1)..strategies.len() {
                    if contradicts(&strategies[i].approach, &strategies[j].approach) {
                        let severity = (strategies[i].confidence * strategies[j].confidence).clamp(0.0, 1.0);
                        found.push(Inconsistency {
                            kind: "strategy_conflict",
                            description: format!("conflicting strategies for {category}: \"{}\" vs \"{}\"", strategies[i].approach, strategies[j].approach),
                            domain: category.clone(),
                            severity,
                        });
                    }
                }
            }
        }
        Ok(found)
    }

    /// Any active goal older than `drift_threshold` whose `updated_at`
    /// never advanced past `created_at` (spec §4.10, "no `updated_at`
    /// progress").
    async fn check_goal_drift(&self) -> CoreResult<Vec<Inconsistency>> {
        let active = self.goal_repo.list(GoalFilter { status: Some(GoalStatus::Active), domain: None }).await?;
        let now = Utc::now();
        let mut found = Vec::new();
        for goal in active {
            if goal.age(now) > self.drift_threshold && goal.updated_at == goal.created_at {
                found.push(Inconsistency {
                    kind: "goal_drift",
                    description: format!("goal {} has made no progress since creation", goal.id),
                    domain: goal.domain.clone(),
                    severity: 0.5,
                });
            }
        }
        Ok(found)
    }

    /// Sliding-window triples over the bounded activity log; any triple
    /// repeating at least `loop_repeat_count` times is a behavior loop
    /// (spec §4.10).
    async fn check_behavior_loops(&self) -> CoreResult<Vec<Inconsistency>> {
        let log = self.kv.lrange(&activity_log_key(&self.agent_id), 0, -1).await?;
        if log.len() < 3 {
            return Ok(Vec::new());
        }

        let mut counts = std::collections::HashMap::new();
        for window in log.windows(3) {
            let triple = window.join("->");
            *counts.entry(triple).or_insert(0usize) += 1;
        }

        Ok(counts
            .into_iter()
            .filter(|(_, count)| *count >= self.loop_repeat_count)
            .map(|(triple, count)| Inconsistency {
                kind: "behavior_loop",
                description: format!("state sequence {triple} repeated {count} times"),
                domain: self.agent_id.clone(),
                severity: (count as f64 / (self.loop_repeat_count as f64 * 2.0)).clamp(0.3, 1.0),
            })
            .collect())
    }

    async fn emit_resolution_goal(&self, inconsistency: &Inconsistency) -> CoreResult<bool> {
        let fp = fingerprint::compute(&inconsistency.description, GoalType::Coherence, &inconsistency.domain);
        if self.goal_repo.exists_by_fingerprint(&fp).await? {
            return Ok(false);
        }

        let priority = severity_to_priority(inconsistency.severity);
        let mut goal = Goal::new(&self.agent_id, inconsistency.description.clone(), GoalType::Coherence, inconsistency.domain.clone(), priority);
        goal.context.insert("inconsistency_kind".to_string(), serde_json::json!(inconsistency.kind));
        goal.context.insert("severity".to_string(), serde_json::json!(inconsistency.severity));
        self.goal_repo.put(&goal).await?;
        self.bus
            .publish(BusEvent::new(subjects::GOAL_CREATED, serde_json::json!({ "goal_id": goal.id, "kind": inconsistency.kind })))
            .await?;
        debug!(kind = inconsistency.kind, severity = inconsistency.severity, goal_id = %goal.id, "emitted coherence resolution goal");
        Ok(true)
    }
}

fn target_of(goal: &Goal) -> Option<String> {
    goal.context.get("target").and_then(|v| v.as_str()).map(str::to_string)
}
