//! Event Bus port (C2, spec §6.2): at-least-once pub/sub over hierarchical
//! subject strings. Treated as an external collaborator per spec §1; this
//! crate ships a minimal in-process adapter (`infrastructure::event_bus`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreResult;

/// An envelope published on the bus. Consumers must be idempotent on
/// `id` (spec §6.2 "at-least-once; consumers MUST be idempotent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: String,
    pub subject: String,
    pub published_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl BusEvent {
    pub fn new(subject: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject: subject.into(),
            published_at: Utc::now(),
            payload,
        }
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: BusEvent) -> CoreResult<()>;

    /// Subscribes to an exact subject or a `*`-glob subject (e.g.
    /// `events.news.*`), returning a receiver of matching events.
    async fn subscribe(&self, subject_pattern: &str) -> CoreResult<tokio::sync::mpsc::Receiver<BusEvent>>;
}

/// Canonical subject names (spec §6.2), kept as constants so publishers
/// and subscribers cannot drift out of sync on spelling.
pub mod subjects {
    pub const LLM_QUEUE_STATS: &str = "llm.queue.stats";
    pub const GOAL_CREATED: &str = "goal.created";
    pub const GOAL_UPDATED: &str = "goal.updated";
    pub const GOAL_COMPLETED: &str = "goal.completed";
    pub const GOAL_FAILED: &str = "goal.failed";
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_STEP: &str = "workflow.step";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_FAILED: &str = "workflow.failed";
    pub const THROTTLE_ENABLED: &str = "throttle.enabled";
    pub const THROTTLE_DISABLED: &str = "throttle.disabled";
    pub const NEWS_GLOB: &str = "events.news.*";
    pub const REASONING_GLOB: &str = "events.reasoning.*";
}
