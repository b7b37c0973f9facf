//! Goal domain model (spec §3.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kinds of goal, driving both generation (C9/C10) and routing (C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Curiosity,
    HypothesisTest,
    Coherence,
    ActiveLearning,
    User,
    WorkflowDiscovery,
}

/// Lifecycle status. Advances monotonically `Pending -> Active ->
/// {Completed|Failed|Abandoned}`; the terminal states never transition
/// further (spec §3.2, invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Abandoned,
}

impl GoalStatus {
    /// Whether a goal in this status belongs in `goals:{agent}:active`.
    pub fn is_active_set_member(self) -> bool {
        matches!(self, GoalStatus::Pending | GoalStatus::Active)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GoalStatus::Completed | GoalStatus::Failed | GoalStatus::Abandoned
        )
    }

    /// The transition table enforced by the goal store (spec §3.2).
    pub fn can_transition_to(self, next: GoalStatus) -> bool {
        use GoalStatus::{Abandoned, Active, Completed, Failed, Pending};
        match (self, next) {
            (Pending, Active) | (Pending, Abandoned) => true,
            (Active, Completed) | (Active, Failed) | (Active, Abandoned) => true,
            (same, other) if same == other => true,
            _ => false,
        }
    }
}

/// A goal: a durable, high-level objective dispatched into at most one
/// in-flight workflow at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub agent_id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub domain: String,
    /// Integer 1-10 internally; encoded as a string on the HTTP wire
    /// (spec §6.5, §9 "priority as string on the wire").
    pub priority: u8,
    pub status: GoalStatus,
    pub confidence: f64,
    pub context: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(
        agent_id: impl Into<String>,
        description: impl Into<String>,
        goal_type: GoalType,
        domain: impl Into<String>,
        priority: u8,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            description: description.into(),
            goal_type,
            domain: domain.into(),
            priority: priority.clamp(1, 10),
            status: GoalStatus::Pending,
            confidence: 0.5,
            context: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    pub fn routing_hint(&self) -> Option<&str> {
        self.context.get("routing_hint").and_then(|v| v.as_str())
    }

    pub fn impact(&self) -> Option<&str> {
        self.context.get("impact").and_then(|v| v.as_str())
    }
}

/// Parses and validates the wire-encoded string form of priority (spec
/// §6.5, §9). Out-of-range values are rejected, not clamped, per "rejection
/// of out-of-range values is mandatory."
pub fn parse_wire_priority(raw: &str) -> Result<u8, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("priority {raw:?} is not an integer"))?;
    if !(1..=10).contains(&value) {
        return Err(format!("priority {value} out of range 1..=10"));
    }
    Ok(value as u8)
}
