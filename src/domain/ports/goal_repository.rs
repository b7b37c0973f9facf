//! Goal Store port (C6, spec §4.5).

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Goal, GoalStatus};

/// Optional filter applied to `list`.
#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
    pub status: Option<GoalStatus>,
    pub domain: Option<String>,
}

/// Durable goal CRUD plus the active-set / priority-index / dedup
/// operations the dispatcher and generators rely on.
///
/// Implementations MUST uphold the invariants from spec §4.5 and §8.1:
/// a goal id appears in the active set iff its status is `pending` or
/// `active`, and the priority index stays consistent with every `put`
/// and every terminal `update_status`.
#[async_trait]
pub trait GoalRepository: Send + Sync {
    /// Upsert a goal, atomically keeping active-set membership and the
    /// priority index consistent with `goal.status`.
    async fn put(&self, goal: &Goal) -> CoreResult<()>;

    async fn get(&self, id: &str) -> CoreResult<Option<Goal>>;

    /// Members of `goals:{agent}:active`, newest-insertion-order not
    /// guaranteed; callers that need scoring order re-sort.
    async fn list_active(&self, agent_id: &str, limit: Option<usize>) -> CoreResult<Vec<Goal>>;

    async fn list(&self, filter: GoalFilter) -> CoreResult<Vec<Goal>>;

    /// Enforces the transition table in `GoalStatus::can_transition_to`
    /// and publishes a `goal.{new_status}` event as a side effect of the
    /// call (spec §4.5). A repeated call with the same target status is
    /// a no-op (idempotence law, spec §8).
    async fn update_status(&self, id: &str, new_status: GoalStatus) -> CoreResult<()>;

    /// Dedup helper: `hash(normalized_description, type, domain)`
    /// (spec §9 "deduplication fingerprint").
    async fn exists_by_fingerprint(&self, fingerprint: &str) -> CoreResult<bool>;

    /// Aggregate counts by status, used for observability and by the
    /// coherence monitor's drift check.
    async fn count_by_status(&self) -> CoreResult<HashMap<GoalStatus, u64>>;
}
