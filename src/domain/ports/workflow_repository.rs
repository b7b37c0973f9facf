//! Workflow Engine storage port (C8, spec §4.7).

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::Workflow;

/// Durable workflow records plus the `active_workflows` set the engine's
/// admission control and cleanup pass operate on.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Insert a new `running` workflow record and add its id to
    /// `active_workflows` as a single atomic unit.
    async fn insert_running(&self, workflow: &Workflow) -> CoreResult<()>;

    async fn get(&self, id: &str) -> CoreResult<Option<Workflow>>;

    /// Persist an updated record. If the new status is terminal, removes
    /// the id from `active_workflows` atomically (spec §3.3 invariant 6).
    async fn update(&self, workflow: &Workflow) -> CoreResult<()>;

    /// Current size of `active_workflows`, used by admission control.
    async fn count_active(&self, ui_only: Option<bool>) -> CoreResult<usize>;

    /// All records currently in `active_workflows`, scanned by the
    /// timeout cleanup pass (spec §4.7 "Timeout auto-failure").
    async fn list_active(&self) -> CoreResult<Vec<Workflow>>;

    /// Whether any running workflow is already associated with this goal
    /// id (spec §8 invariant 7, "no dup concurrent execution").
    async fn has_running_for_goal(&self, goal_id: &str) -> CoreResult<bool>;
}
