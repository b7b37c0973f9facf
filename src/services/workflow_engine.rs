//! Workflow Engine (C8, spec §4.7): admission-controlled execution
//! bookkeeping, execution-timeout cleanup, and artifact/step recording.
//! Actual execution is outsourced to an out-of-scope planner/executor;
//! this engine only tracks admission, status, and timeout.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::config::WorkflowConfig;
use crate::domain::models::Workflow;
use crate::domain::ports::{subjects, BusEvent, EventBus, WorkflowRepository};

pub struct WorkflowEngine {
    repo: Arc<dyn WorkflowRepository>,
    bus: Arc<dyn EventBus>,
    max_ui: usize,
    max_bg: usize,
    timeout: chrono::Duration,
}

impl WorkflowEngine {
    pub fn new(config: &WorkflowConfig, repo: Arc<dyn WorkflowRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            repo,
            bus,
            max_ui: config.max_ui,
            max_bg: config.max_bg,
            timeout: chrono::Duration::seconds(config.timeout_secs as i64),
        }
    }

    /// Admission-controlled submission (spec §4.7). Runs cleanup first so
    /// stale running workflows free their slot before the cap check.
    #[instrument(skip(self))]
    pub async fn submit_async(
        &self,
        goal_id: Option<String>,
        project_id: Option<String>,
        is_ui_request: bool,
        routing_hint: Option<&str>,
    ) -> CoreResult<String> {
        self.cleanup().await?;

        let cap = if is_ui_request { self.max_ui } else { self.max_bg };
        let current = self.repo.count_active(Some(is_ui_request)).await?;
        if current >= cap {
            return Err(CoreError::Overloaded);
        }

        let workflow = Workflow::new(goal_id, project_id, is_ui_request);
        self.repo.insert_running(&workflow).await?;
        self.bus
            .publish(BusEvent::new(
                subjects::WORKFLOW_STARTED,
                serde_json::json!({
                    "workflow_id": workflow.id,
                    "is_ui_request": is_ui_request,
                    "routing_hint": routing_hint,
                }),
            ))
            .await?;
        Ok(workflow.id)
    }

    pub async fn get_status(&self, id: &str) -> CoreResult<Workflow> {
        self.cleanup().await?;
        self.repo.get(id).await?.ok_or_else(|| CoreError::NotFound(format!("workflow:{id}")))
    }

    /// Whether a goal already has a running workflow (spec §8 invariant
    /// 7, "no duplicate concurrent execution for the same goal").
    pub async fn has_running_for_goal(&self, goal_id: &str) -> CoreResult<bool> {
        self.repo.has_running_for_goal(goal_id).await
    }

    /// Best-effort cancellation (spec §4.7): transitions a running
    /// workflow to `failed` with error `"cancelled"`. A no-op if the
    /// workflow is already terminal.
    pub async fn cancel(&self, id: &str) -> CoreResult<()> {
        let Some(mut workflow) = self.repo.get(id).await? else {
            return Err(CoreError::NotFound(format!("workflow:{id}")));
        };
        if workflow.status != crate::domain::models::WorkflowStatus::Running {
            return Ok(());
        }
        workflow.cancel(Utc::now());
        self.repo.update(&workflow).await?;
        self.bus
            .publish(BusEvent::new(subjects::WORKFLOW_FAILED, serde_json::json!({ "workflow_id": id, "error": "cancelled" })))
            .await?;
        Ok(())
    }

    /// Timeout auto-failure pass (spec §4.7). Called opportunistically on
    /// every admission and status query, and additionally on a dedicated
    /// timer via `spawn_periodic_cleanup` so invariant 8 (spec §8) holds
    /// even when no admission/status traffic is occurring.
    pub async fn cleanup(&self) -> CoreResult<usize> {
        let active = self.repo.list_active().await?;
        let now = Utc::now();
        let mut timed_out = 0;
        for mut workflow in active {
            if workflow.is_execution_timed_out(now, self.timeout) {
                workflow.fail_with_timeout(now);
                self.repo.update(&workflow).await?;
                self.bus
                    .publish(BusEvent::new(
                        subjects::WORKFLOW_FAILED,
                        serde_json::json!({ "workflow_id": workflow.id, "error": "execution timeout" }),
                    ))
                    .await?;
                timed_out += 1;
            }
        }
        if timed_out > 0 {
            info!(count = timed_out, "timed out stale workflows");
        }
        Ok(timed_out)
    }

    pub fn spawn_periodic_cleanup(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.cleanup().await {
                    warn!(error = %err, "periodic workflow cleanup failed");
                }
            }
        });
    }
}
