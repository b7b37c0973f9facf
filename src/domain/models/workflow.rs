//! Workflow domain model (spec §3.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Whether a workflow in this status belongs in the `active_workflows`
    /// set (spec §3.3, invariant 6).
    pub fn is_active_set_member(self) -> bool {
        matches!(self, WorkflowStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: WorkflowStepStatus,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub blob_ref: String,
}

/// A durable record of one execution attempt for a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub goal_id: Option<String>,
    pub project_id: Option<String>,
    pub status: WorkflowStatus,
    pub is_ui_request: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    /// `workflow_id` is prefixed by execution type (spec §3.3); this core
    /// does not choose an execution type on behalf of the (out-of-scope)
    /// planner, so it uses a neutral `wf_` prefix followed by a UUID,
    /// which downstream planners may reinterpret or replace.
    pub fn new_id() -> String {
        format!("wf_{}", uuid::Uuid::new_v4())
    }

    pub fn new(goal_id: Option<String>, project_id: Option<String>, is_ui_request: bool) -> Self {
        Self {
            id: Self::new_id(),
            goal_id,
            project_id,
            status: WorkflowStatus::Running,
            is_ui_request,
            started_at: Utc::now(),
            finished_at: None,
            artifacts: Vec::new(),
            error: None,
            steps: Vec::new(),
        }
    }

    /// `now - started_at > timeout` while `status == Running` (spec §4.7
    /// "timeout auto-failure").
    pub fn is_execution_timed_out(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.status == WorkflowStatus::Running && (now - self.started_at) > timeout
    }

    pub fn fail_with_timeout(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Failed;
        self.error = Some("execution timeout".to_string());
        self.finished_at = Some(now);
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Failed;
        self.error = Some("cancelled".to_string());
        self.finished_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_after_timeout_window_is_timed_out() {
        let mut wf = Workflow::new(Some("g1".into()), None, false);
        wf.started_at = Utc::now() - chrono::Duration::minutes(11);
        assert!(wf.is_execution_timed_out(Utc::now(), chrono::Duration::minutes(10)));
    }

    #[test]
    fn fresh_workflow_is_not_timed_out() {
        let wf = Workflow::new(Some("g1".into()), None, false);
        assert!(!wf.is_execution_timed_out(Utc::now(), chrono::Duration::minutes(10)));
    }

    #[test]
    fn only_running_is_active_set_member() {
        assert!(WorkflowStatus::Running.is_active_set_member());
        assert!(!WorkflowStatus::Queued.is_active_set_member());
        assert!(!WorkflowStatus::Completed.is_active_set_member());
        assert!(!WorkflowStatus::Failed.is_active_set_member());
    }

    #[test]
    fn timeout_failure_sets_fields() {
        let mut wf = Workflow::new(None, None, true);
        let now = Utc::now();
        wf.fail_with_timeout(now);
        assert_eq!(wf.status, WorkflowStatus::Failed);
        assert_eq!(wf.error.as_deref(), Some("execution timeout"));
        assert_eq!(wf.finished_at, Some(now));
    }
}
