//! SQLite implementation of `WorkflowRepository` (C8).
//!
//! As with the goal repository, `active_workflows` membership (spec §3.3
//! invariant 6) is the `status = 'running'` subset of the table rather
//! than a separately maintained set.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Artifact, Workflow, WorkflowStatus, WorkflowStep, WorkflowStepStatus};
use crate::domain::ports::WorkflowRepository;
use crate::infrastructure::database::utils::parse_datetime;

pub struct SqliteWorkflowRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn status_to_str(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Queued => "queued",
        WorkflowStatus::Running => "running",
        WorkflowStatus::Completed => "completed",
        WorkflowStatus::Failed => "failed",
    }
}

fn str_to_status(s: &str) -> CoreResult<WorkflowStatus> {
    Ok(match s {
        "queued" => WorkflowStatus::Queued,
        "running" => WorkflowStatus::Running,
        "completed" => WorkflowStatus::Completed,
        "failed" => WorkflowStatus::Failed,
        other => return Err(CoreError::InvariantViolation(format!("unknown workflow status {other:?}"))),
    })
}

fn row_to_workflow(row: &sqlx::sqlite::SqliteRow) -> CoreResult<Workflow> {
    let artifacts_raw: String = row.try_get("artifacts").map_err(|e| CoreError::Storage(e.to_string()))?;
    let steps_raw: String = row.try_get("steps").map_err(|e| CoreError::Storage(e.to_string()))?;
    let started_raw: String = row.try_get("started_at").map_err(|e| CoreError::Storage(e.to_string()))?;
    let finished_raw: Option<String> = row.try_get("finished_at").map_err(|e| CoreError::Storage(e.to_string()))?;

    Ok(Workflow {
        id: row.try_get("id").map_err(|e| CoreError::Storage(e.to_string()))?,
        goal_id: row.try_get("goal_id").map_err(|e| CoreError::Storage(e.to_string()))?,
        project_id: row.try_get("project_id").map_err(|e| CoreError::Storage(e.to_string()))?,
        status: str_to_status(&row.try_get::<String, _>("status").map_err(|e| CoreError::Storage(e.to_string()))?)?,
        is_ui_request: row.try_get::<i64, _>("is_ui_request").map_err(|e| CoreError::Storage(e.to_string()))? != 0,
        started_at: parse_datetime(&started_raw).map_err(|e| CoreError::Storage(e.to_string()))?,
        finished_at: finished_raw
            .map(|s| parse_datetime(&s))
            .transpose()
            .map_err(|e| CoreError::Storage(e.to_string()))?,
        artifacts: serde_json::from_str::<Vec<Artifact>>(&artifacts_raw)?,
        error: row.try_get("error").map_err(|e| CoreError::Storage(e.to_string()))?,
        steps: serde_json::from_str::<Vec<WorkflowStep>>(&steps_raw)?,
    })
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    async fn insert_running(&self, workflow: &Workflow) -> CoreResult<()> {
        let artifacts = serde_json::to_string(&workflow.artifacts)?;
        let steps = serde_json::to_string(&workflow.steps)?;
        sqlx::query(
            "INSERT INTO workflows (id, goal_id, project_id, status, is_ui_request, started_at, finished_at, artifacts, error, steps)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&workflow.id)
        .bind(&workflow.goal_id)
        .bind(&workflow.project_id)
        .bind(status_to_str(workflow.status))
        .bind(i64::from(workflow.is_ui_request))
        .bind(workflow.started_at.to_rfc3339())
        .bind(workflow.finished_at.map(|t| t.to_rfc3339()))
        .bind(artifacts)
        .bind(&workflow.error)
        .bind(steps)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Workflow>> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_workflow(&r)).transpose()
    }

    async fn update(&self, workflow: &Workflow) -> CoreResult<()> {
        let artifacts = serde_json::to_string(&workflow.artifacts)?;
        let steps = serde_json::to_string(&workflow.steps)?;
        sqlx::query(
            "UPDATE workflows SET status=?, finished_at=?, artifacts=?, error=?, steps=? WHERE id=?",
        )
        .bind(status_to_str(workflow.status))
        .bind(workflow.finished_at.map(|t| t.to_rfc3339()))
        .bind(artifacts)
        .bind(&workflow.error)
        .bind(steps)
        .bind(&workflow.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_active(&self, ui_only: Option<bool>) -> CoreResult<usize> {
        let row: (i64,) = match ui_only {
            Some(true) => {
                sqlx::query_as("SELECT COUNT(*) FROM workflows WHERE status = 'running' AND is_ui_request = 1")
                    .fetch_one(&self.pool)
                    .await?
            }
            Some(false) => {
                sqlx::query_as("SELECT COUNT(*) FROM workflows WHERE status = 'running' AND is_ui_request = 0")
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM workflows WHERE status = 'running'")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.0 as usize)
    }

    async fn list_active(&self) -> CoreResult<Vec<Workflow>> {
        let rows = sqlx::query("SELECT * FROM workflows WHERE status = 'running'")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_workflow).collect()
    }

    async fn has_running_for_goal(&self, goal_id: &str) -> CoreResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM workflows WHERE goal_id = ? AND status = 'running'",
        )
        .bind(goal_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::DatabaseConnection;

    async fn repo() -> SqliteWorkflowRepository {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        SqliteWorkflowRepository::new(conn.pool().clone())
    }

    #[tokio::test]
    async fn admission_then_timeout_removes_from_active() {
        let repo = repo().await;
        let mut wf = Workflow::new(Some("g1".into()), None, true);
        repo.insert_running(&wf).await.unwrap();
        assert_eq!(repo.count_active(None).await.unwrap(), 1);

        wf.fail_with_timeout(chrono::Utc::now());
        repo.update(&wf).await.unwrap();
        assert_eq!(repo.count_active(None).await.unwrap(), 0);

        let fetched = repo.get(&wf.id).await.unwrap().unwrap();
        assert_eq!(fetched.error.as_deref(), Some("execution timeout"));
    }

    #[tokio::test]
    async fn ui_and_bg_caps_are_counted_separately() {
        let repo = repo().await;
        repo.insert_running(&Workflow::new(None, None, true)).await.unwrap();
        repo.insert_running(&Workflow::new(None, None, false)).await.unwrap();
        assert_eq!(repo.count_active(Some(true)).await.unwrap(), 1);
        assert_eq!(repo.count_active(Some(false)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn no_dup_running_workflow_for_same_goal() {
        let repo = repo().await;
        let wf = Workflow::new(Some("g1".into()), None, false);
        repo.insert_running(&wf).await.unwrap();
        assert!(repo.has_running_for_goal("g1").await.unwrap());
        assert!(!repo.has_running_for_goal("g2").await.unwrap());
    }
}
