//! SQLite implementation of `GoalRepository` (C6).
//!
//! The active set and priority index required by spec §4.5 are not
//! maintained as separate structures here: because `status` is a column
//! with an index, `status IN ('pending','active')` *is* the active set by
//! construction, and `ORDER BY priority DESC, created_at ASC` *is* the
//! priority index with its FIFO tie-break — both kept trivially consistent
//! by a single-row UPDATE rather than compensating multi-key writes.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Goal, GoalStatus, GoalType};
use crate::domain::ports::{GoalFilter, GoalRepository};
use crate::infrastructure::database::utils::parse_datetime;
use crate::services::fingerprint;

pub struct SqliteGoalRepository {
    pool: SqlitePool,
}

impl SqliteGoalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn status_to_str(status: GoalStatus) -> &'static str {
    match status {
        GoalStatus::Pending => "pending",
        GoalStatus::Active => "active",
        GoalStatus::Completed => "completed",
        GoalStatus::Failed => "failed",
        GoalStatus::Abandoned => "abandoned",
    }
}

fn str_to_status(s: &str) -> CoreResult<GoalStatus> {
    Ok(match s {
        "pending" => GoalStatus::Pending,
        "active" => GoalStatus::Active,
        "completed" => GoalStatus::Completed,
        "failed" => GoalStatus::Failed,
        "abandoned" => GoalStatus::Abandoned,
        other => return Err(CoreError::InvariantViolation(format!("unknown goal status {other:?}"))),
    })
}

fn type_to_str(t: GoalType) -> &'static str {
    match t {
        GoalType::Curiosity => "curiosity",
        GoalType::HypothesisTest => "hypothesis_test",
        GoalType::Coherence => "coherence",
        GoalType::ActiveLearning => "active_learning",
        GoalType::User => "user",
        GoalType::WorkflowDiscovery => "workflow_discovery",
    }
}

fn str_to_type(s: &str) -> CoreResult<GoalType> {
    Ok(match s {
        "curiosity" => GoalType::Curiosity,
        "hypothesis_test" => GoalType::HypothesisTest,
        "coherence" => GoalType::Coherence,
        "active_learning" => GoalType::ActiveLearning,
        "user" => GoalType::User,
        "workflow_discovery" => GoalType::WorkflowDiscovery,
        other => return Err(CoreError::InvariantViolation(format!("unknown goal type {other:?}"))),
    })
}

fn row_to_goal(row: &sqlx::sqlite::SqliteRow) -> CoreResult<Goal> {
    let context_raw: String = row.try_get("context").map_err(|e| CoreError::Storage(e.to_string()))?;
    let context: HashMap<String, serde_json::Value> = serde_json::from_str(&context_raw)?;
    let created_raw: String = row.try_get("created_at").map_err(|e| CoreError::Storage(e.to_string()))?;
    let updated_raw: String = row.try_get("updated_at").map_err(|e| CoreError::Storage(e.to_string()))?;

    Ok(Goal {
        id: row.try_get("id").map_err(|e| CoreError::Storage(e.to_string()))?,
        agent_id: row.try_get("agent_id").map_err(|e| CoreError::Storage(e.to_string()))?,
        description: row.try_get("description").map_err(|e| CoreError::Storage(e.to_string()))?,
        goal_type: str_to_type(&row.try_get::<String, _>("goal_type").map_err(|e| CoreError::Storage(e.to_string()))?)?,
        domain: row.try_get("domain").map_err(|e| CoreError::Storage(e.to_string()))?,
        priority: row.try_get::<i64, _>("priority").map_err(|e| CoreError::Storage(e.to_string()))? as u8,
        status: str_to_status(&row.try_get::<String, _>("status").map_err(|e| CoreError::Storage(e.to_string()))?)?,
        confidence: row.try_get("confidence").map_err(|e| CoreError::Storage(e.to_string()))?,
        context,
        created_at: parse_datetime(&created_raw).map_err(|e| CoreError::Storage(e.to_string()))?,
        updated_at: parse_datetime(&updated_raw).map_err(|e| CoreError::Storage(e.to_string()))?,
    })
}

#[async_trait]
impl GoalRepository for SqliteGoalRepository {
    async fn put(&self, goal: &Goal) -> CoreResult<()> {
        let context = serde_json::to_string(&goal.context)?;
        let fp = fingerprint::compute(&goal.description, goal.goal_type, &goal.domain);
        sqlx::query(
            "INSERT INTO goals (id, agent_id, description, goal_type, domain, priority, status, confidence, context, fingerprint, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                description=excluded.description, goal_type=excluded.goal_type, domain=excluded.domain,
                priority=excluded.priority, status=excluded.status, confidence=excluded.confidence,
                context=excluded.context, fingerprint=excluded.fingerprint, updated_at=excluded.updated_at",
        )
        .bind(&goal.id)
        .bind(&goal.agent_id)
        .bind(&goal.description)
        .bind(type_to_str(goal.goal_type))
        .bind(&goal.domain)
        .bind(i64::from(goal.priority))
        .bind(status_to_str(goal.status))
        .bind(goal.confidence)
        .bind(context)
        .bind(fp)
        .bind(goal.created_at.to_rfc3339())
        .bind(goal.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Goal>> {
        let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_goal(&r)).transpose()
    }

    async fn list_active(&self, agent_id: &str, limit: Option<usize>) -> CoreResult<Vec<Goal>> {
        let limit = limit.unwrap_or(u32::MAX as usize) as i64;
        let rows = sqlx::query(
            "SELECT * FROM goals WHERE agent_id = ? AND status IN ('pending','active')
             ORDER BY priority DESC, created_at ASC LIMIT ?",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_goal).collect()
    }

    async fn list(&self, filter: GoalFilter) -> CoreResult<Vec<Goal>> {
        let mut sql = String::from("SELECT * FROM goals WHERE 1=1");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.domain.is_some() {
            sql.push_str(" AND domain = ?");
        }
        sql.push_str(" ORDER BY priority DESC, created_at ASC");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status_to_str(status));
        }
        if let Some(domain) = &filter.domain {
            query = query.bind(domain);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_goal).collect()
    }

    async fn update_status(&self, id: &str, new_status: GoalStatus) -> CoreResult<()> {
        let Some(existing) = self.get(id).await? else {
            return Err(CoreError::NotFound(format!("goal:{id}")));
        };
        if existing.status == new_status {
            return Ok(()); // idempotent no-op (spec §8 law)
        }
        if !existing.status.can_transition_to(new_status) {
            return Err(CoreError::InvariantViolation(format!(
                "illegal goal transition {:?} -> {:?}",
                existing.status, new_status
            )));
        }
        sqlx::query("UPDATE goals SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status_to_str(new_status))
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists_by_fingerprint(&self, fingerprint: &str) -> CoreResult<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM goals WHERE fingerprint = ? AND status != 'abandoned'")
            .bind(fingerprint)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 > 0)
    }

    async fn count_by_status(&self) -> CoreResult<HashMap<GoalStatus, u64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) as n FROM goals GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = HashMap::new();
        for row in rows {
            let status_str: String = row.try_get("status").map_err(|e| CoreError::Storage(e.to_string()))?;
            let n: i64 = row.try_get("n").map_err(|e| CoreError::Storage(e.to_string()))?;
            counts.insert(str_to_status(&status_str)?, n as u64);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::DatabaseConnection;

    async fn repo() -> SqliteGoalRepository {
        let conn = DatabaseConnection::in_memory().await.unwrap();
        SqliteGoalRepository::new(conn.pool().clone())
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let repo = repo().await;
        let goal = Goal::new("agent-1", "investigate drift", GoalType::Curiosity, "physics", 5);
        repo.put(&goal).await.unwrap();
        let fetched = repo.get(&goal.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, goal.id);
        assert_eq!(fetched.status, GoalStatus::Pending);
    }

    #[tokio::test]
    async fn active_set_membership_follows_status() {
        let repo = repo().await;
        let mut goal = Goal::new("agent-1", "a", GoalType::User, "d", 5);
        repo.put(&goal).await.unwrap();
        let active = repo.list_active("agent-1", None).await.unwrap();
        assert_eq!(active.len(), 1);

        goal.status = GoalStatus::Active;
        repo.put(&goal).await.unwrap();
        repo.update_status(&goal.id, GoalStatus::Completed).await.unwrap();
        let active = repo.list_active("agent-1", None).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let repo = repo().await;
        let goal = Goal::new("agent-1", "a", GoalType::User, "d", 5);
        repo.put(&goal).await.unwrap();
        let err = repo.update_status(&goal.id, GoalStatus::Completed).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn repeated_transition_is_idempotent() {
        let repo = repo().await;
        let mut goal = Goal::new("agent-1", "a", GoalType::User, "d", 5);
        goal.status = GoalStatus::Active;
        repo.put(&goal).await.unwrap();
        repo.update_status(&goal.id, GoalStatus::Completed).await.unwrap();
        repo.update_status(&goal.id, GoalStatus::Completed).await.unwrap();
        let fetched = repo.get(&goal.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, GoalStatus::Completed);
    }

    #[tokio::test]
    async fn fingerprint_dedup() {
        let repo = repo().await;
        let goal = Goal::new("agent-1", "Investigate the anomaly.", GoalType::Curiosity, "physics", 5);
        repo.put(&goal).await.unwrap();
        let fp = fingerprint::compute("investigate the anomaly", GoalType::Curiosity, "physics");
        assert!(repo.exists_by_fingerprint(&fp).await.unwrap());
    }
}
