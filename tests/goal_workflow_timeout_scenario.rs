//! End-to-end goal-dispatch-to-workflow-timeout scenario (spec §8 scenario
//! 3): a dispatched goal whose workflow never completes must fail once the
//! execution timeout elapses, with the triggered entry cleared and a
//! `goal.failed` event published.

use std::sync::Arc;
use std::time::Duration;

use cogcore::domain::models::config::{GoalConfig, WorkflowConfig};
use cogcore::domain::models::{Goal, GoalStatus, GoalType};
use cogcore::domain::ports::{subjects, EventBus, GoalRepository, WorkflowRepository};
use cogcore::infrastructure::database::{DatabaseConnection, SqliteGoalRepository, SqliteWorkflowRepository};
use cogcore::infrastructure::event_bus::BroadcastEventBus;
use cogcore::infrastructure::kv::InMemoryKvStore;
use cogcore::services::{GoalPoller, WorkflowEngine};

fn goal_config() -> GoalConfig {
    GoalConfig {
        poll_interval_secs: 2,
        poll_backoff_cap_secs: 60,
        triggered_ttl_secs: 1800,
        fetch_batch: 50,
        important_terms: vec![],
        generic_terms: vec![],
    }
}

#[tokio::test]
async fn dispatched_goal_fails_when_its_workflow_times_out() {
    let conn = DatabaseConnection::in_memory().await.unwrap();
    let goal_repo: Arc<dyn GoalRepository> = Arc::new(SqliteGoalRepository::new(conn.pool().clone()));
    let workflow_repo: Arc<dyn WorkflowRepository> = Arc::new(SqliteWorkflowRepository::new(conn.pool().clone()));
    let kv = Arc::new(InMemoryKvStore::new());
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());

    // A one-second execution timeout so the scenario completes quickly.
    let engine = Arc::new(WorkflowEngine::new(&WorkflowConfig { max_ui: 4, max_bg: 4, timeout_secs: 1 }, workflow_repo, bus.clone()));

    let goal = Goal::new("agent-1", "investigate a stalled migration", GoalType::Curiosity, "infra", 6);
    goal_repo.put(&goal).await.unwrap();

    let poller = Arc::new(GoalPoller::new(&goal_config(), "agent-1", goal_repo.clone(), engine.clone(), kv.clone(), bus.clone(), vec![], vec![]));

    let mut failed_rx = bus.subscribe(subjects::GOAL_FAILED).await.unwrap();

    let dispatched = poller.tick().await.unwrap();
    assert_eq!(dispatched.as_deref(), Some(goal.id.as_str()));

    let active = goal_repo.get(&goal.id).await.unwrap().unwrap();
    assert_eq!(active.status, GoalStatus::Active);

    // The watcher polls every 500ms and the workflow never completes, so
    // after the 1s timeout elapses the next poll observes it as failed.
    let event = tokio::time::timeout(Duration::from_secs(5), failed_rx.recv())
        .await
        .expect("timed out waiting for goal.failed")
        .expect("bus closed before publishing");
    assert_eq!(event.payload["goal_id"], goal.id);

    let final_goal = goal_repo.get(&goal.id).await.unwrap().unwrap();
    assert_eq!(final_goal.status, GoalStatus::Failed);
    assert!(kv.get(&format!("triggered:agent-1:{}", goal.id)).await.unwrap().is_none());
}
