//! End-to-end dispatcher back-off scenario (spec §8 scenario 4): repeated
//! `Overloaded` submissions must double the poll interval up to its
//! configured cap, without ever marking the goal triggered or touching
//! its status.

use std::sync::Arc;

use cogcore::domain::models::config::{GoalConfig, WorkflowConfig};
use cogcore::domain::models::{Goal, GoalStatus, GoalType};
use cogcore::domain::ports::{EventBus, GoalRepository};
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

/// A workflow engine with zero admission capacity on both lanes always
/// rejects submission with `Overloaded`, the same way the teacher's
/// single-tick unit test forces it (see `goal_poller.rs`'s
/// `overload_backs_off_without_marking_triggered`), just driven across
/// many cycles here to observe the full doubling progression.
#[tokio::test]
async fn interval_doubles_then_caps_while_goal_stays_pending_and_untriggered() {
    let conn = DatabaseConnection::in_memory().await.unwrap();
    let goal_repo: Arc<dyn GoalRepository> = Arc::new(SqliteGoalRepository::new(conn.pool().clone()));
    let workflow_repo = Arc::new(SqliteWorkflowRepository::new(conn.pool().clone()));
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());
    let kv = Arc::new(InMemoryKvStore::new());

    let engine = Arc::new(WorkflowEngine::new(&WorkflowConfig { max_ui: 0, max_bg: 0, timeout_secs: 600 }, workflow_repo, bus.clone()));
    let poller = Arc::new(GoalPoller::new(&goal_config(), "agent-1", goal_repo.clone(), engine, kv.clone(), bus, vec![], vec![]));

    let goal = Goal::new("agent-1", "investigate something", GoalType::Curiosity, "physics", 5);
    goal_repo.put(&goal).await.unwrap();

    let base_millis = goal_config().poll_interval_secs * 1000;
    let cap_millis = goal_config().poll_backoff_cap_secs * 1000;

    let mut previous = base_millis;
    let mut reached_cap = false;
    for _ in 0..8 {
        let dispatched = poller.tick().await.unwrap();
        assert_eq!(dispatched, None, "an overloaded engine must never dispatch a goal");

        let current = poller.current_poll_interval_millis();
        assert!(current >= previous, "back-off interval must never shrink");
        assert!(current <= cap_millis, "back-off interval must never exceed the configured cap");
        if current == cap_millis {
            reached_cap = true;
        }
        previous = current;

        let unchanged = goal_repo.get(&goal.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, GoalStatus::Pending);
        assert!(kv.get(&format!("triggered:agent-1:{}", goal.id)).await.unwrap().is_none());
    }

    assert!(reached_cap, "eight consecutive overloads at base=2s should have doubled past the 60s cap");
    assert_eq!(previous, cap_millis);
}
