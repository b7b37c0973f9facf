//! End-to-end coherence scenario (spec §8 scenario 5: "coherence emits a
//! goal"), driven through the monitor's periodic `spawn()` loop and
//! asserting on the published `goal.created` event rather than calling
//! `tick()` directly.

use std::sync::Arc;
use std::time::Duration;

use cogcore::domain::models::config::CoherenceConfig;
use cogcore::domain::models::GoalStatus;
use cogcore::domain::ports::{subjects, EventBus, GoalFilter, GoalRepository, KvStore};
use cogcore::infrastructure::database::{DatabaseConnection, SqliteGoalRepository};
use cogcore::infrastructure::event_bus::BroadcastEventBus;
use cogcore::infrastructure::kv::InMemoryKvStore;
use cogcore::services::{Belief, CoherenceMonitor};

#[tokio::test]
async fn spawned_monitor_publishes_goal_created_for_opposing_beliefs() {
    let conn = DatabaseConnection::in_memory().await.unwrap();
    let goal_repo: Arc<dyn GoalRepository> = Arc::new(SqliteGoalRepository::new(conn.pool().clone()));
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());
    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());

    let a = Belief { statement: "the rollout is stable".to_string(), confidence: 0.9 };
    let b = Belief { statement: "the rollout is unstable".to_string(), confidence: 0.8 };
    kv.lpush("beliefs:release", &serde_json::to_string(&a).unwrap()).await.unwrap();
    kv.lpush("beliefs:release", &serde_json::to_string(&b).unwrap()).await.unwrap();

    let mut goal_created_rx = bus.subscribe(subjects::GOAL_CREATED).await.unwrap();

    let monitor = Arc::new(CoherenceMonitor::new(
        &CoherenceConfig { interval_secs: 1, beliefs_per_domain: 10, drift_threshold_secs: 24 * 60 * 60, loop_repeat_count: 5 },
        "agent-1",
        vec!["release".to_string()],
        vec![],
        goal_repo.clone(),
        kv,
        bus,
    ));
    monitor.spawn();

    let event = tokio::time::timeout(Duration::from_secs(5), goal_created_rx.recv())
        .await
        .expect("timed out waiting for goal.created")
        .expect("bus closed before publishing");
    assert_eq!(event.subject, subjects::GOAL_CREATED);
    assert_eq!(event.payload["kind"], "belief_contradiction");

    let goals = goal_repo.list(GoalFilter { status: Some(GoalStatus::Pending), domain: None }).await.unwrap();
    assert_eq!(goals.len(), 1);
    // severity = 0.9 * 0.8 = 0.72 -> priority round(7.2) = 7
    assert_eq!(goals[0].priority, 7);
}
