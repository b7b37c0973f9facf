//! End-to-end learning feedback scenario (spec §8 scenario 6: "learning
//! lowers exploration after success").

use std::sync::Arc;
use std::time::Duration;

use cogcore::domain::models::ExplorationHeuristics;
use cogcore::domain::ports::{subjects, BusEvent};
use cogcore::infrastructure::event_bus::BroadcastEventBus;
use cogcore::infrastructure::kv::InMemoryKvStore;
use cogcore::services::LearningFeedback;

fn completed_event(domain: &str) -> BusEvent {
    BusEvent::new(
        subjects::GOAL_COMPLETED,
        serde_json::json!({
            "goal_id": uuid::Uuid::new_v4().to_string(),
            "domain": domain,
            "hypotheses": [{"id": "h1", "confidence_pred": 1.0, "accuracy": 1.0}],
            "trace_steps": 10,
        }),
    )
}

/// Five well-reasoned, fully accurate `curiosity` completions in a row must
/// push `exploration_rate` strictly below the default, never below zero.
#[tokio::test]
async fn five_successful_completions_lower_exploration_rate() {
    let bus = Arc::new(BroadcastEventBus::new());
    let kv = Arc::new(InMemoryKvStore::new());
    let feedback = Arc::new(LearningFeedback::new(bus.clone(), kv.clone()));
    feedback.clone().spawn();

    // Give the subscription loops a moment to register before publishing.
    tokio::time::sleep(Duration::from_millis(20)).await;

    for _ in 0..5 {
        bus.publish(completed_event("astrophysics")).await.unwrap();
    }

    // Each event is handled asynchronously off the subscription task; poll
    // briefly for the fifth update to land instead of racing a fixed sleep.
    let mut heuristics = ExplorationHeuristics::default();
    for _ in 0..50 {
        if let Some(raw) = kv.get("exploration_heuristics:astrophysics").await.unwrap() {
            heuristics = serde_json::from_str(&raw).unwrap();
            if heuristics.exploration_rate < ExplorationHeuristics::default().exploration_rate - 0.09 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(heuristics.exploration_rate < ExplorationHeuristics::default().exploration_rate);
    assert!(heuristics.exploration_rate >= 0.0);
}
