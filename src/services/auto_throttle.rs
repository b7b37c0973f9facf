//! Auto-Throttle (C4, spec §4.4): a periodic loop that watches LLM queue
//! fullness and hysteretically toggles the `llm:bg_enabled` flag.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::domain::errors::CoreResult;
use crate::domain::models::config::LlmConfig;
use crate::domain::ports::{subjects, BusEvent, EventBus, KvStore};
use crate::services::llm_queue::{LlmQueue, BG_ENABLED_KEY};

pub struct AutoThrottle {
    queue: Arc<LlmQueue>,
    kv: Arc<dyn KvStore>,
    bus: Arc<dyn EventBus>,
    disable_threshold: f64,
    enable_threshold: f64,
    interval: Duration,
}

impl AutoThrottle {
    pub fn new(config: &LlmConfig, queue: Arc<LlmQueue>, kv: Arc<dyn KvStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            queue,
            kv,
            bus,
            disable_threshold: config.disable_threshold,
            enable_threshold: config.enable_threshold,
            interval: Duration::from_secs(config.throttle_interval_secs),
        }
    }

    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.tick().await {
                    tracing::warn!(error = %err, "auto-throttle tick failed");
                }
            }
        });
    }

    /// One evaluation of the hysteresis (spec §4.4). Exposed standalone so
    /// tests can drive it deterministically without waiting on the timer.
    pub async fn tick(&self) -> CoreResult<()> {
        let stats = self.queue.stats().await?;
        let fullness = stats.low_fullness();
        let currently_enabled = self.kv.get(BG_ENABLED_KEY).await?.as_deref() != Some("false");

        if fullness >= self.disable_threshold && currently_enabled {
            self.kv.set(BG_ENABLED_KEY, "false").await?;
            info!(fullness, threshold = self.disable_threshold, "background LLM producers disabled");
            self.bus
                .publish(BusEvent::new(subjects::THROTTLE_DISABLED, serde_json::json!({ "low_fullness": fullness })))
                .await?;
        } else if fullness <= self.enable_threshold && !currently_enabled {
            self.kv.set(BG_ENABLED_KEY, "true").await?;
            info!(fullness, threshold = self.enable_threshold, "background LLM producers re-enabled");
            self.bus
                .publish(BusEvent::new(subjects::THROTTLE_ENABLED, serde_json::json!({ "low_fullness": fullness })))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{LlmPriority, LlmRequest};
    use crate::infrastructure::event_bus::BroadcastEventBus;
    use crate::infrastructure::kv::InMemoryKvStore;
    use crate::infrastructure::llm::MockLlmProvider;
    use chrono::Utc;

    fn low_request() -> LlmRequest {
        LlmRequest {
            id: LlmRequest::new_id(),
            priority: LlmPriority::Low,
            prompt: "p".into(),
            options: Default::default(),
            enqueued_at: Utc::now(),
            deadline: None,
        }
    }

    #[tokio::test]
    async fn disables_at_or_above_threshold() {
        let provider = Arc::new(MockLlmProvider::new(Duration::from_secs(5)));
        let kv = Arc::new(InMemoryKvStore::new());
        let bus = Arc::new(BroadcastEventBus::new());
        let config = LlmConfig {
            workers: 0,
            low_cap: 10,
            disable_threshold: 0.9,
            enable_threshold: 0.5,
            ..LlmConfig::default()
        };
        let queue = LlmQueue::spawn(&config, provider, kv.clone());
        for _ in 0..9 {
            queue.enqueue(low_request(), Box::new(|_| {})).await.unwrap();
        }

        let throttle = AutoThrottle::new(&config, queue, kv.clone(), bus);
        throttle.tick().await.unwrap();
        assert_eq!(kv.get(BG_ENABLED_KEY).await.unwrap().as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn stays_disabled_inside_hysteresis_band() {
        let provider = Arc::new(MockLlmProvider::new(Duration::from_secs(5)));
        let kv = Arc::new(InMemoryKvStore::new());
        kv.set(BG_ENABLED_KEY, "false").await.unwrap();
        let bus = Arc::new(BroadcastEventBus::new());
        let config = LlmConfig {
            workers: 0,
            low_cap: 10,
            disable_threshold: 0.9,
            enable_threshold: 0.5,
            ..LlmConfig::default()
        };
        // background is disabled, so we can't enqueue LOW through the public
        // path to simulate 7/10 fullness; exercise the hysteresis band logic
        // directly against a freshly constructed queue with bg re-enabled
        // to seed the stack, then flip back.
        kv.set(BG_ENABLED_KEY, "true").await.unwrap();
        let queue = LlmQueue::spawn(&config, provider, kv.clone());
        for _ in 0..7 {
            queue.enqueue(low_request(), Box::new(|_| {})).await.unwrap();
        }
        kv.set(BG_ENABLED_KEY, "false").await.unwrap();

        let throttle = AutoThrottle::new(&config, queue, kv.clone(), bus);
        throttle.tick().await.unwrap();
        assert_eq!(kv.get(BG_ENABLED_KEY).await.unwrap().as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn enables_at_or_below_threshold() {
        let provider = Arc::new(MockLlmProvider::new(Duration::from_secs(5)));
        let kv = Arc::new(InMemoryKvStore::new());
        let bus = Arc::new(BroadcastEventBus::new());
        let config = LlmConfig {
            workers: 0,
            low_cap: 10,
            disable_threshold: 0.9,
            enable_threshold: 0.5,
            ..LlmConfig::default()
        };
        let queue = LlmQueue::spawn(&config, provider, kv.clone());
        for _ in 0..5 {
            queue.enqueue(low_request(), Box::new(|_| {})).await.unwrap();
        }
        kv.set(BG_ENABLED_KEY, "false").await.unwrap();

        let throttle = AutoThrottle::new(&config, queue, kv.clone(), bus);
        throttle.tick().await.unwrap();
        assert_eq!(kv.get(BG_ENABLED_KEY).await.unwrap().as_deref(), Some("true"));
    }
}
