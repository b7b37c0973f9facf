use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::errors::CoreResult;
use crate::domain::ports::{BusEvent, EventBus};

const CHANNEL_CAPACITY: usize = 1024;

pub struct BroadcastEventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

/// `events.news.*` matches any subject with `events.news.` as a prefix;
/// an exact pattern (no trailing `*`) matches only that subject.
fn subject_matches(pattern: &str, subject: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => subject.starts_with(prefix),
        None => pattern == subject,
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: BusEvent) -> CoreResult<()> {
        // No subscribers is not an error: publishing is fire-and-forget.
        let _ = self.sender.send(event);
        Ok(())
    }

    async fn subscribe(
        &self,
        subject_pattern: &str,
    ) -> CoreResult<tokio::sync::mpsc::Receiver<BusEvent>> {
        let mut broadcast_rx = self.sender.subscribe();
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        let pattern = subject_pattern.to_string();

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => {
                        if subject_matches(&pattern, &event.subject) && tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, pattern = %pattern, "event subscriber lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}
