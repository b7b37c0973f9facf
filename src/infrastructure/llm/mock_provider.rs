use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::llm_request::LlmResponse;
use crate::domain::models::LlmRequest;
use crate::domain::ports::LlmProvider;

/// Test/demo provider that sleeps for a configurable duration and then
/// returns a canned response or a canned error — used to drive the timing-
/// sensitive end-to-end scenarios in spec §8 (e.g. "HIGH bypasses LOW",
/// "auto-disable + auto-enable") without a live network dependency.
pub struct MockLlmProvider {
    delay: Mutex<Duration>,
    fail_next: AtomicUsize,
    calls: Arc<AtomicUsize>,
}

impl MockLlmProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            fail_next: AtomicUsize::new(0),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = delay;
    }

    /// The next `n` calls return a `ProviderError` instead of a response.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn send(&self, request: &LlmRequest) -> CoreResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        tokio::time::sleep(delay).await;

        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::ProviderError {
                status: Some(503),
                body_excerpt: "mock provider induced failure".to_string(),
                retryable: true,
            });
        }

        Ok(LlmResponse {
            text: format!("mock response to: {}", request.prompt),
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{LlmOptions, LlmPriority};

    fn request() -> LlmRequest {
        LlmRequest {
            id: "r1".into(),
            priority: LlmPriority::High,
            prompt: "hello".into(),
            options: LlmOptions::default(),
            enqueued_at: chrono::Utc::now(),
            deadline: None,
        }
    }

    #[tokio::test]
    async fn returns_canned_response() {
        let provider = MockLlmProvider::new(Duration::from_millis(1));
        let response = provider.send(&request()).await.unwrap();
        assert!(response.text.contains("hello"));
    }

    #[tokio::test]
    async fn fail_next_forces_provider_error_once() {
        let provider = MockLlmProvider::new(Duration::from_millis(1));
        provider.fail_next(1);
        assert!(provider.send(&request()).await.is_err());
        assert!(provider.send(&request()).await.is_ok());
    }
}
