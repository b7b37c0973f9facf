use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::ports::{SandboxRunner, ToolOutcome, ToolSpec};

/// Test/demo sandbox runner that sleeps for a configurable duration and
/// echoes the call back as a canned outcome, or fails the next `n` calls —
/// used to exercise `ToolExecutor`'s policy gate without a live sandbox.
pub struct MockSandboxRunner {
    delay: Mutex<Duration>,
    fail_next: AtomicUsize,
    calls: Arc<AtomicUsize>,
}

impl MockSandboxRunner {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            fail_next: AtomicUsize::new(0),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxRunner for MockSandboxRunner {
    async fn run(&self, tool: &ToolSpec, args: serde_json::Value) -> CoreResult<ToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        tokio::time::sleep(delay).await;

        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::TransientIO("mock sandbox induced failure".to_string()));
        }

        Ok(ToolOutcome {
            stdout: format!("ran {} with {args}", tool.name),
            exit_code: 0,
            artifacts: Vec::new(),
        })
    }
}
