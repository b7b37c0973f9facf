//! LLM Queue (C3, spec §4.3): a two-level LIFO priority stack gating every
//! call to the LLM provider, with bounded worker parallelism and
//! callback-routed responses.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{instrument, warn};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::config::LlmConfig;
use crate::domain::models::llm_request::LlmResponse;
use crate::domain::models::{LlmPriority, LlmRequest, QueueStats};
use crate::domain::ports::{KvStore, LlmProvider};

/// One-shot response sink, invoked exactly once per accepted request
/// (spec §3.1 invariant). A boxed closure rather than a `Future`/promise
/// because callers route responses back into unrelated subsystems (chat
/// sessions, workflow steps, background learners) — see design notes
/// "callback-centric async".
pub type LlmCallback = Box<dyn FnOnce(CoreResult<LlmResponse>) + Send + 'static>;

pub const BG_ENABLED_KEY: &str = "llm:bg_enabled";
pub const BG_FORCE_DISABLED_KEY: &str = "llm:bg_force_disabled";

struct PendingRequest {
    request: LlmRequest,
    callback: LlmCallback,
}

#[derive(Default)]
struct Stacks {
    high: Vec<PendingRequest>,
    low: Vec<PendingRequest>,
}

struct ResponseMsg {
    callback: LlmCallback,
    result: CoreResult<LlmResponse>,
}

/// Bounded two-level LIFO priority queue mediating all LLM provider calls.
pub struct LlmQueue {
    stacks: Mutex<Stacks>,
    notify: Notify,
    worker_semaphore: Arc<Semaphore>,
    workers_total: usize,
    high_cap: usize,
    low_cap: usize,
    rejections_total: AtomicU64,
    shutting_down: AtomicBool,
    response_tx: mpsc::Sender<ResponseMsg>,
    provider: Arc<dyn LlmProvider>,
    kv: Arc<dyn KvStore>,
}

impl LlmQueue {
    /// Spawns the dispatcher and response-processor loops and returns a
    /// handle. `response_capacity` should be at least `config.workers`
    /// (spec §4.3 "ResponseChan ... cap >= W").
    pub fn spawn(config: &LlmConfig, provider: Arc<dyn LlmProvider>, kv: Arc<dyn KvStore>) -> Arc<Self> {
        let (response_tx, response_rx) = mpsc::channel(config.workers.max(1) * 4);
        let queue = Arc::new(Self {
            stacks: Mutex::new(Stacks::default()),
            notify: Notify::new(),
            worker_semaphore: Arc::new(Semaphore::new(config.workers.max(1))),
            workers_total: config.workers.max(1),
            high_cap: config.high_cap,
            low_cap: config.low_cap,
            rejections_total: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
            response_tx,
            provider,
            kv,
        });

        tokio::spawn(queue.clone().run_dispatcher());
        tokio::spawn(run_response_processor(response_rx));
        queue
    }

    /// Whether LOW-priority enqueues are currently permitted. A manual
    /// override (`llm:bg_force_disabled`) takes precedence (spec §4.4).
    pub async fn background_enabled(&self) -> CoreResult<bool> {
        if self.kv.get(BG_FORCE_DISABLED_KEY).await?.as_deref() == Some("true") {
            return Ok(false);
        }
        Ok(self.kv.get(BG_ENABLED_KEY).await?.as_deref() != Some("false"))
    }

    /// Enqueues a request, never blocking on worker availability. Rejects
    /// synchronously with `Cancelled`, `BackgroundDisabled`, or
    /// `QueueFull`; the queue never invokes `callback` for a rejected
    /// request (spec §3.1, §8 invariant 2).
    #[instrument(skip(self, callback), fields(request_id = %request.id, priority = ?request.priority))]
    pub async fn enqueue(&self, request: LlmRequest, callback: LlmCallback) -> CoreResult<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            self.rejections_total.fetch_add(1, Ordering::SeqCst);
            return Err(CoreError::Cancelled);
        }

        if request.priority == LlmPriority::Low && !self.background_enabled().await? {
            self.rejections_total.fetch_add(1, Ordering::SeqCst);
            return Err(CoreError::BackgroundDisabled);
        }

        let rejected = {
            let mut stacks = self.stacks.lock().unwrap();
            let (stack, cap) = match request.priority {
                LlmPriority::High => (&mut stacks.high, self.high_cap),
                LlmPriority::Low => (&mut stacks.low, self.low_cap),
            };
            if stack.len() >= cap {
                true
            } else {
                stack.push(PendingRequest { request, callback });
                false
            }
        };

        if rejected {
            self.rejections_total.fetch_add(1, Ordering::SeqCst);
            return Err(CoreError::QueueFull);
        }

        self.notify.notify_one();
        Ok(())
    }

    /// Lock-free(-ish) snapshot of current queue state (spec §3.4).
    pub async fn stats(&self) -> CoreResult<QueueStats> {
        let (high_size, low_size) = {
            let stacks = self.stacks.lock().unwrap();
            (stacks.high.len(), stacks.low.len())
        };
        let workers_busy = self.workers_total - self.worker_semaphore.available_permits();
        Ok(QueueStats {
            high_size,
            low_size,
            high_cap: self.high_cap,
            low_cap: self.low_cap,
            workers_busy,
            workers_total: self.workers_total,
            background_enabled: self.background_enabled().await?,
            rejections_total: self.rejections_total.load(Ordering::SeqCst),
        })
    }

    /// Stops accepting dispatch, waits up to `grace` for in-flight workers
    /// to drain, then invokes `Cancelled` on anything still queued.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline && self.worker_semaphore.available_permits() < self.workers_total {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let stranded: Vec<PendingRequest> = {
            let mut stacks = self.stacks.lock().unwrap();
            stacks.high.drain(..).chain(stacks.low.drain(..)).collect()
        };
        for entry in stranded {
            (entry.callback)(Err(CoreError::Cancelled));
        }
    }

    fn pop_ready(&self) -> Option<PendingRequest> {
        let mut stacks = self.stacks.lock().unwrap();
        stacks.high.pop().or_else(|| stacks.low.pop())
    }

    /// Dispatcher loop (spec §4.3 "Scheduling algorithm"): acquire a
    /// worker permit, pop HIGH-before-LOW LIFO, check the deadline, hand
    /// off the HTTP call to a worker task.
    async fn run_dispatcher(self: Arc<Self>) {
        loop {
            if self.shutting_down.load(Ordering::SeqCst) {
                let empty = {
                    let stacks = self.stacks.lock().unwrap();
                    stacks.high.is_empty() && stacks.low.is_empty()
                };
                if empty {
                    break;
                }
            }

            let Ok(permit) = self.worker_semaphore.clone().acquire_owned().await else {
                break;
            };

            let entry = loop {
                if let Some(entry) = self.pop_ready() {
                    break Some(entry);
                }
                if self.shutting_down.load(Ordering::SeqCst) {
                    break None;
                }
                self.notify.notified().await;
            };

            let Some(entry) = entry else {
                drop(permit);
                break;
            };

            if entry.request.is_expired(Utc::now()) {
                drop(permit);
                (entry.callback)(Err(CoreError::DeadlineExceeded));
                continue;
            }

            let provider = self.provider.clone();
            let response_tx = self.response_tx.clone();
            tokio::spawn(async move {
                let result = provider.send(&entry.request).await;
                let _permit = permit; // held until the call completes, then dropped here
                if response_tx.send(ResponseMsg { callback: entry.callback, result }).await.is_err() {
                    warn!("response channel closed; dropping LLM callback invocation");
                }
            });
        }
    }
}

/// Response-processor loop (spec §4.3): reads completed calls off the
/// bounded channel and invokes each callback exactly once. Invocations are
/// spawned individually so they may proceed concurrently across requests.
async fn run_response_processor(mut rx: mpsc::Receiver<ResponseMsg>) {
    while let Some(msg) = rx.recv().await {
        tokio::spawn(async move {
            (msg.callback)(msg.result);
        });
    }
}

/// Snapshot of aggregate per-domain success/value stats consulted by the
/// goal scorer (spec §4.6.2); populated by the learning feedback loop.
#[derive(Debug, Clone, Default)]
pub struct DomainSuccessStats(pub HashMap<(String, String), (f64, f64)>);
