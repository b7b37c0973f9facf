//! LLM request envelope (spec §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The two LLM request classes. HIGH is user-visible latency-critical
/// work; LOW is background autonomy work subject to auto-throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LlmPriority {
    High,
    Low,
}

/// Provider-agnostic request options (model name, temperature, max tokens,
/// and anything else a specific provider cares about).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single request to the LLM queue (C3).
///
/// The queue's public contract is the one-shot invocation of a callback
/// exactly once per accepted request (success, provider error, deadline,
/// or cancellation). The callback itself is not part of this struct — it
/// is carried alongside the request by the queue's internal pending-entry
/// type, since channel senders are not `Clone`/`Serialize` and this type
/// otherwise needs to stay plain data for logging and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub id: String,
    pub priority: LlmPriority,
    pub prompt: String,
    #[serde(default)]
    pub options: LlmOptions,
    pub enqueued_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
}

impl LlmRequest {
    /// A fresh request id: a monotonic millisecond timestamp plus a random
    /// suffix, so ids sort roughly by arrival while staying unique under
    /// concurrent callers.
    pub fn new_id() -> String {
        format!("llm-{}-{}", Utc::now().timestamp_millis(), &uuid::Uuid::new_v4().simple())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

/// Successful LLM response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Option<serde_json::Value>,
}
