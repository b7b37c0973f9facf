//! LLM provider port (spec §6.3): a bare HTTP request/response contract.
//!
//! Deliberately retry-free — spec §4.3 mandates "the queue is a transport,
//! not a policy engine," so this trait's single method either returns a
//! response or a `CoreError::ProviderError` carrying enough detail
//! (`status`, `body_excerpt`, `retryable`) for the *caller* to decide
//! whether to retry. No rate limiting or backoff happens behind this
//! trait.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::llm_request::LlmResponse;
use crate::domain::models::{LlmOptions, LlmRequest};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// `POST {model, prompt, options} -> {text, usage?}` (spec §6.3).
    /// A single attempt; never retries internally.
    async fn send(&self, request: &LlmRequest) -> CoreResult<LlmResponse>;
}

/// Request body shape sent on the wire (spec §6.3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderRequestBody<'a> {
    pub model: Option<&'a str>,
    pub prompt: &'a str,
    pub options: &'a LlmOptions,
}
