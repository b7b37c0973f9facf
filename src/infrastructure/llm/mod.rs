//! LLM provider adapters implementing `domain::ports::LlmProvider`
//! (spec §6.3). `HttpLlmProvider` is a single bare HTTP call with no
//! internal retry or rate limiting — the queue (C3) owns concurrency
//! control and the caller owns retry policy, per spec §4.3.

pub mod http_provider;
pub mod mock_provider;

pub use http_provider::{HttpLlmProvider, HttpLlmProviderConfig};
pub use mock_provider::MockLlmProvider;
