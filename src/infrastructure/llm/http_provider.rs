use async_trait::async_trait;
use std::time::Duration;
use tracing::instrument;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::llm_request::LlmResponse;
use crate::domain::models::LlmRequest;
use crate::domain::ports::llm_provider::ProviderRequestBody;
use crate::domain::ports::LlmProvider;

#[derive(Debug, Clone)]
pub struct HttpLlmProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for HttpLlmProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| "dummy-api-key-for-testing".to_string()),
            timeout_secs: 120,
        }
    }
}

/// A single HTTP call per request, deliberately without retry or a token
/// bucket: the queue is a transport, not a policy engine (spec §4.3).
pub struct HttpLlmProvider {
    http_client: reqwest::Client,
    config: HttpLlmProviderConfig,
}

impl HttpLlmProvider {
    pub fn new(config: HttpLlmProviderConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http_client, config })
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn send(&self, request: &LlmRequest) -> CoreResult<LlmResponse> {
        let body = ProviderRequestBody {
            model: request.options.model.as_deref(),
            prompt: &request.prompt,
            options: &request.options,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error_from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderError {
                status: Some(status.as_u16()),
                body_excerpt: excerpt(&body_text),
                retryable: is_retryable_status(status.as_u16()),
            });
        }

        response
            .json::<LlmResponse>()
            .await
            .map_err(|e| CoreError::ProviderError {
                status: Some(status.as_u16()),
                body_excerpt: format!("failed to parse provider response: {e}"),
                retryable: false,
            })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429 | 500 | 502 | 503 | 504 | 529)
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}

fn provider_error_from_reqwest(err: &reqwest::Error) -> CoreError {
    CoreError::ProviderError {
        status: err.status().map(|s| s.as_u16()),
        body_excerpt: err.to_string(),
        retryable: err.is_timeout() || err.is_connect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses_are_retryable() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let result = excerpt(&body);
        assert!(result.len() < body.len());
        assert!(result.ends_with("..."));
    }
}
