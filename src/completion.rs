//! Completion API client.
//!
//! [`CompletionClient`] is the seam between the pipeline and the external
//! model: the orchestrator only sees prompt-in, text-out, with typed
//! [`UpstreamError`]s. [`OpenAiClient`] talks to the OpenAI chat-completions
//! endpoint over `reqwest`.
//!
//! # Retry Strategy
//!
//! Transient failures retry with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → [`UpstreamError::Rejected`], fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Empty or unparseable completion bodies are [`UpstreamError::Malformed`]
//! and are never retried.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::error::UpstreamError;
use crate::prompt::Prompt;

/// Per-call sampling parameters, fixed per analysis kind.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Abstract completion backend.
///
/// The production implementation is [`OpenAiClient`]; tests substitute a
/// scripted backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one system + user prompt pair and return the raw completion
    /// text, trimmed.
    async fn complete(
        &self,
        prompt: &Prompt,
        params: &CompletionParams,
    ) -> Result<String, UpstreamError>;
}

/// OpenAI chat-completions client.
///
/// Requires the `OPENAI_API_KEY` environment variable. Explicitly
/// constructed and injected into the pipeline at composition time; no
/// module-level client state.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        prompt: &Prompt,
        params: &CompletionParams,
    ) -> Result<String, UpstreamError> {
        let body = serde_json::json!({
            "model": params.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let url = format!("{}/chat/completions", self.api_base);
        let mut last_err: Option<UpstreamError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1u64 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
                        return extract_completion_text(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let (err, retryable) = classify_failure(status.as_u16(), &body_text);
                    if retryable {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(if e.is_timeout() {
                        UpstreamError::Timeout(self.timeout)
                    } else {
                        UpstreamError::Server {
                            status: 0,
                            body: e.to_string(),
                        }
                    });
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| UpstreamError::Malformed("completion failed after retries".into())))
    }
}

/// Map a non-success HTTP status to an [`UpstreamError`] and whether the
/// request is worth retrying. 429 and 5xx are transient; any other 4xx means
/// the request itself was refused and retrying would just repeat it.
fn classify_failure(status: u16, body: &str) -> (UpstreamError, bool) {
    if status == 429 {
        (UpstreamError::RateLimited(truncate(body)), true)
    } else if status >= 500 {
        (
            UpstreamError::Server {
                status,
                body: truncate(body),
            },
            true,
        )
    } else {
        (
            UpstreamError::Rejected {
                status,
                body: truncate(body),
            },
            false,
        )
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn extract_completion_text(json: &serde_json::Value) -> Result<String, UpstreamError> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            UpstreamError::Malformed("missing choices[0].message.content".to_string())
        })?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(UpstreamError::Malformed("empty completion text".to_string()));
    }
    Ok(trimmed.to_string())
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        let (err, retry) = classify_failure(429, "slow down");
        assert!(matches!(err, UpstreamError::RateLimited(_)));
        assert!(retry);

        let (err, retry) = classify_failure(503, "overloaded");
        assert!(matches!(err, UpstreamError::Server { status: 503, .. }));
        assert!(retry);
    }

    #[test]
    fn auth_failure_is_rejected_without_retry() {
        let (err, retry) = classify_failure(401, "invalid api key");
        assert!(matches!(err, UpstreamError::Rejected { status: 401, .. }));
        assert!(!retry);
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn extracts_completion_text() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "  the answer  " } }]
        });
        assert_eq!(extract_completion_text(&json).unwrap(), "the answer");
    }

    #[test]
    fn missing_content_is_malformed() {
        let json = serde_json::json!({ "choices": [] });
        assert!(matches!(
            extract_completion_text(&json),
            Err(UpstreamError::Malformed(_))
        ));
    }

    #[test]
    fn empty_content_is_malformed() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "   " } }]
        });
        assert!(matches!(
            extract_completion_text(&json),
            Err(UpstreamError::Malformed(_))
        ));
    }
}
