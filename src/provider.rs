//! Completion provider abstraction and HTTP implementation.
//!
//! The normalizer and the review service call language models exclusively
//! through [`CompletionProvider`], so tests can substitute doubles and the
//! pipeline stays vendor-neutral. [`HttpCompletionProvider`] speaks the
//! OpenAI-compatible chat-completions shape that Claude/DeepSeek/OpenAI
//! gateways all expose.

use crate::error::{DocreviewError, OptionExt, Result};
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Sampling temperature for analysis and repair calls
const TEMPERATURE: f64 = 0.01;

/// Completion cap per request
const MAX_TOKENS: u32 = 20000;

/// Fallback wait when a 429 response carries no Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Abstract language-model backend.
///
/// One method, one contract: a system prompt and a user text in, the
/// model's text reply out. Failures are provider errors; callers inside
/// the normalizer catch them at the escalation boundary.
pub trait CompletionProvider: Send + Sync {
    /// Run one completion call.
    fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Completion provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ProviderConfig {
    /// Create a validated configuration.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(DocreviewError::Config("LLM base URL is empty".to_string()));
        }
        if api_key.trim().is_empty() {
            return Err(DocreviewError::Config("LLM API key is empty".to_string()));
        }
        Ok(Self {
            base_url: base_url.trim().to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
        })
    }
}

/// Token usage tracking
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Accumulated token usage with atomic counters
struct AtomicTokenUsage {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
}

impl AtomicTokenUsage {
    fn new() -> Self {
        Self {
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
        }
    }

    fn add(&self, usage: &ApiUsage) {
        self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(usage.total_tokens, Ordering::Relaxed);
    }

    fn get(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// OpenAI-compatible chat-completions client.
///
/// Accumulates token usage across calls so batch callers can report an
/// aggregate after many concurrent reviews.
pub struct HttpCompletionProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    usage: AtomicTokenUsage,
}

impl HttpCompletionProvider {
    /// Build a provider with a request timeout.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DocreviewError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            usage: AtomicTokenUsage::new(),
        })
    }

    /// Model name this provider sends requests to
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Total token usage accumulated since construction
    pub fn usage(&self) -> TokenUsage {
        self.usage.get()
    }
}

impl CompletionProvider for HttpCompletionProvider {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text}
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS
        });

        let api_url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        debug!(model = %self.config.model, "Sending completion request");

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(DocreviewError::Network)?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(DocreviewError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DocreviewError::Api {
                code: status.as_u16() as i32,
                message: format!("LLM API error: {} - {}", status, error_text),
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| DocreviewError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(usage) = &api_response.usage {
            self.usage.add(usage);
        }

        let content = api_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_parse("LLM response contained no choices")?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_rejects_blank_fields() {
        assert!(ProviderConfig::new("", "key", "model").is_err());
        assert!(ProviderConfig::new("https://api.example.com/v1", "  ", "model").is_err());
    }

    #[test]
    fn test_provider_config_trims_fields() {
        let config = ProviderConfig::new(" https://api.example.com/v1 ", " key ", "gpt-4o-mini")
            .expect("valid config");
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.api_key, "key");
    }

    #[test]
    fn test_chat_completion_response_deserializes() {
        let body = r#"{
            "choices": [{"message": {"content": "{\"score\": 4}"}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
        }"#;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(body).expect("response shape must deserialize");
        assert_eq!(parsed.choices[0].message.content, "{\"score\": 4}");
        assert_eq!(parsed.usage.expect("usage present").total_tokens, 120);
    }

    #[test]
    fn test_atomic_usage_accumulates() {
        let acc = AtomicTokenUsage::new();
        acc.add(&ApiUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        acc.add(&ApiUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        });
        let total = acc.get();
        assert_eq!(total.prompt_tokens, 11);
        assert_eq!(total.completion_tokens, 7);
        assert_eq!(total.total_tokens, 18);
    }
}
