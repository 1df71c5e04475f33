use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    /// Issue one non-streaming completion request.
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider adapter
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl LLMProviderConfig {
    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        let api_key = config.active_api_key().ok_or_else(|| {
            AppError::Internal(format!(
                "No API key configured for transform provider '{}'",
                config.provider
            ))
        })?;

        Ok(Self {
            name: config.provider.clone(),
            api_key,
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

/// Build the adapter for a provider. Adapters hold a pooled `reqwest::Client`
/// and are shared by every pipeline run.
pub fn build_adapter(provider: LLMProviderConfig) -> AppResult<Arc<dyn LLMAdapter>> {
    let client = reqwest::Client::builder()
        .timeout(provider.timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let adapter: Arc<dyn LLMAdapter> = match provider.name.as_str() {
        "openai" | "openrouter" | "groq" => {
            let base_url = provider
                .base_url
                .unwrap_or_else(|| crate::llm::openai::default_base_url(&provider.name).to_string());
            Arc::new(crate::llm::openai::OpenAIAdapter::with_client(
                client,
                &provider.api_key,
                base_url,
            ))
        }
        "anthropic" => {
            let base_url = provider
                .base_url
                .unwrap_or_else(|| crate::llm::anthropic::ANTHROPIC_API_BASE.to_string());
            Arc::new(crate::llm::anthropic::AnthropicAdapter::with_client(
                client,
                &provider.api_key,
                base_url,
            ))
        }
        other => {
            return Err(AppError::Internal(format!("Unsupported provider: {}", other)));
        }
    };

    Ok(adapter)
}

/// Map a reqwest transport failure, calling out timeouts separately.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::LLMApi(format!("{} request timed out: {}", provider, err))
    } else {
        AppError::LLMApi(format!("{} request failed: {}", provider, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            api_key: "test-key".to_string(),
            base_url: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_build_adapter_known_providers() {
        for name in ["openai", "openrouter", "groq", "anthropic"] {
            assert!(build_adapter(provider(name)).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_build_adapter_rejects_unknown_provider() {
        match build_adapter(provider("carrier-pigeon")) {
            Err(AppError::Internal(msg)) => assert!(msg.contains("carrier-pigeon")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
