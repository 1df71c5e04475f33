//! Single-shot calls to the generative transform service.

use std::sync::Arc;

use tracing::{debug, info};

use super::prompts::{self, Purpose};
use crate::config::LLMConfig;
use crate::llm::LLMAdapter;
use crate::types::{ConversionError, LLMMessage, LLMRequest, TokenUsage};

/// Generation parameters shared by every pass.
#[derive(Debug, Clone)]
pub struct TransformSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl From<&LLMConfig> for TransformSettings {
    fn from(config: &LLMConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Raw completion plus the response metadata recorded on the job.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub content: String,
    pub model: String,
    pub stop_reason: String,
    pub usage: TokenUsage,
}

pub struct TransformClient {
    adapter: Arc<dyn LLMAdapter>,
    settings: TransformSettings,
}

impl TransformClient {
    pub fn new(adapter: Arc<dyn LLMAdapter>, settings: TransformSettings) -> Self {
        Self { adapter, settings }
    }

    pub fn settings(&self) -> &TransformSettings {
        &self.settings
    }

    /// Issue exactly one request. No retry; the caller decides what a failure means.
    pub async fn transform(&self, input: &str, purpose: Purpose) -> Result<TransformOutput, ConversionError> {
        let request = LLMRequest {
            provider: self.settings.provider.clone(),
            model: self.settings.model.clone(),
            messages: vec![LLMMessage::user(prompts::render(purpose, input))],
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            system_instruction: None,
        };

        debug!(%purpose, model = %request.model, input_chars = input.len(), "Requesting transform");

        let response = self
            .adapter
            .create_chat_completion(&request)
            .await
            .map_err(|e| ConversionError::Transform(e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(ConversionError::Transform(format!(
                "{} pass returned no completion content",
                purpose
            )));
        }

        info!(
            %purpose,
            model = %response.model,
            stop_reason = %response.finish_reason,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Transform pass complete"
        );

        Ok(TransformOutput {
            content: response.content,
            model: response.model,
            stop_reason: response.finish_reason,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::OpenAIAdapter;
    use crate::pipeline::testing::{openai_completion, ScriptedAdapter};
    use reqwest::Client;

    fn settings() -> TransformSettings {
        TransformSettings {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: Some(4096),
        }
    }

    #[tokio::test]
    async fn test_sends_single_user_message_with_prompt() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![Ok("<?xml version=\"1.0\"?><Document/>".into())]));
        let client = TransformClient::new(adapter.clone(), settings());

        let output = client.transform("Hello", Purpose::Initial).await.unwrap();
        assert!(output.content.starts_with("<?xml"));

        let requests = adapter.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].role, "user");
        assert!(requests[0].messages[0].content.starts_with(prompts::INITIAL_PROMPT));
        assert!(requests[0].messages[0].content.ends_with("Hello"));
        assert_eq!(requests[0].temperature, Some(0.1));
        assert_eq!(requests[0].max_tokens, Some(4096));
    }

    #[tokio::test]
    async fn test_empty_completion_is_transform_error() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![Ok("   \n".into())]));
        let client = TransformClient::new(adapter, settings());
        assert!(matches!(
            client.transform("Hello", Purpose::Refine).await,
            Err(ConversionError::Transform(_))
        ));
    }

    #[tokio::test]
    async fn test_http_failure_is_transform_error_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body(r#"{"error":{"message":"boom"}}"#)
            .expect(1)
            .create_async()
            .await;

        let adapter = Arc::new(OpenAIAdapter::with_client(Client::new(), "sk-test", server.url()));
        let client = TransformClient::new(adapter, settings());

        match client.transform("Hello", Purpose::Initial).await {
            Err(ConversionError::Transform(msg)) => assert!(msg.contains("500"), "got: {msg}"),
            other => panic!("unexpected result: {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_success_carries_response_metadata() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(openai_completion("<?xml version=\"1.0\"?><Document/>"))
            .create_async()
            .await;

        let adapter = Arc::new(OpenAIAdapter::with_client(Client::new(), "sk-test", server.url()));
        let output = TransformClient::new(adapter, settings())
            .transform("Hello", Purpose::Initial)
            .await
            .unwrap();

        assert_eq!(output.stop_reason, "stop");
        assert_eq!(output.model, "gpt-4o-mini");
        assert_eq!(output.usage.total_tokens, 30);
    }
}
