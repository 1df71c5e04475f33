// Type definitions and error taxonomy

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::Stage;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    /// Model identifier as reported by the service.
    pub model: String,
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Fatal pipeline failures. Each variant aborts the run at the stage it is
/// raised from; advisory markup problems use
/// [`crate::pipeline::sanitizer::ValidationError`] instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Upload too large: {0}")]
    InputTooLarge(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

/// A [`ConversionError`] tagged with the stage that raised it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub error: ConversionError,
}

impl PipelineError {
    pub fn new(stage: Stage, error: ConversionError) -> Self {
        Self { stage, error }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LLMApi(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(e) => match e.error {
                ConversionError::Input(_) => StatusCode::BAD_REQUEST,
                ConversionError::InputTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                ConversionError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ConversionError::Transform(_) => StatusCode::BAD_GATEWAY,
                ConversionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let stage = match &self {
            AppError::Pipeline(e) => Some(e.stage),
            _ => None,
        };
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "stage": stage,
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_status_codes() {
        let transform = AppError::from(PipelineError::new(
            Stage::Transform,
            ConversionError::Transform("HTTP 500".to_string()),
        ));
        assert_eq!(transform.status_code(), StatusCode::BAD_GATEWAY);

        let extraction = AppError::from(PipelineError::new(
            Stage::Extraction,
            ConversionError::Extraction("not a pdf".to_string()),
        ));
        assert_eq!(extraction.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let too_large = AppError::from(PipelineError::new(
            Stage::Input,
            ConversionError::InputTooLarge("2097152 bytes".to_string()),
        ));
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        assert_eq!(AppError::Auth("no token".into()).status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_pipeline_error_display_names_stage() {
        let err = PipelineError::new(
            Stage::Refine,
            ConversionError::Transform("empty completion".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("refine"), "got: {msg}");
        assert!(msg.contains("empty completion"), "got: {msg}");
    }

    #[test]
    fn test_llm_message_constructors() {
        let message = LLMMessage::user("hi");
        assert_eq!(message.role, "user");
        assert_eq!(message.content, "hi");
        assert_eq!(LLMMessage::new("assistant", "ok").role, "assistant");
    }
}
