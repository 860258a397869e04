use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use utoipa::ToSchema;

// ============= Chat Completion Types =============

/// A single chat message in the OpenAI wire format.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ChatMessage {
    /// Sender role, e.g. `user`, `assistant` or `system`
    pub role: String,
    /// Message text
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Request body shared by the chat completion and SSE endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionRequest {
    /// Name of the registered agent or workflow
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Continue an existing session; a new id is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DeltaMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionChoice {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<DeltaMessage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// OpenAI-shaped completion; also used for `chat.completion.chunk` frames.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

// ============= Run Types =============

/// Structured, non-text payload emitted alongside streamed content.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Artifact {
    pub id: String,
    /// Free-form type tag such as `image`, `table` or `file`
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, Value>,
}

impl Artifact {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            title: None,
            url: None,
            content: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }
}

/// Final result of an agent or workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResponse {
    pub run_id: String,
    pub session_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl RunResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            session_id: None,
            content: content.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

/// One event in a streamed run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A content delta, optionally carrying artifacts
    Content {
        content: String,
        artifacts: Vec<Artifact>,
    },
    /// A workflow step finished
    StepCompleted { step: String, content: String },
}

impl RunEvent {
    pub fn content(content: impl Into<String>) -> Self {
        RunEvent::Content {
            content: content.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn artifacts(artifacts: Vec<Artifact>) -> Self {
        RunEvent::Content {
            content: String::new(),
            artifacts,
        }
    }
}

/// Boxed stream of run events returned by streaming runs.
pub type RunEventStream =
    std::pin::Pin<Box<dyn futures::Stream<Item = Result<RunEvent>> + Send + 'static>>;

// ============= Memory Types =============

/// A memory the system keeps about a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct UserMemory {
    pub memory_id: Option<String>,
    pub memory: String,
    #[serde(default)]
    pub topics: Vec<String>,
    /// The user input the memory was captured from
    pub input: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserMemory {
    pub fn new(memory: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            memory_id: None,
            memory: memory.into(),
            topics,
            input: None,
            last_updated: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryCreateRequest {
    pub memory: String,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryCreateResponse {
    pub memory_id: String,
    pub memory: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryDeleteResponse {
    pub memory_id: String,
    pub deleted: bool,
}

// ============= Knowledge Types =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Option<String>,
    pub name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub meta_data: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            content: content.into(),
            meta_data: Map::new(),
        }
    }
}

// ============= Authentication Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Vector database error: {0}")]
    VectorDb(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Auth(_) => axum::http::StatusCode::UNAUTHORIZED,
            AppError::Configuration(_)
            | AppError::LLM(_)
            | AppError::Memory(_)
            | AppError::VectorDb(_)
            | AppError::Reranker(_)
            | AppError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<mindmatrix_client::ClientError> for AppError {
    fn from(err: mindmatrix_client::ClientError) -> Self {
        AppError::Reranker(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_request_defaults() {
        let request: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "chatter",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();

        assert!(!request.stream);
        assert!(request.session_id.is_none());
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), 404),
            (AppError::InvalidInput("x".into()), 400),
            (AppError::Auth("x".into()), 401),
            (AppError::Internal("x".into()), 500),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status().as_u16(), expected);
        }
    }

    #[test]
    fn test_artifact_skips_empty_fields() {
        let artifact = Artifact::new("table").with_title("Totals");
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "table");
        assert!(json.get("url").is_none());
        assert!(json.get("metadata").is_none());
    }
}
