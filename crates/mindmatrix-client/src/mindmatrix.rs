//! Client for the MindMatrix `/mm/v1` API.

use crate::error::{ClientError, Result};
use crate::http::{HttpClient, HttpResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:9527";

/// Whether a request targets an agent or a workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatKind {
    #[default]
    Agent,
    Workflow,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Agent => "agent",
            ChatKind::Workflow => "workflow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Arguments for [`MindMatrixClient::chat_completion`].
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub stream: bool,
    pub kind: ChatKind,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            session_id: None,
            user_id: None,
            stream: false,
            kind: ChatKind::Agent,
        }
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn kind(mut self, kind: ChatKind) -> Self {
        self.kind = kind;
        self
    }

    /// Request path: the named-event stream endpoint when streaming,
    /// the OpenAI-compatible endpoint otherwise.
    pub fn path(&self) -> String {
        if self.stream {
            format!("/mm/v1/sse/{}/chat/completions", self.kind.as_str())
        } else {
            format!("/mm/v1/{}/chat/completions", self.kind.as_str())
        }
    }

    /// JSON body; a fresh session id is generated when none was given.
    pub fn payload(&self) -> Value {
        let session_id = self
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut payload = json!({
            "model": self.model,
            "messages": self.messages,
            "session_id": session_id,
            "stream": self.stream,
        });
        if let Some(user_id) = &self.user_id {
            payload["user_id"] = Value::String(user_id.clone());
        }
        payload
    }
}

#[derive(Clone)]
pub struct MindMatrixClient {
    http: HttpClient,
}

impl Default for MindMatrixClient {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

impl MindMatrixClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(Some(base_url.into())),
        }
    }

    /// Authenticate with `Authorization: Bearer <token>`.
    pub fn with_bearer_token(mut self, token: &str) -> Self {
        self.http = self.http.with_header("Authorization", &format!("Bearer {}", token));
        self
    }

    /// Authenticate with the `api-key` header.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.http = self.http.with_header("api-key", key);
        self
    }

    /// Streaming requests return the raw `text/event-stream` body as a JSON
    /// string; non-streaming requests return the completion object.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<Value> {
        let result = self
            .http
            .post_json(&request.path(), &request.payload())
            .await;
        tracing::debug!(status = ?result.status, stream = request.stream, "chat completion");
        into_data(result, "chat completion")
    }

    pub async fn get_memories(&self, user_id: &str) -> Result<Vec<Value>> {
        let result = self
            .http
            .get(&format!("/mm/v1/memory/{}/memories", user_id), &[])
            .await;
        match into_data(result, "get memories")? {
            Value::Array(items) => Ok(items),
            other => Err(ClientError::Decode(other.to_string())),
        }
    }

    pub async fn add_memory(
        &self,
        user_id: &str,
        memory: &str,
        topics: &[String],
    ) -> Result<Value> {
        let body = json!({ "memory": memory, "topics": topics });
        let result = self
            .http
            .post_json(&format!("/mm/v1/memory/{}/memories", user_id), &body)
            .await;
        into_data(result, "add memory")
    }

    pub async fn delete_memory(&self, user_id: &str, memory_id: &str) -> Result<Value> {
        let result = self
            .http
            .delete(&format!("/mm/v1/memory/{}/memories/{}", user_id, memory_id))
            .await;
        into_data(result, "delete memory")
    }
}

fn into_data(result: HttpResult, operation: &'static str) -> Result<Value> {
    if !result.is_ok() {
        return Err(ClientError::Api {
            operation,
            status: result.status,
            message: result.error_message(),
        });
    }
    Ok(result.data.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_by_kind_and_stream() {
        let request = ChatRequest::new("chatter", vec![Message::user("hi")]);
        assert_eq!(request.path(), "/mm/v1/agent/chat/completions");

        let request = request.kind(ChatKind::Workflow).stream(true);
        assert_eq!(request.path(), "/mm/v1/sse/workflow/chat/completions");
    }

    #[test]
    fn test_payload_generates_session_id() {
        let payload = ChatRequest::new("chatter", vec![Message::user("hi")]).payload();
        assert!(payload["session_id"].as_str().is_some_and(|s| !s.is_empty()));
        assert!(payload.get("user_id").is_none());

        let payload = ChatRequest::new("chatter", vec![])
            .session_id("s-1")
            .user_id("u-1")
            .payload();
        assert_eq!(payload["session_id"], "s-1");
        assert_eq!(payload["user_id"], "u-1");
    }
}
