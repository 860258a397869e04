//! OpenAI-compatible chat completion endpoints.

use crate::{
    context,
    providers::{AgentProvider, Handler, HandlerKind},
    registry::FactoryConfig,
    types::{
        AppError, ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse,
        ChatMessage, DeltaMessage, Result, RunEvent,
    },
    AppState,
};
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use serde_json::Value;
use std::convert::Infallible;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Buffered frames between a streaming run and the HTTP body.
pub(crate) const STREAM_BUFFER: usize = 32;

/// Chat with a registered agent
#[utoipa::path(
    post,
    path = "/mm/v1/agent/chat/completions",
    request_body = ChatCompletionRequest,
    responses(
        (
            status = 200,
            description = "Chat completion, or an event stream when `stream` is true",
            body = ChatCompletionResponse
        ),
        (status = 400, description = "No user message"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown agent")
    ),
    tag = "chat",
    security(("api_key" = []), ("bearer" = []))
)]
pub async fn agent_chat_completions(
    State(state): State<AppState>,
    Json(payload): Json<ChatCompletionRequest>,
) -> Result<Response> {
    chat_completions(state, HandlerKind::Agent, payload).await
}

/// Chat with a registered workflow
#[utoipa::path(
    post,
    path = "/mm/v1/workflow/chat/completions",
    request_body = ChatCompletionRequest,
    responses(
        (
            status = 200,
            description = "Chat completion, or an event stream when `stream` is true",
            body = ChatCompletionResponse
        ),
        (status = 400, description = "No user message"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown workflow")
    ),
    tag = "chat",
    security(("api_key" = []), ("bearer" = []))
)]
pub async fn workflow_chat_completions(
    State(state): State<AppState>,
    Json(payload): Json<ChatCompletionRequest>,
) -> Result<Response> {
    chat_completions(state, HandlerKind::Workflow, payload).await
}

async fn chat_completions(
    state: AppState,
    kind: HandlerKind,
    payload: ChatCompletionRequest,
) -> Result<Response> {
    let message = extract_user_message(&payload.messages)?.to_string();
    let (handler, session_id) = resolve_handler(&state, kind, &payload)?;

    tracing::debug!(
        kind = %kind,
        model = %payload.model,
        session_id = %session_id,
        stream = payload.stream,
        "chat completion"
    );

    if payload.stream {
        return Ok(stream_completion(handler, payload.model, message).into_response());
    }

    let run = handler.run(&message).await?;
    let response = ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: payload.model,
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: Some(ChatMessage::assistant(run.content)),
            delta: None,
            finish_reason: Some("stop".to_string()),
        }],
        usage: None,
    };
    Ok(Json(response).into_response())
}

/// Resolves the handler for a request and records the session (and, for
/// workflows, the workflow handle) in the request context.
pub(crate) fn resolve_handler(
    state: &AppState,
    kind: HandlerKind,
    payload: &ChatCompletionRequest,
) -> Result<(Handler, String)> {
    let session_id = payload
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    context::set_current_session_id(Some(session_id.clone()))?;

    let mut overrides = FactoryConfig::new();
    overrides.insert("session_id".to_string(), Value::String(session_id.clone()));
    if let Some(user_id) = &payload.user_id {
        overrides.insert("user_id".to_string(), Value::String(user_id.clone()));
    }

    let provider = AgentProvider::new(state.mindmatrix.clone());
    let handler = provider.provide_kind(&payload.model, kind, &overrides)?;
    if let Handler::Workflow(workflow) = &handler {
        state.mindmatrix.set_current_workflow(workflow.clone())?;
    }
    Ok((handler, session_id))
}

/// The last `user` message of a conversation.
pub(crate) fn extract_user_message(messages: &[ChatMessage]) -> Result<&str> {
    if messages.is_empty() {
        return Err(AppError::InvalidInput("No messages provided".to_string()));
    }
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .ok_or_else(|| AppError::InvalidInput("No user message found".to_string()))
}

fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

fn chunk(id: &str, created: i64, model: &str, delta: DeltaMessage, finish: Option<&str>) -> Event {
    let frame = ChatCompletionResponse {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: model.to_string(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: None,
            delta: Some(delta),
            finish_reason: finish.map(str::to_string),
        }],
        usage: None,
    };
    match Event::default().json_data(&frame) {
        Ok(event) => event,
        Err(e) => Event::default().data(format!("{{\"error\":\"{}\"}}", e)),
    }
}

/// Streams `chat.completion.chunk` frames terminated by `data: [DONE]`.
///
/// The run executes in a scoped child task so it keeps the request's
/// context after the handler returns.
fn stream_completion(
    handler: Handler,
    model: String,
    message: String,
) -> Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<Event>(STREAM_BUFFER);

    context::spawn_scoped(async move {
        let id = completion_id();
        let created = chrono::Utc::now().timestamp();
        let role = DeltaMessage {
            role: Some("assistant".to_string()),
            content: None,
        };
        if tx.send(chunk(&id, created, &model, role, None)).await.is_err() {
            return;
        }

        let failure = match handler.run_stream(&message).await {
            Ok(mut events) => loop {
                match events.next().await {
                    Some(Ok(event)) => {
                        let text = match event {
                            RunEvent::Content { content, .. } => content,
                            RunEvent::StepCompleted { .. } => continue,
                        };
                        if text.is_empty() {
                            continue;
                        }
                        if tx.is_closed() {
                            tracing::warn!(model = %model, "client disconnected, stopping stream");
                            return;
                        }
                        let delta = DeltaMessage {
                            role: None,
                            content: Some(text),
                        };
                        if tx.send(chunk(&id, created, &model, delta, None)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => break Some(e),
                    None => break None,
                }
            },
            Err(e) => Some(e),
        };

        let last = match failure {
            None => chunk(&id, created, &model, DeltaMessage::default(), Some("stop")),
            Some(e) => {
                tracing::error!(model = %model, error = %e, "chat stream failed");
                let delta = DeltaMessage {
                    role: None,
                    content: Some(format!("Error: {}", e)),
                };
                chunk(&id, created, &model, delta, Some("error"))
            }
        };
        if tx.send(last).await.is_ok() {
            let _ = tx.send(Event::default().data("[DONE]")).await;
        }
    });

    let body = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(event);
        }
    };
    Sse::new(body).keep_alive(KeepAlive::new())
}
