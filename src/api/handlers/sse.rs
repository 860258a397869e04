use crate::{
    api::handlers::chat::{extract_user_message, resolve_handler, STREAM_BUFFER},
    context,
    providers::HandlerKind,
    types::{ChatCompletionRequest, Result, RunEvent},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Stream a run as named server-sent events
///
/// Emits `stream` events carrying `{"delta": ...}`, `artifact` events
/// carrying artifact JSON (in place of the delta of the same run event), and
/// a single `error` event if the run fails after the stream has started.
#[utoipa::path(
    post,
    path = "/mm/v1/sse/{kind}/chat/completions",
    params(("kind" = String, Path, description = "`agent` or `workflow`")),
    request_body = ChatCompletionRequest,
    responses(
        (status = 200, description = "text/event-stream of run events"),
        (status = 400, description = "Bad kind or no user message"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown agent or workflow")
    ),
    tag = "chat",
    security(("api_key" = []), ("bearer" = []))
)]
pub async fn sse_chat_completions(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(payload): Json<ChatCompletionRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let kind: HandlerKind = kind.parse()?;
    let message = extract_user_message(&payload.messages)?.to_string();
    let (handler, session_id) = resolve_handler(&state, kind, &payload)?;
    tracing::debug!(kind = %kind, model = %payload.model, session_id = %session_id, "sse run");

    let (tx, mut rx) = mpsc::channel::<Event>(STREAM_BUFFER);
    let name = payload.model;

    context::spawn_scoped(async move {
        let mut events = match handler.run_stream(&message).await {
            Ok(events) => events,
            Err(e) => {
                let _ = tx.send(error_event(&e.to_string())).await;
                return;
            }
        };

        while let Some(item) = events.next().await {
            let frames = match item {
                Ok(event) => run_event_frames(event),
                Err(e) => {
                    tracing::error!(model = %name, error = %e, "sse run failed");
                    let _ = tx.send(error_event(&e.to_string())).await;
                    return;
                }
            };
            for frame in frames {
                if tx.is_closed() {
                    tracing::warn!(model = %name, "client disconnected, stopping stream");
                    return;
                }
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
        }
    });

    let body = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(event);
        }
    };
    Ok(Sse::new(body).keep_alive(KeepAlive::new()))
}

/// Wire frames for one run event: one `artifact` frame per artifact when the
/// event carries any, otherwise a `stream` delta when there is text.
fn run_event_frames(event: RunEvent) -> Vec<Event> {
    let RunEvent::Content { content, artifacts } = event else {
        return Vec::new();
    };

    if !artifacts.is_empty() {
        return artifacts
            .iter()
            .filter_map(|artifact| match serde_json::to_string(artifact) {
                Ok(data) => Some(Event::default().event("artifact").data(data)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unserializable artifact");
                    None
                }
            })
            .collect();
    }

    if content.is_empty() {
        return Vec::new();
    }
    vec![Event::default()
        .event("stream")
        .data(json!({ "delta": content }).to_string())]
}

fn error_event(message: &str) -> Event {
    Event::default()
        .event("error")
        .data(json!({ "error": message }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Artifact;

    #[test]
    fn test_artifacts_replace_the_text_delta() {
        let event = RunEvent::Content {
            content: "hello".to_string(),
            artifacts: vec![Artifact::new("image"), Artifact::new("table")],
        };
        assert_eq!(run_event_frames(event).len(), 2);
    }

    #[test]
    fn test_plain_text_is_one_stream_frame() {
        assert_eq!(run_event_frames(RunEvent::content("hello")).len(), 1);
    }

    #[test]
    fn test_empty_delta_and_step_markers_are_skipped() {
        assert!(run_event_frames(RunEvent::content("")).is_empty());
        let step = RunEvent::StepCompleted {
            step: "draft".to_string(),
            content: "text".to_string(),
        };
        assert!(run_event_frames(step).is_empty());
    }
}
