//! OpenAI-compatible chat completion client.
//!
//! Works with any endpoint implementing `POST {api_base}/chat/completions`
//! (OpenAI, DeepSeek, Zhipu, vLLM, ...). Streaming responses are read as
//! server-sent events and decoded line by line.

use crate::llm::client::{LLMClient, TextStream};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireContent>,
    #[serde(default)]
    delta: Option<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [(String, String)],
        stream: bool,
    ) -> WireRequest<'a> {
        WireRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|(role, content)| WireMessage { role, content })
                .collect(),
            stream,
            temperature: self.temperature,
        }
    }

    async fn post(&self, body: &WireRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut request = self.http.post(&url).json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("OpenAI API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!(
                "OpenAI API returned {}: {}",
                status, text
            )));
        }
        Ok(response)
    }
}

/// Extract the delta text from one `data:` line of a streamed completion.
///
/// Returns `None` for keep-alives, the `[DONE]` marker and chunks without
/// content.
pub(crate) fn parse_stream_line(line: &str) -> Option<Result<String>> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<WireResponse>(payload) {
        Ok(chunk) => {
            let text: String = chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.and_then(|delta| delta.content))
                .collect();
            (!text.is_empty()).then_some(Ok(text))
        }
        Err(e) => Some(Err(AppError::LLM(format!("Stream error: {}", e)))),
    }
}

/// Turn a chunked SSE body into delta texts.
///
/// Lines are split on raw bytes and decoded only once complete, so a UTF-8
/// character cut across two network chunks survives intact.
pub(crate) fn decode_event_stream<S, B, E>(
    mut bytes: S,
) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    buffer.extend_from_slice(chunk.as_ref());
                    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        if let Some(item) = parse_stream_line(&String::from_utf8_lossy(&line)) {
                            yield item;
                        }
                    }
                }
                Err(e) => {
                    yield Err(AppError::LLM(format!("Stream error: {}", e)));
                    return;
                }
            }
        }
        if let Some(item) = parse_stream_line(&String::from_utf8_lossy(&buffer)) {
            yield item;
        }
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate_with_history(&self, messages: &[(String, String)]) -> Result<String> {
        let response = self.post(&self.request_body(messages, false)).await?;
        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Invalid OpenAI response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.and_then(|message| message.content))
            .ok_or_else(|| AppError::LLM("No response from OpenAI".to_string()))
    }

    async fn stream_with_history(&self, messages: &[(String, String)]) -> Result<TextStream> {
        let response = self.post(&self.request_body(messages, true)).await?;
        let result_stream = decode_event_stream(response.bytes_stream());
        Ok(Box::new(Box::pin(result_stream)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
