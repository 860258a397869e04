//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use mindmatrix::llm::{LLMClient, TextStream};
use mindmatrix::types::{AppError, Result};
use mindmatrix::{
    Agent, BaseAgent, ConfigManager, InMemoryMemoryStore, MindMatrix, MindMatrixBuilder,
    MindMatrixConfig,
};
use std::sync::Arc;

/// Model stub with a fixed reply, streamed word by word.
pub struct MockLLM {
    reply: String,
    fail_stream_after: Option<usize>,
}

impl MockLLM {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_stream_after: None,
        }
    }

    /// Streams `words` chunks, then an upstream error.
    pub fn failing_stream_after(reply: &str, words: usize) -> Self {
        Self {
            reply: reply.to_string(),
            fail_stream_after: Some(words),
        }
    }
}

#[async_trait]
impl LLMClient for MockLLM {
    async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
        Ok(self.reply.clone())
    }

    async fn stream_with_history(&self, _messages: &[(String, String)]) -> Result<TextStream> {
        let mut chunks: Vec<Result<String>> = self
            .reply
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        if let Some(n) = self.fail_stream_after {
            chunks.truncate(n);
            chunks.push(Err(AppError::LLM("upstream connection reset".to_string())));
        }
        Ok(Box::new(futures::stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Config whose auth secrets live in env vars prefixed with `env_prefix`, so
/// parallel tests never share keys.
pub fn test_config(env_prefix: &str) -> MindMatrixConfig {
    let mut config = MindMatrixConfig::default();
    config.auth.api_keys_env = format!("{}_API_KEYS", env_prefix);
    config.auth.jwt_secret_env = format!("{}_JWT_SECRET", env_prefix);
    config
}

pub fn builder(llm: MockLLM, config: MindMatrixConfig) -> MindMatrixBuilder {
    MindMatrix::builder()
        .llm(Arc::new(llm))
        .memory(Arc::new(InMemoryMemoryStore::new()))
        .config(Arc::new(ConfigManager::from_config(config)))
}

pub fn register_chatter(mindmatrix: &mut MindMatrix) {
    mindmatrix.register_agent_factory(
        "chatter",
        |mm, cfg| Ok(Arc::new(BaseAgent::from_mindmatrix(mm, cfg)?) as Arc<dyn Agent>),
        None,
    );
}

pub fn serve(mindmatrix: MindMatrix) -> TestServer {
    TestServer::new(Arc::new(mindmatrix).app()).expect("Failed to create test server")
}

/// A server with a `chatter` agent replying "hello world".
pub fn chatter_server(env_prefix: &str) -> TestServer {
    let mut mindmatrix = builder(MockLLM::new("hello world"), test_config(env_prefix)).build();
    register_chatter(&mut mindmatrix);
    serve(mindmatrix)
}
