//! In-crate fakes shared by unit tests.

use crate::knowledge::VectorDb;
use crate::llm::{LLMClient, TextStream};
use crate::types::{Document, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Replies with `echo: <last message>` unless a fixed reply is set.
#[derive(Default)]
pub struct EchoLLM {
    reply: Option<String>,
}

impl EchoLLM {
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
        }
    }

    fn answer(&self, messages: &[(String, String)]) -> String {
        match &self.reply {
            Some(reply) => reply.clone(),
            None => {
                let last = messages.last().map(|(_, c)| c.as_str()).unwrap_or_default();
                format!("echo: {}", last)
            }
        }
    }
}

#[async_trait]
impl LLMClient for EchoLLM {
    async fn generate_with_history(&self, messages: &[(String, String)]) -> Result<String> {
        Ok(self.answer(messages))
    }

    async fn stream_with_history(&self, messages: &[(String, String)]) -> Result<TextStream> {
        let answer = self.answer(messages);
        let chunks: Vec<Result<String>> = answer
            .split_inclusive(' ')
            .map(|part| Ok(part.to_string()))
            .collect();
        Ok(Box::new(futures::stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Vector database returning fixed documents and recording upsert batches.
#[derive(Default)]
pub struct StaticVectorDb {
    documents: Vec<Document>,
    pub upserts: Mutex<Vec<(String, usize)>>,
}

impl StaticVectorDb {
    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents,
            upserts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorDb for StaticVectorDb {
    async fn insert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        self.upsert(collection, documents).await
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        self.upserts
            .lock()
            .push((collection.to_string(), documents.len()));
        Ok(())
    }

    async fn search(&self, _collection: &str, _query: &str, limit: usize) -> Result<Vec<Document>> {
        Ok(self.documents.iter().take(limit).cloned().collect())
    }
}
