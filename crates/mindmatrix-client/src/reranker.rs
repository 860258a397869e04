//! Client for OpenAI-style `/rerank` and `/score` endpoints.

use crate::error::{ClientError, Result};
use crate::http::{HttpClient, HttpResult};
use serde_json::{json, Value};

pub const DEFAULT_RERANKER_URL: &str = "https://api.siliconflow.cn/v1";

const JUDGE_PREFIX: &str = "<|im_start|>system\nJudge whether the Document meets the requirements based on the Query and the Instruct provided. Note that the answer can only be \"yes\" or \"no\".<|im_end|>\n<|im_start|>user\n";
const JUDGE_SUFFIX: &str = "<|im_end|>\n<|im_start|>assistant\n<think>\n\n</think>\n\n";

#[derive(Clone)]
pub struct RerankerClient {
    http: HttpClient,
    model: Option<String>,
}

impl RerankerClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(DEFAULT_RERANKER_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: &str) -> Self {
        Self {
            http: HttpClient::new(Some(base_url.into()))
                .with_header("Authorization", &format!("Bearer {}", api_key)),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Rerank `documents` against `query`; returns the service's `results`.
    pub async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<Value>> {
        let body = json!({
            "model": self.model,
            "query": query,
            "documents": documents,
        });
        let result = self.http.post_json("/rerank", &body).await;
        tracing::debug!(status = ?result.status, "rerank");
        extract_list(result, "rerank documents", "results")
    }

    /// Yes/no relevance scoring with a judge prompt wrapped around every
    /// query and document; returns the service's `data` list.
    pub async fn score(
        &self,
        instruction: &str,
        queries: &[String],
        documents: &[String],
    ) -> Result<Vec<Value>> {
        let (text_1, text_2) = judge_prompts(instruction, queries, documents);
        let body = json!({
            "model": self.model,
            "text_1": text_1,
            "text_2": text_2,
            "truncate_prompt_tokens": -1,
        });
        let result = self.http.post_json("/score", &body).await;
        tracing::debug!(status = ?result.status, "score");
        extract_list(result, "score documents", "data")
    }
}

/// Wrap queries and documents in the judge template.
pub fn judge_prompts(
    instruction: &str,
    queries: &[String],
    documents: &[String],
) -> (Vec<String>, Vec<String>) {
    let queries = queries
        .iter()
        .map(|q| format!("{}<Instruct>: {}\n<Query>: {}\n", JUDGE_PREFIX, instruction, q))
        .collect();
    let documents = documents
        .iter()
        .map(|d| format!("<Document>: {}{}", d, JUDGE_SUFFIX))
        .collect();
    (queries, documents)
}

fn extract_list(result: HttpResult, operation: &'static str, field: &str) -> Result<Vec<Value>> {
    if !result.is_ok() {
        return Err(ClientError::Reranker {
            operation,
            status: result.status,
            message: result.error_message(),
        });
    }
    match result.data.as_ref().and_then(|d| d.get(field)) {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Err(ClientError::Decode(format!(
            "missing '{}' in {} response",
            field, operation
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judge_prompts_wrap_every_item() {
        let (queries, documents) = judge_prompts(
            "Find fruit",
            &["apple".to_string()],
            &["banana".to_string(), "car".to_string()],
        );
        assert_eq!(queries.len(), 1);
        assert!(queries[0].starts_with("<|im_start|>system\nJudge"));
        assert!(queries[0].ends_with("<Instruct>: Find fruit\n<Query>: apple\n"));
        assert_eq!(documents.len(), 2);
        assert!(documents[1].starts_with("<Document>: car<|im_end|>"));
        assert!(documents[1].ends_with("</think>\n\n"));
    }
}
