//! Annotated retrieval: embed a query, search by vector, drop weak hits and
//! optionally rerank the rest with a yes/no judge model.

use std::cmp::Ordering;
use std::sync::Arc;

use mindmatrix_client::RerankerClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::knowledge::{Embedder, ScoredDocument, VectorDb};
use crate::types::{AppError, Document, Result};

/// Task description prepended to the query before embedding.
pub const DEFAULT_RETRIEVAL_INSTRUCTION: &str =
    "Given the user's instruction, retrieve the agents able to complete it.";

/// Search settings for [`AnnotatedRetriever`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub collection: String,
    /// Hits below this similarity are discarded
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_instruction")]
    pub instruction: String,
}

fn default_limit() -> usize {
    5
}

fn default_instruction() -> String {
    DEFAULT_RETRIEVAL_INSTRUCTION.to_string()
}

impl RetrievalConfig {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            similarity_threshold: None,
            limit: default_limit(),
            instruction: default_instruction(),
        }
    }
}

/// A retrieved document with its vector similarity and, when reranked, the
/// judge score.
#[derive(Debug, Clone)]
pub struct AnnotatedDocument {
    pub document: Document,
    pub similarity: f32,
    pub rerank_score: Option<f64>,
}

pub struct AnnotatedRetriever {
    embedder: Arc<dyn Embedder>,
    vectordb: Arc<dyn VectorDb>,
    reranker: Option<RerankerClient>,
    config: RetrievalConfig,
}

impl AnnotatedRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectordb: Arc<dyn VectorDb>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vectordb,
            reranker: None,
            config,
        }
    }

    pub fn with_reranker(mut self, reranker: RerankerClient) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Retrieve documents for `query`, best first.
    ///
    /// `background` (age, occupation, interests, ...) is folded into the
    /// rerank instruction when present. Reranking runs only with a reranker
    /// configured and more than one hit.
    pub async fn annotated_response(
        &self,
        query: &str,
        background: Option<&str>,
    ) -> Result<Vec<AnnotatedDocument>> {
        let hits = self.retrieve(query).await?;

        let reranker = match &self.reranker {
            Some(reranker) if hits.len() > 1 => reranker,
            _ => return Ok(hits.into_iter().map(unranked).collect()),
        };

        let instruction = match background.filter(|b| !b.trim().is_empty()) {
            Some(background) => format!(
                "{}. Using the background above (age, occupation, interests and so on) \
                 together with the user's query, retrieve the matching agents.",
                background
            ),
            None => self.config.instruction.clone(),
        };

        let documents: Vec<String> = hits.iter().map(|h| h.document.content.clone()).collect();
        let queries = vec![query.to_string(); documents.len()];
        let scores = reranker.score(&instruction, &queries, &documents).await?;

        let ranked = rank_by_score(&scores, hits)?;
        tracing::debug!(count = ranked.len(), "reranked documents");
        Ok(ranked)
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredDocument>> {
        let prompt = format!("Instruct: {}\nQuery:{}", self.config.instruction, query);
        tracing::info!(collection = %self.config.collection, "embedding retrieval query");

        let embedding = self
            .embedder
            .embed(&[prompt])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("embedder returned no vectors".to_string()))?;

        let hits = self
            .vectordb
            .search_by_vector(&self.config.collection, &embedding, self.config.limit)
            .await?;
        let found = hits.len();

        let hits: Vec<ScoredDocument> = match self.config.similarity_threshold {
            Some(threshold) => hits
                .into_iter()
                .filter(|hit| hit.similarity >= threshold)
                .collect(),
            None => hits,
        };
        tracing::info!(found, kept = hits.len(), "vector search finished");
        Ok(hits)
    }
}

fn unranked(hit: ScoredDocument) -> AnnotatedDocument {
    AnnotatedDocument {
        document: hit.document,
        similarity: hit.similarity,
        rerank_score: None,
    }
}

/// Order hits by the judge's `{index, score}` entries, highest score first.
fn rank_by_score(scores: &[Value], hits: Vec<ScoredDocument>) -> Result<Vec<AnnotatedDocument>> {
    let mut indexed: Vec<(usize, f64)> = scores
        .iter()
        .map(|entry| -> Result<(usize, f64)> {
            let index = entry
                .get("index")
                .and_then(Value::as_u64)
                .map(|i| i as usize)
                .filter(|i| *i < hits.len())
                .ok_or_else(|| AppError::Reranker(format!("bad score entry: {}", entry)))?;
            let score = entry.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            Ok((index, score))
        })
        .collect::<Result<_>>()?;
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    Ok(indexed
        .into_iter()
        .map(|(index, score)| AnnotatedDocument {
            document: hits[index].document.clone(),
            similarity: hits[index].similarity,
            rerank_score: Some(score),
        })
        .collect())
}
