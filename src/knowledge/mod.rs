//! Knowledge collaborators.
//!
//! Vector storage and embedding are provided by external services. This
//! module only fixes the interfaces the rest of the crate calls, plus the
//! helper that renders retrieved documents into agent prompts.
//! [`retrieval`] adds similarity filtering and reranking on top.

pub mod retrieval;

use crate::types::{AppError, Document, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A vector database handle, addressed by collection.
#[async_trait]
pub trait VectorDb: Send + Sync {
    async fn insert(&self, collection: &str, documents: &[Document]) -> Result<()>;

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()>;

    async fn search(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<Document>>;

    /// Nearest neighbours of a precomputed embedding, with their similarity.
    async fn search_by_vector(
        &self,
        collection: &str,
        _embedding: &[f32],
        _limit: usize,
    ) -> Result<Vec<ScoredDocument>> {
        Err(AppError::VectorDb(format!(
            "vector search is not supported for collection '{}'",
            collection
        )))
    }
}

/// A search hit. `similarity` follows the database metric (cosine by default),
/// higher meaning closer.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub similarity: f32,
}

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

/// How retrieved documents are rendered into a prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencesFormat {
    #[default]
    Json,
    Yaml,
}

/// Render documents as a JSON array or a YAML sequence of
/// `{name, content, meta_data}` entries.
pub fn convert_documents_to_string(
    documents: &[Document],
    format: ReferencesFormat,
) -> Result<String> {
    if documents.is_empty() {
        return Ok(String::new());
    }

    let entries: Vec<serde_json::Value> = documents
        .iter()
        .map(|doc| {
            serde_json::json!({
                "name": doc.name,
                "content": doc.content,
                "meta_data": doc.meta_data,
            })
        })
        .collect();

    match format {
        ReferencesFormat::Json => serde_json::to_string_pretty(&entries)
            .map_err(|e| AppError::Internal(format!("Failed to render references: {}", e))),
        ReferencesFormat::Yaml => serde_yaml::to_string(&entries)
            .map_err(|e| AppError::Internal(format!("Failed to render references: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Document> {
        let mut doc = Document::new("Rust has no garbage collector.");
        doc.name = Some("rust-faq".into());
        vec![doc]
    }

    #[test]
    fn test_json_references() {
        let rendered = convert_documents_to_string(&docs(), ReferencesFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed[0]["name"], "rust-faq");
    }

    #[test]
    fn test_yaml_references() {
        let rendered = convert_documents_to_string(&docs(), ReferencesFormat::Yaml).unwrap();
        assert!(rendered.contains("name: rust-faq"));
        assert!(rendered.contains("content: Rust has no garbage collector."));
    }

    #[test]
    fn test_no_documents_renders_nothing() {
        assert_eq!(
            convert_documents_to_string(&[], ReferencesFormat::Yaml).unwrap(),
            ""
        );
    }
}
