use crate::tasks::{Task, TaskContext, TaskDependencies};
use crate::types::{AppError, Document, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Documents are upserted in chunks of this size.
pub const EMBED_BATCH_SIZE: usize = 100;

/// Builtin task: upsert documents into a registered vector database.
///
/// Arguments: `{"vectordb_name": ..., "collection_name": ..., "documents": [...]}`.
pub struct EmbedDocuments;

#[derive(Deserialize)]
struct EmbedArgs {
    vectordb_name: String,
    collection_name: String,
    #[serde(default)]
    documents: Vec<Document>,
}

#[async_trait]
impl Task for EmbedDocuments {
    fn dependencies(&self) -> TaskDependencies {
        TaskDependencies::VECTORDB_PROVIDER
    }

    async fn run(&self, args: Value, ctx: TaskContext) -> Result<Value> {
        let args: EmbedArgs = serde_json::from_value(args)
            .map_err(|e| AppError::InvalidInput(format!("embed_documents: {}", e)))?;

        tracing::info!(
            vectordb = %args.vectordb_name,
            collection = %args.collection_name,
            documents = args.documents.len(),
            "embedding documents"
        );

        let vectordb = ctx.vectordb_provider()?.get(&args.vectordb_name)?;
        let mut batches = 0;
        for batch in args.documents.chunks(EMBED_BATCH_SIZE) {
            vectordb.upsert(&args.collection_name, batch).await?;
            batches += 1;
        }

        Ok(json!({
            "collection": args.collection_name,
            "documents": args.documents.len(),
            "batches": batches,
        }))
    }
}
