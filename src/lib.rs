//! # MindMatrix
//!
//! A registration-and-dispatch server for LLM agents and workflows.
//!
//! Agents, workflows, vector databases and tasks are registered by name on a
//! [`MindMatrix`], then served over an OpenAI-compatible HTTP API with
//! server-sent event streaming and per-user memory endpoints.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mindmatrix::{BaseAgent, MindMatrix, OpenAIClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> mindmatrix::Result<()> {
//!     let llm = Arc::new(OpenAIClient::new(key, "https://api.openai.com/v1", "gpt-4o-mini"));
//!     let mut mm = MindMatrix::builder().llm(llm).build();
//!     mm.register_agent_factory("chatter", |mm, cfg| {
//!         Ok(Arc::new(BaseAgent::from_mindmatrix(mm, cfg)?) as _)
//!     }, None);
//!
//!     Arc::new(mm).start_web_server("127.0.0.1", 9527).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`mindmatrix`] - The orchestrator and its builder
//! - [`registry`] - Named, first-match-wins registries
//! - [`providers`] - Agent, vector database and memory accessors
//! - [`context`] - Per-request session, auth token and workflow slots
//! - [`agents`] / [`workflows`] - Runnable units and their base implementations
//! - [`memory`] - User memory storage and LLM-driven capture
//! - [`knowledge`] - Vector database and embedder seams
//! - [`tasks`] - Background tasks with declared dependencies
//! - [`api`] / [`auth`] - HTTP surface
//! - [`types`] - Wire types and errors

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Agents and the prompt-building base agent.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// API key and bearer token authentication.
pub mod auth;
/// Command-line interface for the server binary.
pub mod cli;
/// Request-scoped context slots.
pub mod context;
/// Vector database and embedding abstractions.
pub mod knowledge;
/// LLM client implementations.
pub mod llm;
/// User memory storage and capture.
pub mod memory;
/// The orchestrator.
pub mod mindmatrix;
/// Dispatch accessors for routes and tasks.
pub mod providers;
/// Named registries.
pub mod registry;
/// Background tasks.
pub mod tasks;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration and dataset utilities.
pub mod utils;
/// Step-based workflows.
pub mod workflows;

#[cfg(test)]
mod test_support;

/// HTTP clients for MindMatrix servers and rerankers.
pub use mindmatrix_client as client;

pub use agents::{Agent, BaseAgent, BaseAgentConfig};
pub use knowledge::retrieval::{AnnotatedDocument, AnnotatedRetriever, RetrievalConfig};
pub use knowledge::{Embedder, ScoredDocument, VectorDb};
pub use llm::{LLMClient, TextStream};
#[cfg(feature = "openai")]
pub use llm::OpenAIClient;
pub use memory::{InMemoryMemoryStore, MemoryManager, MemoryStore};
pub use mindmatrix::{MindMatrix, MindMatrixBuilder, Plugin};
pub use providers::{AgentProvider, Handler, HandlerKind, MemoryProvider, VectorDbProvider};
pub use registry::{FactoryConfig, RegistryError};
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, MindMatrixConfig};
pub use workflows::{BaseWorkflow, SessionState, Step, StepOutput, Workflow};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The frozen orchestrator
    pub mindmatrix: Arc<MindMatrix>,
    /// Live configuration, read per request by the auth layer
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    pub fn new(mindmatrix: Arc<MindMatrix>) -> Self {
        let config_manager = mindmatrix.config_manager();
        Self {
            mindmatrix,
            config_manager,
        }
    }
}
