//! The registration-and-dispatch object.
//!
//! A [`MindMatrix`] is assembled with [`MindMatrixBuilder`], populated through
//! `&mut` registration calls during startup, then frozen behind an `Arc` and
//! shared with the web layer and tasks. Nothing is registered or removed after
//! that point, so lookups need no locking.
//!
//! ```ignore
//! let mut mm = MindMatrixBuilder::new().llm(llm).memory(memory).build();
//! mm.register_agent_factory("chatter", |mm, cfg| {
//!     Ok(Arc::new(BaseAgent::from_mindmatrix(mm, cfg)?) as Arc<dyn Agent>)
//! }, None);
//!
//! let mm = Arc::new(mm);
//! mm.start_web_server("127.0.0.1", 9527).await?;
//! ```

use crate::agents::Agent;
use crate::api::routes::create_router;
use crate::context::{self, ContextError};
use crate::knowledge::{Embedder, VectorDb};
use crate::llm::LLMClient;
use crate::memory::{MemoryManager, MemoryStore};
use crate::providers::{AgentProvider, VectorDbProvider};
use crate::registry::{
    merge_config, AgentFactory, Domain, FactoryConfig, Registry, WorkflowFactory,
};
use crate::tasks::{EmbedDocuments, Task, TaskContext};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{ConfigManager, MindMatrixConfig};
use crate::workflows::Workflow;
use crate::AppState;
use axum::Router;
use serde_json::Value;
use std::sync::Arc;

/// Default address used by [`MindMatrix::start_web_server`] callers.
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9527;

/// A bundle of registrations applied by [`MindMatrix::enable_plugins`].
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, mindmatrix: &mut MindMatrix) -> Result<()>;
}

pub struct MindMatrix {
    llm: Option<Arc<dyn LLMClient>>,
    memory: Option<Arc<dyn MemoryStore>>,
    memory_manager: Option<Arc<MemoryManager>>,
    embedder: Option<Arc<dyn Embedder>>,
    config: Arc<ConfigManager>,

    agents: Registry<AgentFactory>,
    workflows: Registry<WorkflowFactory>,
    vectordbs: Registry<Arc<dyn VectorDb>>,
    tasks: Registry<Arc<dyn Task>>,

    plugins: Vec<Box<dyn Plugin>>,
    builtins_enabled: bool,
    plugins_enabled: bool,
}

pub struct MindMatrixBuilder {
    llm: Option<Arc<dyn LLMClient>>,
    memory: Option<Arc<dyn MemoryStore>>,
    memory_manager: Option<Arc<MemoryManager>>,
    embedder: Option<Arc<dyn Embedder>>,
    vectordb: Option<(String, Arc<dyn VectorDb>)>,
    config: Option<Arc<ConfigManager>>,
    plugins: Vec<Box<dyn Plugin>>,
    enable_builtins: bool,
    enable_plugins: bool,
}

impl Default for MindMatrixBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MindMatrixBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            memory: None,
            memory_manager: None,
            embedder: None,
            vectordb: None,
            config: None,
            plugins: Vec::new(),
            enable_builtins: true,
            enable_plugins: false,
        }
    }

    pub fn llm(mut self, llm: Arc<dyn LLMClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Override the memory manager. By default one is built from the LLM
    /// client when both an LLM and a memory store are set.
    pub fn memory_manager(mut self, manager: Arc<MemoryManager>) -> Self {
        self.memory_manager = Some(manager);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Register a vector database at build time.
    pub fn vectordb(mut self, name: impl Into<String>, vectordb: Arc<dyn VectorDb>) -> Self {
        self.vectordb = Some((name.into(), vectordb));
        self
    }

    pub fn config(mut self, config: Arc<ConfigManager>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn enable_builtins(mut self, enabled: bool) -> Self {
        self.enable_builtins = enabled;
        self
    }

    pub fn enable_plugins(mut self, enabled: bool) -> Self {
        self.enable_plugins = enabled;
        self
    }

    pub fn build(self) -> MindMatrix {
        let memory_manager = self.memory_manager.or_else(|| match (&self.llm, &self.memory) {
            (Some(llm), Some(_)) => Some(Arc::new(MemoryManager::new(llm.clone()))),
            _ => None,
        });

        let mut mindmatrix = MindMatrix {
            llm: self.llm,
            memory: self.memory,
            memory_manager,
            embedder: self.embedder,
            config: self.config.unwrap_or_else(|| {
                Arc::new(ConfigManager::from_config(MindMatrixConfig::default()))
            }),
            agents: Registry::new(Domain::Agent),
            workflows: Registry::new(Domain::Workflow),
            vectordbs: Registry::new(Domain::VectorDb),
            tasks: Registry::new(Domain::Task),
            plugins: self.plugins,
            builtins_enabled: false,
            plugins_enabled: false,
        };

        if let Some((name, vectordb)) = self.vectordb {
            mindmatrix.register_vectordb(name, vectordb);
        }
        if self.enable_builtins {
            mindmatrix.enable_builtins();
        }
        if self.enable_plugins {
            mindmatrix.enable_plugins();
        }
        mindmatrix
    }
}

impl MindMatrix {
    pub fn builder() -> MindMatrixBuilder {
        MindMatrixBuilder::new()
    }

    // ============= Collaborators =============

    pub fn llm(&self) -> Option<Arc<dyn LLMClient>> {
        self.llm.clone()
    }

    pub fn memory(&self) -> Option<Arc<dyn MemoryStore>> {
        self.memory.clone()
    }

    pub fn memory_manager(&self) -> Option<Arc<MemoryManager>> {
        self.memory_manager.clone()
    }

    pub fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.embedder.clone()
    }

    pub fn config_manager(&self) -> Arc<ConfigManager> {
        self.config.clone()
    }

    // ============= Enablement =============

    /// Register builtin tasks. Idempotent.
    pub fn enable_builtins(&mut self) {
        if self.builtins_enabled {
            tracing::warn!("builtins are already enabled");
            return;
        }
        self.register_task("embed_documents", Arc::new(EmbedDocuments));
        self.builtins_enabled = true;
    }

    /// Apply every plugin passed to the builder. A failing plugin is logged
    /// and skipped. A second call only warns.
    pub fn enable_plugins(&mut self) {
        if self.plugins_enabled {
            tracing::warn!("plugins are already enabled");
            return;
        }

        let plugins = std::mem::take(&mut self.plugins);
        for plugin in &plugins {
            match plugin.register(self) {
                Ok(()) => tracing::info!(plugin = %plugin.name(), "plugin loaded"),
                Err(e) => tracing::error!(
                    plugin = %plugin.name(),
                    error = %e,
                    "failed to load plugin, skipping"
                ),
            }
        }
        self.plugins = plugins;
        self.plugins_enabled = true;
    }

    // ============= Registration =============

    pub fn register_agent_factory<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
        config: Option<FactoryConfig>,
    ) where
        F: Fn(&MindMatrix, &FactoryConfig) -> Result<Arc<dyn Agent>> + Send + Sync + 'static,
    {
        self.agents.register(name, Arc::new(factory), config);
    }

    pub fn register_workflow_factory<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
        config: Option<FactoryConfig>,
    ) where
        F: Fn(&MindMatrix, &FactoryConfig) -> Result<Arc<dyn Workflow>> + Send + Sync + 'static,
    {
        self.workflows.register(name, Arc::new(factory), config);
    }

    pub fn register_vectordb(&mut self, name: impl Into<String>, vectordb: Arc<dyn VectorDb>) {
        self.vectordbs.register(name, vectordb, None);
    }

    pub fn register_task(&mut self, name: impl Into<String>, task: Arc<dyn Task>) {
        self.tasks.register(name, task, None);
    }

    // ============= Lookup =============

    pub fn has_agent(&self, name: &str) -> bool {
        self.agents.has(name)
    }

    pub fn has_workflow(&self, name: &str) -> bool {
        self.workflows.has(name)
    }

    pub fn has_vectordb(&self, name: &str) -> bool {
        self.vectordbs.has(name)
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.has(name)
    }

    /// Build the first agent registered as `name` with its config merged
    /// with `overrides`. The factory always sees a `name` key, defaulting to
    /// the registered name.
    pub fn get_agent(&self, name: &str, overrides: &FactoryConfig) -> Result<Arc<dyn Agent>> {
        let entry = self.agents.find(name)?;
        (entry.binding)(self, &factory_config(name, &entry.config, overrides))
    }

    pub fn get_workflow(&self, name: &str, overrides: &FactoryConfig) -> Result<Arc<dyn Workflow>> {
        let entry = self.workflows.find(name)?;
        (entry.binding)(self, &factory_config(name, &entry.config, overrides))
    }

    pub fn get_vectordb(&self, name: &str) -> Result<Arc<dyn VectorDb>> {
        Ok(self.vectordbs.find(name)?.binding.clone())
    }

    pub fn get_task(&self, name: &str) -> Result<Arc<dyn Task>> {
        Ok(self.tasks.find(name)?.binding.clone())
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.names()
    }

    pub fn workflow_names(&self) -> Vec<&str> {
        self.workflows.names()
    }

    pub fn vectordb_names(&self) -> Vec<&str> {
        self.vectordbs.names()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.names()
    }

    // ============= Tasks =============

    /// Run a registered task, injecting only the accessors it declares.
    pub async fn run_task(self: &Arc<Self>, name: &str, args: Value) -> Result<Value> {
        let task = self.get_task(name)?;
        let deps = task.dependencies();

        let ctx = TaskContext {
            vectordb_provider: deps
                .vectordb_provider
                .then(|| VectorDbProvider::new(Arc::clone(self))),
            agent_provider: deps
                .agent_provider
                .then(|| AgentProvider::new(Arc::clone(self))),
        };

        tracing::debug!(task = %name, "running task");
        task.run(args, ctx).await
    }

    // ============= Request Context =============

    /// The workflow stored for the current request, if any.
    pub fn current_workflow(&self) -> Option<Arc<dyn Workflow>> {
        let workflow = context::current_workflow();
        if workflow.is_none() {
            tracing::warn!("current workflow is not set for this request");
        }
        workflow
    }

    pub fn set_current_workflow(
        &self,
        workflow: Arc<dyn Workflow>,
    ) -> std::result::Result<(), ContextError> {
        context::set_current_workflow(workflow)
    }

    // ============= Web =============

    /// The axum application serving this orchestrator.
    pub fn app(self: &Arc<Self>) -> Router {
        create_router(AppState::new(Arc::clone(self)))
    }

    /// Bind `host:port` and serve [`MindMatrix::app`] until shutdown.
    pub async fn start_web_server(self: &Arc<Self>, host: &str, port: u16) -> Result<()> {
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("MindMatrix listening on http://{}", addr);
        axum::serve(listener, self.app())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {}", e)))
    }
}

fn factory_config(name: &str, base: &FactoryConfig, overrides: &FactoryConfig) -> FactoryConfig {
    let mut config = merge_config(base, overrides);
    config
        .entry("name")
        .or_insert_with(|| Value::String(name.to_string()));
    config
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
