//! Base agent with the standard run lifecycle.
//!
//! 1. build the system prompt from description, goal, instructions, the
//!    user's known memories and any non-empty session state;
//! 2. attach knowledge references when a vector database is configured;
//! 3. call the model;
//! 4. hand the user message to the memory manager in a detached task;
//! 5. return the response.
//!
//! The memory update never blocks the response and its failures are only
//! logged.

use crate::agents::Agent;
use crate::context;
use crate::knowledge::{convert_documents_to_string, ReferencesFormat, VectorDb};
use crate::llm::LLMClient;
use crate::memory::{format_memory_for_prompt, MemoryManager, MemoryStore};
use crate::mindmatrix::MindMatrix;
use crate::registry::FactoryConfig;
use crate::tasks::spawn_supervised;
use crate::types::{AppError, Result, RunEvent, RunEventStream, RunResponse};
use crate::workflows::SessionState;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;

/// Agent settings, read from the merged factory config.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseAgentConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Registered vector database to pull references from
    #[serde(default)]
    pub knowledge_vectordb: Option<String>,
    #[serde(default)]
    pub knowledge_collection: Option<String>,
    #[serde(default = "default_num_references")]
    pub num_references: usize,
    #[serde(default)]
    pub references_format: ReferencesFormat,
    /// Workflow this agent runs inside; its session state is then shared
    #[serde(default)]
    pub workflow: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

fn default_num_references() -> usize {
    5
}

impl BaseAgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            goal: None,
            instructions: Vec::new(),
            session_id: None,
            user_id: None,
            knowledge_vectordb: None,
            knowledge_collection: None,
            num_references: default_num_references(),
            references_format: ReferencesFormat::default(),
            workflow: None,
            debug: false,
        }
    }

    pub fn from_factory_config(config: &FactoryConfig) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(config.clone()))
            .map_err(|e| AppError::InvalidInput(format!("Invalid agent config: {}", e)))
    }
}

pub struct BaseAgent {
    config: BaseAgentConfig,
    llm: Arc<dyn LLMClient>,
    memory: Option<Arc<dyn MemoryStore>>,
    memory_manager: Option<Arc<MemoryManager>>,
    knowledge: Option<Arc<dyn VectorDb>>,
    session_state: SessionState,
}

impl BaseAgent {
    pub fn new(config: BaseAgentConfig, llm: Arc<dyn LLMClient>) -> Self {
        Self {
            config,
            llm,
            memory: None,
            memory_manager: None,
            knowledge: None,
            session_state: SessionState::default(),
        }
    }

    /// Build from a factory invocation, pulling collaborators from the
    /// orchestrator.
    pub fn from_mindmatrix(mindmatrix: &MindMatrix, config: &FactoryConfig) -> Result<Self> {
        let config = BaseAgentConfig::from_factory_config(config)?;
        let llm = mindmatrix
            .llm()
            .ok_or_else(|| AppError::Configuration("No LLM client configured".to_string()))?;

        let knowledge = match &config.knowledge_vectordb {
            Some(name) => Some(mindmatrix.get_vectordb(name)?),
            None => None,
        };

        Ok(Self {
            config,
            llm,
            memory: mindmatrix.memory(),
            memory_manager: mindmatrix.memory_manager(),
            knowledge,
            session_state: SessionState::default(),
        })
    }

    pub fn with_memory(
        mut self,
        memory: Arc<dyn MemoryStore>,
        manager: Option<Arc<MemoryManager>>,
    ) -> Self {
        self.memory = Some(memory);
        self.memory_manager = manager;
        self
    }

    pub fn with_knowledge(mut self, vectordb: Arc<dyn VectorDb>) -> Self {
        self.knowledge = Some(vectordb);
        self
    }

    pub fn config(&self) -> &BaseAgentConfig {
        &self.config
    }

    /// Explicit session id, falling back to the request context.
    pub fn session_id(&self) -> Option<String> {
        self.config
            .session_id
            .clone()
            .or_else(context::current_session_id)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.config.user_id.as_deref()
    }

    /// Session state for this run.
    ///
    /// An agent bound to a workflow reads the state of the workflow stored in
    /// the request context, and fails when none is stored or its name differs.
    pub fn session_state(&self) -> Result<SessionState> {
        let Some(expected) = &self.config.workflow else {
            return Ok(self.session_state.clone());
        };

        let workflow = context::require_current_workflow()?;
        if workflow.name() != expected {
            return Err(AppError::Internal(format!(
                "workflow mismatch: agent '{}' belongs to '{}', current workflow is '{}'",
                self.config.name,
                expected,
                workflow.name()
            )));
        }
        workflow.session_state().ok_or_else(|| {
            AppError::Internal(format!("workflow '{}' keeps no session state", expected))
        })
    }

    /// System prompt for the current user.
    pub async fn system_prompt(&self) -> Result<String> {
        let mut sections = Vec::new();

        if let Some(description) = &self.config.description {
            sections.push(description.clone());
        }
        if let Some(goal) = &self.config.goal {
            sections.push(format!("<your_goal>\n{}\n</your_goal>", goal));
        }
        if !self.config.instructions.is_empty() {
            let lines: Vec<String> = self
                .config
                .instructions
                .iter()
                .map(|i| format!("- {}", i))
                .collect();
            sections.push(format!("<instructions>\n{}\n</instructions>", lines.join("\n")));
        }

        if let Some(memory) = &self.memory {
            match memory.get_user_memories(self.user_id()).await {
                Ok(memories) if !memories.is_empty() => sections.push(format!(
                    "<memories_from_previous_interactions>\n{}\n\
                     </memories_from_previous_interactions>",
                    format_memory_for_prompt(&memories)
                )),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    agent = %self.config.name,
                    error = %e,
                    "failed to load user memories"
                ),
            }
        }

        let state = self.session_state()?.lock().clone();
        if !state.is_empty() {
            let rendered = serde_json::to_string_pretty(&state)
                .map_err(|e| AppError::Internal(format!("Failed to render session state: {}", e)))?;
            sections.push(format!("<session_state>\n{}\n</session_state>", rendered));
        }

        Ok(sections.join("\n\n"))
    }

    /// User prompt, with knowledge references appended when available.
    pub async fn user_prompt(&self, message: &str) -> Result<String> {
        let (Some(vectordb), Some(collection)) =
            (&self.knowledge, &self.config.knowledge_collection)
        else {
            return Ok(message.to_string());
        };

        let documents = vectordb
            .search(collection, message, self.config.num_references)
            .await?;
        let references = convert_documents_to_string(&documents, self.config.references_format)?;
        if references.is_empty() {
            return Ok(message.to_string());
        }

        Ok(format!(
            "{}\n\nUse the following references from the knowledge base if they help.\n\
             <references>\n{}\n</references>",
            message, references
        ))
    }

    fn dispatch_memory_update(&self, message: &str) {
        let (Some(store), Some(manager)) = (self.memory.clone(), self.memory_manager.clone())
        else {
            return;
        };
        let user_id = self.config.user_id.clone();
        let messages = vec![message.to_string()];

        spawn_supervised("memory_update", async move {
            manager
                .update_memories(store.as_ref(), user_id.as_deref(), &messages)
                .await
        });
    }
}

#[async_trait]
impl Agent for BaseAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(&self, message: &str) -> Result<RunResponse> {
        let system = self.system_prompt().await?;
        let prompt = self.user_prompt(message).await?;
        if self.config.debug {
            tracing::debug!(
                agent = %self.config.name,
                system = %system,
                prompt = %prompt,
                "agent prompt"
            );
        }

        let content = self.llm.generate_with_system(&system, &prompt).await?;
        let response = RunResponse::new(content).with_session(self.session_id());

        self.dispatch_memory_update(message);
        Ok(response)
    }

    async fn run_stream(&self, message: &str) -> Result<RunEventStream> {
        let system = self.system_prompt().await?;
        let prompt = self.user_prompt(message).await?;
        let mut chunks = self.llm.stream_with_system(&system, &prompt).await?;

        let store = self.memory.clone();
        let manager = self.memory_manager.clone();
        let user_id = self.config.user_id.clone();
        let input = message.to_string();

        let stream = async_stream::stream! {
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(text) => yield Ok(RunEvent::content(text)),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if let (Some(store), Some(manager)) = (store, manager) {
                spawn_supervised("memory_update", async move {
                    manager
                        .update_memories(store.as_ref(), user_id.as_deref(), &[input])
                        .await
                });
            }
        };

        Ok(Box::pin(stream))
    }
}
