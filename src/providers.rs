//! Dispatch accessors handed to routes and tasks.
//!
//! Each provider is a cheap clone holding the frozen orchestrator.

use crate::agents::Agent;
use crate::knowledge::VectorDb;
use crate::memory::MemoryStore;
use crate::mindmatrix::MindMatrix;
use crate::registry::FactoryConfig;
use crate::types::{AppError, Result, RunEventStream, RunResponse};
use crate::workflows::Workflow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which registry a provider lookup goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Agent,
    Workflow,
}

impl FromStr for HandlerKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "agent" => Ok(HandlerKind::Agent),
            "workflow" => Ok(HandlerKind::Workflow),
            other => Err(AppError::InvalidInput(format!(
                "Invalid type '{}': expected 'agent' or 'workflow'",
                other
            ))),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Agent => f.write_str("agent"),
            HandlerKind::Workflow => f.write_str("workflow"),
        }
    }
}

/// A resolved agent or workflow.
#[derive(Clone)]
pub enum Handler {
    Agent(Arc<dyn Agent>),
    Workflow(Arc<dyn Workflow>),
}

impl Handler {
    pub fn name(&self) -> &str {
        match self {
            Handler::Agent(agent) => agent.name(),
            Handler::Workflow(workflow) => workflow.name(),
        }
    }

    pub async fn run(&self, message: &str) -> Result<RunResponse> {
        match self {
            Handler::Agent(agent) => agent.run(message).await,
            Handler::Workflow(workflow) => workflow.run(message).await,
        }
    }

    pub async fn run_stream(&self, message: &str) -> Result<RunEventStream> {
        match self {
            Handler::Agent(agent) => agent.run_stream(message).await,
            Handler::Workflow(workflow) => workflow.run_stream(message).await,
        }
    }
}

/// Resolves agents and workflows by name.
#[derive(Clone)]
pub struct AgentProvider {
    mindmatrix: Arc<MindMatrix>,
}

impl AgentProvider {
    pub fn new(mindmatrix: Arc<MindMatrix>) -> Self {
        Self { mindmatrix }
    }

    /// Build the named handler. `kind` must be `"agent"` or `"workflow"`.
    pub fn provide(&self, name: &str, kind: &str, overrides: &FactoryConfig) -> Result<Handler> {
        self.provide_kind(name, kind.parse()?, overrides)
    }

    pub fn provide_kind(
        &self,
        name: &str,
        kind: HandlerKind,
        overrides: &FactoryConfig,
    ) -> Result<Handler> {
        match kind {
            HandlerKind::Agent => self.mindmatrix.get_agent(name, overrides).map(Handler::Agent),
            HandlerKind::Workflow => self
                .mindmatrix
                .get_workflow(name, overrides)
                .map(Handler::Workflow),
        }
    }

    pub fn mindmatrix(&self) -> &Arc<MindMatrix> {
        &self.mindmatrix
    }
}

/// Resolves registered vector databases by name.
#[derive(Clone)]
pub struct VectorDbProvider {
    mindmatrix: Arc<MindMatrix>,
}

impl VectorDbProvider {
    pub fn new(mindmatrix: Arc<MindMatrix>) -> Self {
        Self { mindmatrix }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn VectorDb>> {
        self.mindmatrix.get_vectordb(name)
    }
}

/// Access to the configured memory backend.
#[derive(Clone)]
pub struct MemoryProvider {
    mindmatrix: Arc<MindMatrix>,
}

impl MemoryProvider {
    pub fn new(mindmatrix: Arc<MindMatrix>) -> Self {
        Self { mindmatrix }
    }

    pub fn memory(&self) -> Result<Arc<dyn MemoryStore>> {
        self.mindmatrix
            .memory()
            .ok_or_else(|| AppError::Configuration("Memory is not configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mindmatrix::MindMatrixBuilder;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("agent".parse::<HandlerKind>().unwrap(), HandlerKind::Agent);
        assert_eq!(
            "workflow".parse::<HandlerKind>().unwrap(),
            HandlerKind::Workflow
        );
        assert!(matches!(
            "team".parse::<HandlerKind>(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bogus_kind_is_invalid_input() {
        let mm = Arc::new(MindMatrixBuilder::new().build());
        let provider = AgentProvider::new(mm);
        let err = provider
            .provide("anything", "bogus", &FactoryConfig::new())
            .err()
            .unwrap();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_agent_is_not_found() {
        let mm = Arc::new(MindMatrixBuilder::new().build());
        let provider = AgentProvider::new(mm);
        let err = provider
            .provide("ghost", "agent", &FactoryConfig::new())
            .err()
            .unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_memory_provider_without_memory() {
        let mm = Arc::new(MindMatrixBuilder::new().build());
        assert!(matches!(
            MemoryProvider::new(mm).memory(),
            Err(AppError::Configuration(_))
        ));
    }
}
