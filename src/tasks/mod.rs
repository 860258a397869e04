//! Background tasks.
//!
//! A [`Task`] is a named unit of async work registered on the orchestrator.
//! Instead of inspecting parameter names, each task declares the accessors it
//! needs through [`TaskDependencies`] and the runner injects exactly those into
//! the [`TaskContext`].

pub mod embeddings;

pub use embeddings::EmbedDocuments;

use crate::context;
use crate::providers::{AgentProvider, VectorDbProvider};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

/// Accessors a task asks the runner for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskDependencies {
    pub vectordb_provider: bool,
    pub agent_provider: bool,
}

impl TaskDependencies {
    pub const NONE: Self = Self {
        vectordb_provider: false,
        agent_provider: false,
    };

    pub const VECTORDB_PROVIDER: Self = Self {
        vectordb_provider: true,
        agent_provider: false,
    };

    pub const AGENT_PROVIDER: Self = Self {
        vectordb_provider: false,
        agent_provider: true,
    };

    pub const fn union(self, other: Self) -> Self {
        Self {
            vectordb_provider: self.vectordb_provider || other.vectordb_provider,
            agent_provider: self.agent_provider || other.agent_provider,
        }
    }
}

/// What the runner hands to a task. Only declared accessors are present.
#[derive(Clone, Default)]
pub struct TaskContext {
    pub vectordb_provider: Option<VectorDbProvider>,
    pub agent_provider: Option<AgentProvider>,
}

impl TaskContext {
    pub fn vectordb_provider(&self) -> Result<&VectorDbProvider> {
        self.vectordb_provider.as_ref().ok_or_else(|| {
            AppError::Internal("task did not declare a vectordb provider dependency".to_string())
        })
    }

    pub fn agent_provider(&self) -> Result<&AgentProvider> {
        self.agent_provider.as_ref().ok_or_else(|| {
            AppError::Internal("task did not declare an agent provider dependency".to_string())
        })
    }
}

#[async_trait]
pub trait Task: Send + Sync {
    fn dependencies(&self) -> TaskDependencies {
        TaskDependencies::NONE
    }

    async fn run(&self, args: Value, ctx: TaskContext) -> Result<Value>;
}

/// Fire-and-forget spawn that never propagates.
///
/// Errors and panics from `fut` are logged and discarded. The child inherits a
/// copy of the current request context.
pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    context::spawn_scoped(async move {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(_)) => tracing::debug!(task = name, "background task finished"),
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "background task failed"),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(task = name, panic = %message, "background task panicked");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_union() {
        let both = TaskDependencies::VECTORDB_PROVIDER.union(TaskDependencies::AGENT_PROVIDER);
        assert!(both.vectordb_provider && both.agent_provider);
        assert_eq!(TaskDependencies::default(), TaskDependencies::NONE);
    }

    #[test]
    fn test_missing_dependency_is_error() {
        let ctx = TaskContext::default();
        assert!(ctx.vectordb_provider().is_err());
        assert!(ctx.agent_provider().is_err());
    }

    #[tokio::test]
    async fn test_supervised_panic_does_not_escape() {
        let handle = spawn_supervised("boom", async {
            if true {
                panic!("exploded");
            }
            Ok::<_, AppError>(())
        });
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_supervised_error_is_swallowed() {
        let handle = spawn_supervised("fails", async {
            Err::<(), _>(AppError::Memory("backend down".into()))
        });
        assert!(handle.await.is_ok());
    }
}
