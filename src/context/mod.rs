//! Request-scoped context store.
//!
//! Holds the current session id, auth token and workflow handle for the
//! logical request that is executing, so nested callees can read them without
//! threading parameters through every call.
//!
//! Every HTTP request is wrapped in [`scope`] by the router middleware. Work
//! that outlives the handler but should still see the request's values is
//! started with [`spawn_scoped`], which hands the child task a snapshot of the
//! parent's slots.
//!
//! ```ignore
//! context::scope(async {
//!     context::set_current_session_id(Some("s-1".into()))?;
//!     assert_eq!(context::current_session_id().as_deref(), Some("s-1"));
//!     Ok::<_, ContextError>(())
//! })
//! .await?;
//! ```

use crate::types::AppError;
use crate::workflows::Workflow;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

tokio::task_local! {
    static REQUEST_CONTEXT: Arc<RwLock<ContextSlots>>;
}

/// Values visible to one logical request.
#[derive(Clone, Default)]
struct ContextSlots {
    session_id: Option<String>,
    auth_token: Option<String>,
    workflow: Option<Arc<dyn Workflow>>,
}

/// Errors raised by the context store.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// A write was attempted outside of any request scope
    #[error("no request scope is active")]
    NoScope,

    /// A slot that the caller requires was never written
    #[error("{0} is not set for the current request")]
    Unset(&'static str),
}

impl From<ContextError> for AppError {
    fn from(err: ContextError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Run `fut` with fresh, empty context slots.
pub async fn scope<F: Future>(fut: F) -> F::Output {
    REQUEST_CONTEXT
        .scope(Arc::new(RwLock::new(ContextSlots::default())), fut)
        .await
}

/// Spawn `fut` on the runtime with a copy of the current slot values.
///
/// Writes made by the child stay in the child. Outside of a scope the child
/// starts with empty slots.
pub fn spawn_scoped<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let snapshot = REQUEST_CONTEXT
        .try_with(|slots| slots.read().clone())
        .unwrap_or_default();
    tokio::spawn(REQUEST_CONTEXT.scope(Arc::new(RwLock::new(snapshot)), fut))
}

fn read<T>(f: impl FnOnce(&ContextSlots) -> Option<T>) -> Option<T> {
    REQUEST_CONTEXT
        .try_with(|slots| f(&slots.read()))
        .ok()
        .flatten()
}

fn write(f: impl FnOnce(&mut ContextSlots)) -> Result<(), ContextError> {
    REQUEST_CONTEXT
        .try_with(|slots| f(&mut slots.write()))
        .map_err(|_| ContextError::NoScope)
}

pub fn current_session_id() -> Option<String> {
    read(|slots| slots.session_id.clone())
}

pub fn set_current_session_id(session_id: Option<String>) -> Result<(), ContextError> {
    write(|slots| slots.session_id = session_id)
}

pub fn current_auth_token() -> Option<String> {
    read(|slots| slots.auth_token.clone())
}

pub fn set_current_auth_token(token: Option<String>) -> Result<(), ContextError> {
    write(|slots| slots.auth_token = token)
}

pub fn current_workflow() -> Option<Arc<dyn Workflow>> {
    read(|slots| slots.workflow.clone())
}

pub fn set_current_workflow(workflow: Arc<dyn Workflow>) -> Result<(), ContextError> {
    write(|slots| slots.workflow = Some(workflow))
}

/// Like [`current_workflow`] but fails when no workflow was stored.
pub fn require_current_workflow() -> Result<Arc<dyn Workflow>, ContextError> {
    current_workflow().ok_or(ContextError::Unset("current workflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_read_before_write_is_none() {
        scope(async {
            assert!(current_session_id().is_none());
            assert!(current_auth_token().is_none());
            assert!(current_workflow().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn test_write_outside_scope_fails() {
        let err = set_current_session_id(Some("s".into())).unwrap_err();
        assert!(matches!(err, ContextError::NoScope));
        assert!(current_session_id().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let first = tokio::spawn(scope(async {
            set_current_session_id(Some("a".into())).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            current_session_id()
        }));
        let second = tokio::spawn(scope(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let before = current_session_id();
            set_current_session_id(Some("b".into())).unwrap();
            (before, current_session_id())
        }));

        assert_eq!(first.await.unwrap().as_deref(), Some("a"));
        let (before, after) = second.await.unwrap();
        assert!(before.is_none());
        assert_eq!(after.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_spawn_scoped_inherits_copy() {
        scope(async {
            set_current_auth_token(Some("token-1".into())).unwrap();

            let child = spawn_scoped(async {
                let inherited = current_auth_token();
                set_current_auth_token(Some("token-2".into())).unwrap();
                inherited
            });

            assert_eq!(child.await.unwrap().as_deref(), Some("token-1"));
            assert_eq!(current_auth_token().as_deref(), Some("token-1"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_require_workflow_when_unset() {
        scope(async {
            let err = require_current_workflow().err().unwrap();
            assert!(matches!(err, ContextError::Unset(_)));
        })
        .await;
    }
}
