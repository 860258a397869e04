//! Workflows
//!
//! A workflow is a named, ordered list of steps run against one user message.
//! Each step sees the original message and the previous step's output.
//!
//! ```ignore
//! let workflow = BaseWorkflow::new("simple")
//!     .step(Step::function("gate", "stop early on greetings", |input: StepInput| {
//!         Box::pin(async_stream::stream! {
//!             if input.message.starts_with("hi") {
//!                 yield Ok(StepEvent::Event(RunEvent::content("Hello!")));
//!                 yield Ok(StepEvent::Output(StepOutput::stop("Hello!")));
//!             }
//!         })
//!     }))
//!     .step(Step::agent("chatter", "answer the user", chatter));
//! ```

pub mod base;

pub use base::{
    BaseWorkflow, Step, StepEvent, StepEventStream, StepInput, StepOutput, WorkflowOutput,
    WorkflowStep,
};

use crate::agents::response_stream;
use crate::types::{Result, RunEventStream, RunResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Key/value state shared by a workflow and the agents running inside it.
pub type SessionState = Arc<Mutex<Map<String, Value>>>;

#[async_trait]
pub trait Workflow: Send + Sync {
    fn name(&self) -> &str;

    /// Shared session state, if this workflow keeps one.
    fn session_state(&self) -> Option<SessionState> {
        None
    }

    async fn run(&self, message: &str) -> Result<RunResponse>;

    async fn run_stream(&self, message: &str) -> Result<RunEventStream> {
        let response = self.run(message).await?;
        Ok(response_stream(response))
    }
}
