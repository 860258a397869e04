pub mod base;

use crate::types::{Result, RunEvent, RunEventStream, RunResponse};
use async_trait::async_trait;

pub use base::{BaseAgent, BaseAgentConfig};

/// Base trait for all agents
#[async_trait]
pub trait Agent: Send + Sync {
    /// Registered name of this agent
    fn name(&self) -> &str;

    /// Run the agent to completion
    async fn run(&self, message: &str) -> Result<RunResponse>;

    /// Run the agent, yielding events as they are produced
    ///
    /// The default runs to completion and yields the response as one event.
    async fn run_stream(&self, message: &str) -> Result<RunEventStream> {
        let response = self.run(message).await?;
        Ok(response_stream(response))
    }
}

/// A stream yielding a finished response as a single content event.
pub fn response_stream(response: RunResponse) -> RunEventStream {
    Box::pin(futures::stream::once(async move {
        Ok(RunEvent::Content {
            content: response.content,
            artifacts: response.artifacts,
        })
    }))
}
