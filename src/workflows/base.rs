//! Step-based workflow.

use crate::agents::Agent;
use crate::context;
use crate::types::{Result, RunEvent, RunEventStream, RunResponse};
use crate::workflows::{SessionState, Workflow};
use async_trait::async_trait;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use utoipa::ToSchema;

/// Output from a workflow execution
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowOutput {
    /// The final response from the workflow
    pub final_response: String,
    /// Number of steps executed
    pub steps_executed: usize,
    /// Detailed reasoning path showing each step
    pub reasoning_path: Vec<WorkflowStep>,
}

/// A single step in the workflow execution
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowStep {
    /// Name of the step
    pub step_name: String,
    /// The input provided to the step
    pub input: String,
    /// The output of the step
    pub output: String,
    /// Whether the step reported success
    pub success: bool,
    /// Unix timestamp when this step was executed
    pub timestamp: i64,
    /// Duration of this step in milliseconds
    pub duration_ms: u64,
}

/// What a step sees.
#[derive(Debug, Clone)]
pub struct StepInput {
    /// The user message the workflow was started with
    pub message: String,
    /// Output of the previous step, `None` for the first step
    pub previous_step_content: Option<String>,
}

impl StepInput {
    /// Previous output if any, else the original message.
    pub fn current(&self) -> &str {
        self.previous_step_content.as_deref().unwrap_or(&self.message)
    }
}

/// Final result of a step. `stop` ends the workflow after this step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub content: String,
    pub stop: bool,
    pub success: bool,
}

impl StepOutput {
    pub fn next(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop: false,
            success: true,
        }
    }

    pub fn stop(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop: true,
            success: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StepEvent {
    Event(RunEvent),
    Output(StepOutput),
}

pub type StepEventStream = Pin<Box<dyn Stream<Item = Result<StepEvent>> + Send + 'static>>;

type StepFn = Arc<dyn Fn(StepInput) -> StepEventStream + Send + Sync>;

#[derive(Clone)]
enum StepRunner {
    Agent(Arc<dyn Agent>),
    Function(StepFn),
}

/// One workflow step: an agent or a function executor.
#[derive(Clone)]
pub struct Step {
    pub name: String,
    pub description: String,
    runner: StepRunner,
}

impl Step {
    /// Run `agent` on the previous step's output (or the user message).
    pub fn agent(
        name: impl Into<String>,
        description: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            runner: StepRunner::Agent(agent),
        }
    }

    /// Run a function yielding content events and, optionally, a final
    /// [`StepOutput`]. Without one, the streamed content becomes the output.
    pub fn function<F>(name: impl Into<String>, description: impl Into<String>, executor: F) -> Self
    where
        F: Fn(StepInput) -> StepEventStream + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            runner: StepRunner::Function(Arc::new(executor)),
        }
    }

    async fn start(&self, input: StepInput) -> Result<StepEventStream> {
        match &self.runner {
            StepRunner::Agent(agent) => {
                let events = agent.run_stream(input.current()).await?;
                Ok(Box::pin(events.map(|event| event.map(StepEvent::Event))))
            }
            StepRunner::Function(executor) => Ok(executor(input)),
        }
    }
}

enum Progress {
    Event(RunEvent),
    StepDone(WorkflowStep),
}

pub struct BaseWorkflow {
    name: String,
    steps: Vec<Step>,
    session_state: SessionState,
}

impl BaseWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            session_state: SessionState::default(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Seed the state shared with the agents of this workflow.
    pub fn with_session_state(self, state: serde_json::Map<String, serde_json::Value>) -> Self {
        *self.session_state.lock() = state;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn drive(&self, message: &str) -> impl Stream<Item = Result<Progress>> + Send + 'static {
        let steps = self.steps.clone();
        let workflow = self.name.clone();
        let message = message.to_string();

        async_stream::try_stream! {
            let mut previous: Option<String> = None;

            for step in steps {
                let input = StepInput {
                    message: message.clone(),
                    previous_step_content: previous.clone(),
                };
                let step_input = input.current().to_string();
                let started = std::time::Instant::now();
                let timestamp = Utc::now().timestamp();

                let mut events = step.start(input).await?;
                let mut streamed = String::new();
                let mut output = None;
                while let Some(event) = events.next().await {
                    match event? {
                        StepEvent::Event(event) => {
                            if let RunEvent::Content { content, .. } = &event {
                                streamed.push_str(content);
                            }
                            yield Progress::Event(event);
                        }
                        StepEvent::Output(out) => output = Some(out),
                    }
                }

                let output = output.unwrap_or_else(|| StepOutput::next(streamed));
                tracing::debug!(
                    workflow = %workflow,
                    step = %step.name,
                    stop = output.stop,
                    success = output.success,
                    "workflow step finished"
                );

                yield Progress::StepDone(WorkflowStep {
                    step_name: step.name.clone(),
                    input: step_input,
                    output: output.content.clone(),
                    success: output.success,
                    timestamp,
                    duration_ms: started.elapsed().as_millis() as u64,
                });

                if output.stop {
                    break;
                }
                previous = Some(output.content);
            }
        }
    }

    /// Run all steps and return the final response with its reasoning path.
    pub async fn run_with_trace(&self, message: &str) -> Result<WorkflowOutput> {
        let progress = self.drive(message);
        futures::pin_mut!(progress);

        let mut reasoning_path = Vec::new();
        while let Some(item) = progress.next().await {
            if let Progress::StepDone(step) = item? {
                reasoning_path.push(step);
            }
        }

        Ok(WorkflowOutput {
            final_response: reasoning_path
                .last()
                .map(|step| step.output.clone())
                .unwrap_or_default(),
            steps_executed: reasoning_path.len(),
            reasoning_path,
        })
    }
}

#[async_trait]
impl Workflow for BaseWorkflow {
    fn name(&self) -> &str {
        &self.name
    }

    fn session_state(&self) -> Option<SessionState> {
        Some(self.session_state.clone())
    }

    async fn run(&self, message: &str) -> Result<RunResponse> {
        let output = self.run_with_trace(message).await?;
        Ok(RunResponse::new(output.final_response).with_session(context::current_session_id()))
    }

    async fn run_stream(&self, message: &str) -> Result<RunEventStream> {
        let stream = self.drive(message).map(|item| {
            item.map(|progress| match progress {
                Progress::Event(event) => event,
                Progress::StepDone(step) => RunEvent::StepCompleted {
                    step: step.step_name,
                    content: step.output,
                },
            })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{BaseAgent, BaseAgentConfig};
    use crate::test_support::EchoLLM;
    use crate::types::AppError;

    fn echo_agent() -> Arc<dyn Agent> {
        Arc::new(BaseAgent::new(
            BaseAgentConfig::new("chatter"),
            Arc::new(EchoLLM::default()),
        ))
    }

    fn gate(stop: bool) -> Step {
        Step::function("gate", "optionally stop", move |input: StepInput| {
            Box::pin(async_stream::stream! {
                if stop {
                    yield Ok::<_, AppError>(StepEvent::Event(RunEvent::content("thinking...")));
                    yield Ok(StepEvent::Output(StepOutput::stop("fixed answer")));
                } else {
                    yield Ok(StepEvent::Output(StepOutput::next(input.message.clone())));
                }
            })
        })
    }

    #[tokio::test]
    async fn test_stop_ends_workflow() {
        let workflow = BaseWorkflow::new("simple")
            .step(gate(true))
            .step(Step::agent("chatter", "answer", echo_agent()));

        let output = workflow.run_with_trace("hello").await.unwrap();
        assert_eq!(output.final_response, "fixed answer");
        assert_eq!(output.steps_executed, 1);
        assert_eq!(output.reasoning_path[0].step_name, "gate");
    }

    #[tokio::test]
    async fn test_steps_chain_outputs() {
        let workflow = BaseWorkflow::new("simple")
            .step(gate(false))
            .step(Step::agent("chatter", "answer", echo_agent()));

        let output = workflow.run_with_trace("hello").await.unwrap();
        assert_eq!(output.steps_executed, 2);
        assert_eq!(output.reasoning_path[1].input, "hello");
        assert_eq!(output.final_response, "echo: hello");

        let response = workflow.run("hello").await.unwrap();
        assert_eq!(response.content, "echo: hello");
    }

    #[tokio::test]
    async fn test_stream_reports_step_completion() {
        let workflow = BaseWorkflow::new("simple").step(gate(true));
        let events: Vec<RunEvent> = workflow
            .run_stream("hi")
            .await
            .unwrap()
            .map(|event| event.unwrap())
            .collect()
            .await;

        assert_eq!(events[0], RunEvent::content("thinking..."));
        assert_eq!(
            events[1],
            RunEvent::StepCompleted {
                step: "gate".into(),
                content: "fixed answer".into()
            }
        );
    }

    #[tokio::test]
    async fn test_step_error_propagates() {
        let failing = Step::function("broken", "always fails", |_input: StepInput| {
            Box::pin(futures::stream::once(async {
                Err::<StepEvent, _>(AppError::Internal("step failed".into()))
            })) as StepEventStream
        });
        let workflow = BaseWorkflow::new("broken").step(failing);
        assert!(workflow.run("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_workflow_has_empty_response() {
        let output = BaseWorkflow::new("empty").run_with_trace("hi").await.unwrap();
        assert_eq!(output.final_response, "");
        assert!(output.reasoning_path.is_empty());
    }
}
