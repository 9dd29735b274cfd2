//! Executor stage: runs the approved plan through the tool

use crate::agent::pipeline::{PipelineEvent, Stage};
use crate::agent::state::SharedTaskState;
use crate::clock::Pacer;
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics;
use crate::tools::{truncate_for_display, ToolInvoker, ToolKind};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, Instrument};

/// Drives one tool on behalf of a run
///
/// A planned executor speaks as `executor` and needs a plan on the state.
/// A direct executor speaks as `agent` and works from the raw task.
#[derive(Clone)]
pub struct Executor {
    tool: Arc<dyn ToolInvoker>,
    pacer: Pacer,
    display_budget: usize,
    stage: Stage,
}

impl Executor {
    /// Executor that follows a planner
    pub fn new(tool: Arc<dyn ToolInvoker>, pacer: Pacer, display_budget: usize) -> Self {
        Self {
            tool,
            pacer,
            display_budget,
            stage: Stage::Executor,
        }
    }

    /// Single agent with no planner in front of it
    pub fn direct(tool: Arc<dyn ToolInvoker>, pacer: Pacer, display_budget: usize) -> Self {
        Self {
            stage: Stage::Agent,
            ..Self::new(tool, pacer, display_budget)
        }
    }

    pub fn tool_kind(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn requires_plan(&self) -> bool {
        self.stage == Stage::Executor
    }

    fn check_preconditions(&self, state: &SharedTaskState) -> AgentResult<()> {
        if self.requires_plan() && state.plan().is_none() {
            return Err(AgentError::contract_violation(
                self.stage,
                "executor started without a plan",
            ));
        }
        if state.approved() == Some(false) {
            return Err(AgentError::contract_violation(
                self.stage,
                "executor started on a rejected plan",
            ));
        }
        if state.outcome().is_some() {
            return Err(AgentError::contract_violation(
                self.stage,
                "tool already invoked for this run",
            ));
        }
        Ok(())
    }

    /// Confirm what is about to be executed
    pub async fn acknowledge(&self, state: &SharedTaskState) -> AgentResult<PipelineEvent> {
        self.check_preconditions(state)?;
        self.pacer.think().await;

        let message = match state.plan() {
            Some(plan) if self.requires_plan() => format!("Received plan: {plan}"),
            _ => format!("Task received: {}", state.original_task()),
        };
        Ok(PipelineEvent::new(self.stage, message))
    }

    /// Notice sent while the tool call is about to start
    pub fn invocation_notice(&self, state: &SharedTaskState) -> PipelineEvent {
        let message = if self.requires_plan() {
            format!("Invoking tool with input: {}", state.original_task())
        } else {
            "Invoking tool...".to_string()
        };
        PipelineEvent::new(self.stage, message)
    }

    /// Call the tool once and record its outcome on the state
    pub async fn execute(&self, state: &mut SharedTaskState) -> AgentResult<PipelineEvent> {
        self.check_preconditions(state)?;
        if !self.requires_plan() {
            self.pacer.think().await;
        }

        let kind = self.tool.kind();
        let span = crate::tool_span!(tool = kind.name(), task_id = %state.task_id());
        let started = Instant::now();
        let outcome = self
            .tool
            .invoke(state.original_task())
            .instrument(span)
            .await;
        let elapsed = started.elapsed();

        metrics().tool_invoked(kind.name(), elapsed, outcome.is_success());
        debug!(
            tool = kind.name(),
            success = outcome.is_success(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Tool returned"
        );

        let shown = truncate_for_display(outcome.text(), self.display_budget);
        state.set_result(outcome)?;

        let message = if self.requires_plan() {
            format!("Tool result: {shown}")
        } else {
            shown
        };
        Ok(PipelineEvent::new(self.stage, message))
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("tool", &self.tool.kind())
            .field("pacer", &self.pacer)
            .field("display_budget", &self.display_budget)
            .field("stage", &self.stage)
            .finish()
    }
}
