//! Planner stage: acknowledges the task and turns it into a plan

use crate::agent::pipeline::{PipelineEvent, Stage};
use crate::agent::state::SharedTaskState;
use crate::clock::Pacer;
use crate::error::AgentResult;
use crate::tools::ToolKind;
use tracing::debug;

/// Plans for one tool family
///
/// The plan template comes from the planner's `ToolKind`. It usually matches
/// the executor's tool, but a mismatched planner is how a plan ends up
/// lacking the reviewer's keyword.
#[derive(Debug, Clone)]
pub struct Planner {
    kind: ToolKind,
    pacer: Pacer,
}

impl Planner {
    pub fn new(kind: ToolKind, pacer: Pacer) -> Self {
        Self { kind, pacer }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    /// Acknowledge the task. Does not touch the state.
    pub async fn announce(&self, state: &SharedTaskState) -> PipelineEvent {
        self.pacer.think().await;
        PipelineEvent::new(
            Stage::Planner,
            format!("Task received: {}", state.original_task()),
        )
    }

    /// Derive the plan and record it on the state
    pub async fn plan(&self, state: &mut SharedTaskState) -> AgentResult<PipelineEvent> {
        self.pacer.think().await;

        let plan = self.kind.plan_for(state.original_task());
        debug!(task_id = %state.task_id(), plan = %plan, "Plan derived");
        state.set_plan(plan.clone())?;

        Ok(PipelineEvent::new(
            Stage::Planner,
            format!("Plan created: {plan}"),
        ))
    }
}
