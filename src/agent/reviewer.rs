//! Review stage for the approval-gated pipeline

use crate::agent::pipeline::{PipelineEvent, Stage};
use crate::agent::state::SharedTaskState;
use crate::clock::Pacer;
use crate::error::{AgentError, AgentResult};
use crate::tools::ToolKind;
use tracing::{debug, info};

/// Approves a plan iff it mentions the executor tool's keyword
#[derive(Debug, Clone)]
pub struct Reviewer {
    keyword: &'static str,
    pacer: Pacer,
}

impl Reviewer {
    /// Review on behalf of an executor holding a tool of `kind`
    pub fn new(kind: ToolKind, pacer: Pacer) -> Self {
        Self {
            keyword: kind.review_keyword(),
            pacer,
        }
    }

    pub fn keyword(&self) -> &str {
        self.keyword
    }

    pub async fn review(&self, state: &mut SharedTaskState) -> AgentResult<PipelineEvent> {
        self.pacer.think().await;

        let plan = state.plan().ok_or_else(|| {
            AgentError::contract_violation(Stage::Review, "no plan to review")
        })?;
        let approved = plan.contains(self.keyword);
        debug!(keyword = self.keyword, approved, "Plan reviewed");

        state.set_approval(approved)?;

        let message = if approved {
            "Approved the plan."
        } else {
            info!(task_id = %state.task_id(), "Plan rejected");
            "Rejected the plan."
        };
        Ok(PipelineEvent::new(Stage::Review, message))
    }
}
