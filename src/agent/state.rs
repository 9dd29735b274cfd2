//! Shared task state threaded through the pipeline stages
//!
//! One `SharedTaskState` exists per run and is owned by that run. Stages
//! borrow it mutably for the duration of a call. Every optional field moves
//! from absent to present exactly once; a second write is a contract
//! violation.

use crate::agent::pipeline::Stage;
use crate::error::{AgentError, AgentResult};
use crate::tools::Outcome;
use serde::Serialize;
use uuid::Uuid;

/// Namespace for deterministic task identifiers
const TASK_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d0c2a_8b3e_4c55_9a7e_2d4f1b0e9c31);

/// Deterministic identifier for a task string
pub fn task_id_for(task: &str) -> Uuid {
    Uuid::new_v5(&TASK_NAMESPACE, task.as_bytes())
}

/// Status derived from the state fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No verdict yet
    Pending,
    /// Review rejected the plan; no result will be recorded
    Rejected,
    /// The tool produced a usable result
    Succeeded,
    /// The tool ran and reported a failure
    ToolFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedTaskState {
    task_id: Uuid,
    run_id: Uuid,
    original_task: String,
    plan: Option<String>,
    approved: Option<bool>,
    result: Option<Outcome>,
}

impl SharedTaskState {
    pub fn new<S: Into<String>>(task: S) -> Self {
        let original_task = task.into();
        Self {
            task_id: task_id_for(&original_task),
            run_id: Uuid::new_v4(),
            original_task,
            plan: None,
            approved: None,
            result: None,
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn original_task(&self) -> &str {
        &self.original_task
    }

    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    pub fn approved(&self) -> Option<bool> {
        self.approved
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.result.as_ref()
    }

    /// Textual form of the recorded outcome
    pub fn result(&self) -> Option<&str> {
        self.result.as_ref().map(Outcome::text)
    }

    pub fn set_plan(&mut self, plan: String) -> AgentResult<()> {
        if self.plan.is_some() {
            return Err(AgentError::contract_violation(
                Stage::Planner,
                "plan has already been set for this task",
            ));
        }
        self.plan = Some(plan);
        Ok(())
    }

    pub fn set_approval(&mut self, approved: bool) -> AgentResult<()> {
        if self.approved.is_some() {
            return Err(AgentError::contract_violation(
                Stage::Review,
                "plan has already been reviewed",
            ));
        }
        self.approved = Some(approved);
        Ok(())
    }

    pub fn set_result(&mut self, outcome: Outcome) -> AgentResult<()> {
        if self.approved == Some(false) {
            return Err(AgentError::contract_violation(
                Stage::Executor,
                "cannot record a result for a rejected plan",
            ));
        }
        if self.result.is_some() {
            return Err(AgentError::contract_violation(
                Stage::Executor,
                "result has already been recorded",
            ));
        }
        self.result = Some(outcome);
        Ok(())
    }

    pub fn status(&self) -> RunStatus {
        match (&self.approved, &self.result) {
            (Some(false), _) => RunStatus::Rejected,
            (_, Some(Outcome::Success(_))) => RunStatus::Succeeded,
            (_, Some(Outcome::Failure(_))) => RunStatus::ToolFailed,
            _ => RunStatus::Pending,
        }
    }
}
