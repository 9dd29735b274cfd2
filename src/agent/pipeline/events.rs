//! Status events produced by a pipeline run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Pipeline stage that produced an event, in transition-table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Single-agent announce/invoke stages of the direct pipeline
    Agent,
    Planner,
    Review,
    Executor,
    /// Orchestrator output: shared result, terminal markers, diagnostics
    System,
}

impl Stage {
    /// Agent role shown in the wire prefix
    pub fn role(&self) -> &'static str {
        match self {
            Stage::Agent => "agent",
            Stage::Planner => "planner",
            // Review is carried out by the executor before it commits to the plan
            Stage::Review | Stage::Executor => "executor",
            Stage::System => "system",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Agent => "agent",
            Stage::Planner => "planner",
            Stage::Review => "review",
            Stage::Executor => "executor",
            Stage::System => "system",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    Completed,
    Rejected,
    Failed,
}

/// One status string of a run, plus the metadata tests and logs need
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    pub stage: Stage,
    pub message: String,
    /// Set on the last event of a run only
    pub terminal: Option<TerminalKind>,
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new<S: Into<String>>(stage: Stage, message: S) -> Self {
        Self {
            stage,
            message: message.into(),
            terminal: None,
            timestamp: Utc::now(),
        }
    }

    pub fn terminal<S: Into<String>>(stage: Stage, message: S, kind: TerminalKind) -> Self {
        Self {
            terminal: Some(kind),
            ..Self::new(stage, message)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage.role(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_uses_role_prefix() {
        let event = PipelineEvent::new(Stage::Planner, "Task received: 2+2");
        assert_eq!(event.to_string(), "[planner] Task received: 2+2");

        let event = PipelineEvent::new(Stage::Review, "Approved the plan.");
        assert_eq!(event.to_string(), "[executor] Approved the plan.");
    }

    #[test]
    fn test_terminal_constructor() {
        let event =
            PipelineEvent::terminal(Stage::System, "All agents finished.", TerminalKind::Completed);
        assert!(event.is_terminal());
        assert_eq!(event.terminal, Some(TerminalKind::Completed));
        assert!(!PipelineEvent::new(Stage::System, "x").is_terminal());
    }

    #[test]
    fn test_stage_order_matches_transition_table() {
        assert!(Stage::Agent < Stage::Planner);
        assert!(Stage::Planner < Stage::Review);
        assert!(Stage::Review < Stage::Executor);
        assert!(Stage::Executor < Stage::System);
    }

    #[test]
    fn test_event_serializes_for_logs() {
        let event = PipelineEvent::terminal(Stage::System, "x", TerminalKind::Rejected);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "system");
        assert_eq!(json["terminal"], "rejected");
    }
}
