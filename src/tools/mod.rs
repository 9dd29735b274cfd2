//! Tool capabilities invoked by the executor stage
//!
//! A tool turns one input string into an [`Outcome`]. Invokers never return
//! errors: malformed input, transport failures and bad status codes are all
//! folded into [`Outcome::Failure`] so the pipeline can treat them as data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod builtin;

pub use builtin::{Calculator, SummaryLookupTool};

/// Tagged result of a tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn success<S: Into<String>>(text: S) -> Self {
        Self::Success(text.into())
    }

    pub fn failure<S: Into<String>>(reason: S) -> Self {
        Self::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Textual form delivered to clients, identical for both variants
    pub fn text(&self) -> &str {
        match self {
            Outcome::Success(text) | Outcome::Failure(text) => text,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Tool categories the pipeline knows how to plan for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Calculator,
    SummaryLookup,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Calculator => "calculator",
            ToolKind::SummaryLookup => "summary_lookup",
        }
    }

    /// Plan text a planner derives for this kind of tool
    pub fn plan_for(&self, task: &str) -> String {
        match self {
            ToolKind::Calculator => format!("Compute the result of {task}"),
            ToolKind::SummaryLookup => {
                format!("Retrieve a summary from Wikipedia about '{task}'")
            }
        }
    }

    /// Word a reviewer expects in any plan this tool can carry out
    pub fn review_keyword(&self) -> &'static str {
        match self {
            ToolKind::Calculator => "Compute",
            ToolKind::SummaryLookup => "Wikipedia",
        }
    }

    /// Task used when a client does not supply one
    pub fn default_task(&self) -> &'static str {
        match self {
            ToolKind::Calculator => "2+2",
            ToolKind::SummaryLookup => "Alan_Turing",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// External capability wrapped by the executor
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Run the tool once; failures come back as [`Outcome::Failure`]
    async fn invoke(&self, input: &str) -> Outcome;
}

/// Errors raised while constructing a tool, never while invoking one
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
    #[error("Invalid tool endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Cut `text` to at most `budget` characters, marking the cut with `...`
pub fn truncate_for_display(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
