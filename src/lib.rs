//! agent-relay
//!
//! Streams the progress of a small multi-agent task pipeline to a client
//! over Server-Sent Events. A planner turns the task into a plan, an
//! optional review gate approves or rejects it, and an executor runs the
//! approved plan through a tool. Every stage's status line goes out as its
//! own event the moment it is produced.
//!
//! # Overview
//!
//! - [`agent`]: shared task state, the stages, and the pull-driven pipeline
//! - [`tools`]: the calculator and the remote summary lookup
//! - [`transport`]: SSE framing and the warp server
//! - [`observability`]: logging, metrics and health endpoints
//!
//! # Quick Start
//!
//! ```rust
//! use agent_relay::agent::{AgentPipeline, PipelineMode};
//! use agent_relay::clock::Pacer;
//! use agent_relay::tools::Calculator;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test_runtime();
//! # fn tokio_test_runtime() {
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline = AgentPipeline::new(
//!     PipelineMode::Planned,
//!     Arc::new(Calculator::new()),
//!     Pacer::immediate(),
//!     200,
//! );
//! let mut run = pipeline.start("2+2", CancellationToken::new());
//! while let Some(event) = run.next_event().await {
//!     println!("{event}");
//! }
//! assert_eq!(run.state().result(), Some("Result: 4"));
//! # });
//! # }
//! ```

pub mod agent;
pub mod clock;
pub mod config;
pub mod error;
pub mod observability;
pub mod testing;
pub mod tools;
pub mod transport;

pub use agent::{AgentPipeline, PipelineEvent, PipelineMode, PipelineRun, SharedTaskState};
pub use config::*;
pub use error::{AgentError, AgentResult};
pub use tools::{Outcome, ToolError, ToolInvoker, ToolKind};
pub use transport::{EventEmitter, END_MARKER};
