//! Pipeline orchestration: stage sequencing and the events a run emits

pub mod events;
pub mod pipeline_orchestrator;

pub use events::{PipelineEvent, Stage, TerminalKind};
pub use pipeline_orchestrator::{AgentPipeline, PipelineMode, PipelineRun};
