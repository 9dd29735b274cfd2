//! Agent roles and the pipeline that sequences them
//!
//! A run threads one [`SharedTaskState`] through the planner, the optional
//! reviewer and the executor. Each stage returns the status event it wants
//! the client to see; the orchestrator decides what runs next.

pub mod executor;
pub mod pipeline;
pub mod planner;
pub mod reviewer;
pub mod state;

pub use executor::Executor;
pub use pipeline::*;
pub use planner::Planner;
pub use reviewer::Reviewer;
pub use state::{task_id_for, RunStatus, SharedTaskState};
