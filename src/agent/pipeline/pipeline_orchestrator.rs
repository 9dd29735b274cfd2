//! Pipeline orchestrator: sequences the stages of one run
//!
//! An [`AgentPipeline`] is an immutable description of which stages run and
//! with which tool. Each request gets its own [`PipelineRun`], a pull-driven
//! state machine that computes at most one transition per pull. Nothing
//! happens between pulls, so a slow consumer holds the run at the point
//! where it stopped reading.

use crate::agent::executor::Executor;
use crate::agent::pipeline::{PipelineEvent, Stage, TerminalKind};
use crate::agent::planner::Planner;
use crate::agent::reviewer::Reviewer;
use crate::agent::state::SharedTaskState;
use crate::clock::Pacer;
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics;
use crate::tools::{truncate_for_display, ToolInvoker, ToolKind};
use futures::Stream;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

/// Which stages a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// One agent invokes the tool on the raw task
    Direct,
    /// Planner then executor, approval implicit
    Planned,
    /// Planner, review, then executor only if the plan was approved
    Reviewed,
}

impl PipelineMode {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineMode::Direct => "direct",
            PipelineMode::Planned => "planned",
            PipelineMode::Reviewed => "reviewed",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage wiring shared by every run started from it
#[derive(Debug, Clone)]
pub struct AgentPipeline {
    mode: PipelineMode,
    planner: Planner,
    reviewer: Reviewer,
    executor: Executor,
    pacer: Pacer,
    display_budget: usize,
}

impl AgentPipeline {
    /// Build a pipeline whose planner and reviewer both follow the tool's kind
    pub fn new(
        mode: PipelineMode,
        tool: Arc<dyn ToolInvoker>,
        pacer: Pacer,
        display_budget: usize,
    ) -> Self {
        let kind = tool.kind();
        let executor = match mode {
            PipelineMode::Direct => Executor::direct(tool, pacer.clone(), display_budget),
            PipelineMode::Planned | PipelineMode::Reviewed => {
                Executor::new(tool, pacer.clone(), display_budget)
            }
        };

        Self {
            mode,
            planner: Planner::new(kind, pacer.clone()),
            reviewer: Reviewer::new(kind, pacer.clone()),
            executor,
            pacer,
            display_budget,
        }
    }

    /// Swap in a planner that writes plans for a different tool family
    pub fn with_planner(mut self, kind: ToolKind) -> Self {
        self.planner = Planner::new(kind, self.pacer.clone());
        self
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn tool_kind(&self) -> ToolKind {
        self.executor.tool_kind()
    }

    pub fn planner_kind(&self) -> ToolKind {
        self.planner.kind()
    }

    /// Start a run for `task` with fresh state
    pub fn start<S: Into<String>>(&self, task: S, cancel: CancellationToken) -> PipelineRun {
        self.start_with_state(SharedTaskState::new(task), cancel)
    }

    /// Start a run over an existing state record
    pub fn start_with_state(
        &self,
        state: SharedTaskState,
        cancel: CancellationToken,
    ) -> PipelineRun {
        PipelineRun::new(self.clone(), state, cancel)
    }
}

/// Position of a run in the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Received,
    Announced,
    Planned,
    Approved,
    Acknowledged,
    Invoking,
    Executed,
    Finished,
}

/// One single-pass execution of a pipeline
///
/// Pull events with [`PipelineRun::next_event`] or turn the run into a
/// stream with [`PipelineRun::into_stream`]. Once cancelled the run yields
/// nothing further and the in-flight stage is dropped.
pub struct PipelineRun {
    pipeline: AgentPipeline,
    state: SharedTaskState,
    phase: Phase,
    pending: VecDeque<PipelineEvent>,
    cancel: CancellationToken,
    terminal: Option<TerminalKind>,
    cancelled: bool,
    started: Instant,
    span: Span,
}

impl PipelineRun {
    fn new(pipeline: AgentPipeline, state: SharedTaskState, cancel: CancellationToken) -> Self {
        let span = crate::run_span!(
            run_id = %state.run_id(),
            task_id = %state.task_id(),
            mode = pipeline.mode.name(),
            tool = pipeline.tool_kind().name()
        );

        span.in_scope(|| info!(task = %state.original_task(), "Pipeline run started"));
        metrics().run_started();

        Self {
            pipeline,
            state,
            phase: Phase::Received,
            pending: VecDeque::new(),
            cancel,
            terminal: None,
            cancelled: false,
            started: Instant::now(),
            span,
        }
    }

    pub fn state(&self) -> &SharedTaskState {
        &self.state
    }

    pub fn mode(&self) -> PipelineMode {
        self.pipeline.mode
    }

    /// Terminal kind of the last delivered event, once the run has ended
    pub fn terminal(&self) -> Option<TerminalKind> {
        self.terminal
    }

    pub fn is_finished(&self) -> bool {
        self.terminal.is_some() || self.cancelled
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Produce the next event, or `None` when the run has ended or was cancelled
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        if self.is_finished() {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.mark_cancelled();
            return None;
        }

        if self.pending.is_empty() {
            let cancel = self.cancel.clone();
            let phase = self.phase;
            let span = self
                .span
                .in_scope(|| crate::stage_span!(phase = ?phase));
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                step = self.advance().instrument(span) => Some(step),
            };

            match step {
                None => {
                    self.mark_cancelled();
                    return None;
                }
                Some(Ok(events)) => self.pending.extend(events),
                Some(Err(err)) => self.fail(err),
            }
        }

        let event = self.pending.pop_front()?;
        self.deliver(&event);
        Some(event)
    }

    /// Adapt the run into a stream of events
    pub fn into_stream(self) -> impl Stream<Item = PipelineEvent> + Send + 'static {
        futures::stream::unfold(self, |mut run| async move {
            let event = run.next_event().await?;
            Some((event, run))
        })
    }

    /// Compute one transition and move to the next phase
    async fn advance(&mut self) -> AgentResult<Vec<PipelineEvent>> {
        let pipeline = &self.pipeline;
        let state = &mut self.state;

        let (next, events) = match (self.phase, pipeline.mode) {
            (Phase::Received, PipelineMode::Direct) => {
                let event = pipeline.executor.acknowledge(state).await?;
                (Phase::Acknowledged, vec![event])
            }
            (Phase::Received, _) => {
                let event = pipeline.planner.announce(state).await;
                (Phase::Announced, vec![event])
            }
            (Phase::Announced, _) => {
                let event = pipeline.planner.plan(state).await?;
                (Phase::Planned, vec![event])
            }
            (Phase::Planned, PipelineMode::Reviewed) => {
                let event = pipeline.reviewer.review(state).await?;
                if state.approved() == Some(true) {
                    (Phase::Approved, vec![event])
                } else {
                    warn!("Executor rejected the plan");
                    let marker = PipelineEvent::terminal(
                        Stage::System,
                        "Executor rejected the plan. Ending session.",
                        TerminalKind::Rejected,
                    );
                    (Phase::Finished, vec![event, marker])
                }
            }
            (Phase::Planned, _) | (Phase::Approved, _) => {
                let event = pipeline.executor.acknowledge(state).await?;
                (Phase::Acknowledged, vec![event])
            }
            (Phase::Acknowledged, _) => {
                let event = pipeline.executor.invocation_notice(state);
                (Phase::Invoking, vec![event])
            }
            (Phase::Invoking, _) => {
                let event = pipeline.executor.execute(state).await?;
                (Phase::Executed, vec![event])
            }
            (Phase::Executed, mode) => {
                let mut events = Vec::with_capacity(2);
                if mode != PipelineMode::Direct {
                    let result = state.result().ok_or_else(|| {
                        AgentError::contract_violation(Stage::System, "no result to share")
                    })?;
                    events.push(PipelineEvent::new(
                        Stage::System,
                        format!(
                            "Shared tool result: {}",
                            truncate_for_display(result, pipeline.display_budget)
                        ),
                    ));
                }
                events.push(PipelineEvent::terminal(
                    Stage::System,
                    "All agents finished.",
                    TerminalKind::Completed,
                ));
                (Phase::Finished, events)
            }
            (Phase::Finished, _) => (Phase::Finished, Vec::new()),
        };

        debug!(from = ?self.phase, to = ?next, events = events.len(), "Transition");
        self.phase = next;
        Ok(events)
    }

    fn fail(&mut self, err: AgentError) {
        self.span.in_scope(|| {
            error!(phase = ?self.phase, error = %err, "Pipeline stage failed");
        });
        self.phase = Phase::Finished;
        self.pending.clear();
        self.pending.push_back(PipelineEvent::terminal(
            Stage::System,
            format!("Stage failed: {}", err.client_message()),
            TerminalKind::Failed,
        ));
    }

    fn deliver(&mut self, event: &PipelineEvent) {
        metrics().event_emitted();
        let Some(kind) = event.terminal else {
            return;
        };

        self.terminal = Some(kind);
        let elapsed = self.started.elapsed();
        match kind {
            TerminalKind::Completed => metrics().run_completed(elapsed),
            TerminalKind::Rejected => metrics().run_rejected(elapsed),
            TerminalKind::Failed => metrics().run_failed(elapsed),
        }
        self.span.in_scope(|| {
            info!(
                outcome = ?kind,
                status = ?self.state.status(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Pipeline run finished"
            );
        });
    }

    fn mark_cancelled(&mut self) {
        if self.is_finished() {
            return;
        }
        self.cancelled = true;
        self.pending.clear();
        metrics().run_cancelled(self.started.elapsed());
        self.span
            .in_scope(|| info!(phase = ?self.phase, "Pipeline run cancelled"));
    }
}

impl Drop for PipelineRun {
    fn drop(&mut self) {
        // a client that disconnects mid-run drops the stream without cancelling
        self.mark_cancelled();
    }
}

impl fmt::Debug for PipelineRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRun")
            .field("mode", &self.pipeline.mode)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .field("terminal", &self.terminal)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
