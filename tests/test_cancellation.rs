//! Cancellation tests
//!
//! A cancelled run must stop at once, whatever it was suspended on, and
//! must never produce another event or touch the tool afterwards.

use agent_relay::agent::{AgentPipeline, PipelineMode, PipelineRun, RunStatus, TerminalKind};
use agent_relay::observability::metrics;
use agent_relay::testing::{MockTool, StalledClock};
use agent_relay::tools::ToolKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use test_helpers::{calculator_pipeline, drain, pipeline_with};

const GUARD: Duration = Duration::from_secs(5);

async fn wait_until(mut ready: impl FnMut() -> bool) {
    while !ready() {
        tokio::task::yield_now().await;
    }
}

async fn assert_stays_silent(run: &mut PipelineRun) {
    assert!(run.next_event().await.is_none());
    assert!(run.next_event().await.is_none());
    assert!(run.is_finished());
    assert_eq!(run.terminal(), None);
}

#[tokio::test]
async fn test_cancel_while_planner_is_thinking() {
    let clock = Arc::new(StalledClock::new());
    let tool = Arc::new(MockTool::succeeding(ToolKind::SummaryLookup, "summary"));
    let pipeline = AgentPipeline::new(PipelineMode::Reviewed, tool.clone(), clock.pacer(), 200);

    let token = CancellationToken::new();
    let mut run = pipeline.start("Alan_Turing", token.clone());

    let (event, _) = timeout(GUARD, async {
        tokio::join!(run.next_event(), async {
            wait_until(|| clock.entered() == 1).await;
            token.cancel();
        })
    })
    .await
    .expect("cancellation did not interrupt the suspended stage");

    assert!(event.is_none());
    assert_stays_silent(&mut run).await;
    assert_eq!(clock.entered(), 1);
    assert_eq!(tool.calls(), 0);
    assert!(run.state().plan().is_none());
    assert_eq!(run.state().status(), RunStatus::Pending);
}

#[tokio::test]
async fn test_cancel_during_hanging_tool_call() {
    let tool = Arc::new(MockTool::hanging(ToolKind::SummaryLookup));
    let pipeline = pipeline_with(PipelineMode::Planned, tool.clone());

    let token = CancellationToken::new();
    let mut run = pipeline.start("Alan_Turing", token.clone());

    for _ in 0..4 {
        assert!(run.next_event().await.is_some());
    }

    let (event, _) = timeout(GUARD, async {
        tokio::join!(run.next_event(), async {
            wait_until(|| tool.calls() == 1).await;
            token.cancel();
        })
    })
    .await
    .expect("cancellation did not interrupt the tool call");

    assert!(event.is_none());
    assert_stays_silent(&mut run).await;
    assert_eq!(tool.calls(), 1);
    assert!(run.state().result().is_none());
}

#[tokio::test]
async fn test_cancelled_before_first_pull_yields_nothing() {
    let tool = Arc::new(MockTool::succeeding(ToolKind::Calculator, "Result: 4"));
    let pipeline = pipeline_with(PipelineMode::Direct, tool.clone());

    let token = CancellationToken::new();
    token.cancel();
    let (events, run) = drain(pipeline.start("2+2", token)).await;

    assert!(events.is_empty());
    assert!(run.is_finished());
    assert_eq!(tool.calls(), 0);
}

#[tokio::test]
async fn test_cancel_discards_buffered_events() {
    let tool = Arc::new(MockTool::succeeding(ToolKind::SummaryLookup, "summary"));
    let pipeline = pipeline_with(PipelineMode::Reviewed, tool).with_planner(ToolKind::Calculator);

    let token = CancellationToken::new();
    let mut run = pipeline.start("Alan_Turing", token.clone());

    run.next_event().await.unwrap();
    run.next_event().await.unwrap();
    let review = run.next_event().await.unwrap();
    assert_eq!(review.message, "Rejected the plan.");

    // the end-of-session marker is already computed but not yet delivered
    token.cancel();
    assert_stays_silent(&mut run).await;
    assert_eq!(run.state().status(), RunStatus::Rejected);
}

#[tokio::test]
async fn test_cancel_after_terminal_changes_nothing() {
    let token = CancellationToken::new();
    let (events, mut run) = drain(
        calculator_pipeline(PipelineMode::Planned).start("2+2", token.clone()),
    )
    .await;

    token.cancel();
    assert!(run.next_event().await.is_none());
    assert_eq!(run.terminal(), Some(TerminalKind::Completed));
    assert_eq!(events.len(), 7);
}

#[tokio::test]
async fn test_shutdown_token_cancels_every_child_run() {
    let shutdown = CancellationToken::new();
    let clock = Arc::new(StalledClock::new());
    let tool = Arc::new(MockTool::succeeding(ToolKind::Calculator, "Result: 4"));
    let pipeline = AgentPipeline::new(PipelineMode::Planned, tool, clock.pacer(), 200);

    let mut first = pipeline.start("1+1", shutdown.child_token());
    let mut second = pipeline.start("2+2", shutdown.child_token());

    let (a, b, _) = timeout(GUARD, async {
        tokio::join!(first.next_event(), second.next_event(), async {
            wait_until(|| clock.entered() == 2).await;
            shutdown.cancel();
        })
    })
    .await
    .expect("shutdown did not reach the runs");

    assert!(a.is_none());
    assert!(b.is_none());
    assert!(first.is_finished());
    assert!(second.is_finished());
}

#[tokio::test]
async fn test_cancelling_one_run_leaves_siblings_alone() {
    let shutdown = CancellationToken::new();
    let pipeline = calculator_pipeline(PipelineMode::Direct);

    let doomed = shutdown.child_token();
    doomed.cancel();
    let (cancelled, _) = drain(pipeline.start("1+1", doomed)).await;
    let (survivor, run) = drain(pipeline.start("1+1", shutdown.child_token())).await;

    assert!(cancelled.is_empty());
    assert!(!shutdown.is_cancelled());
    assert_eq!(survivor.len(), 4);
    assert_eq!(run.terminal(), Some(TerminalKind::Completed));
}

#[tokio::test]
async fn test_dropping_a_run_counts_as_cancellation() {
    let before = metrics().get_metrics().runs.cancelled;

    let run = calculator_pipeline(PipelineMode::Reviewed).start("2+2", CancellationToken::new());
    drop(run);

    // other tests share the global collector
    assert!(metrics().get_metrics().runs.cancelled > before);
}
