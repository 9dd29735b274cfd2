//! HTTP server: SSE routes, health routes and graceful shutdown

use crate::agent::pipeline::{AgentPipeline, PipelineMode, PipelineRun};
use crate::clock::{Clock, Pacer, TokioClock};
use crate::config::RelayConfig;
use crate::error::{AgentError, AgentResult};
use crate::observability::HealthEndpoints;
use crate::tools::{Calculator, SummaryLookupTool, ToolInvoker, ToolKind};
use crate::transport::sse::EventEmitter;
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Reply};

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "agent-relay";

/// The three streaming endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRoute {
    /// `/sse`
    Direct,
    /// `/sse/planner`
    Planner,
    /// `/sse/lookup`
    Lookup,
}

impl RelayRoute {
    pub fn path(&self) -> &'static str {
        match self {
            RelayRoute::Direct => "/sse",
            RelayRoute::Planner => "/sse/planner",
            RelayRoute::Lookup => "/sse/lookup",
        }
    }
}

/// Query string accepted by every streaming endpoint
#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub task: Option<String>,
}

/// Pipelines behind each route, plus the server-wide shutdown token
#[derive(Debug, Clone)]
pub struct RelayState {
    direct: AgentPipeline,
    planner: AgentPipeline,
    lookup: AgentPipeline,
    keep_alive: Duration,
    shutdown: CancellationToken,
}

impl RelayState {
    /// Wire the production tools from configuration
    pub fn new(
        config: &RelayConfig,
        clock: Arc<dyn Clock>,
        shutdown: CancellationToken,
    ) -> AgentResult<Self> {
        let pacer = Pacer::new(clock, config.pipeline.think_time());
        let budget = config.pipeline.display_budget;
        let calculator: Arc<dyn ToolInvoker> = Arc::new(Calculator::new());
        let lookup: Arc<dyn ToolInvoker> = Arc::new(SummaryLookupTool::new(&config.lookup)?);

        Ok(Self {
            direct: AgentPipeline::new(PipelineMode::Direct, calculator.clone(), pacer.clone(), budget),
            planner: AgentPipeline::new(PipelineMode::Planned, calculator, pacer.clone(), budget),
            lookup: AgentPipeline::new(PipelineMode::Reviewed, lookup, pacer, budget),
            keep_alive: config.keep_alive(),
            shutdown,
        })
    }

    /// Assemble state from prebuilt pipelines
    pub fn from_pipelines(
        direct: AgentPipeline,
        planner: AgentPipeline,
        lookup: AgentPipeline,
        keep_alive: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            direct,
            planner,
            lookup,
            keep_alive,
            shutdown,
        }
    }

    pub fn pipeline(&self, route: RelayRoute) -> &AgentPipeline {
        match route {
            RelayRoute::Direct => &self.direct,
            RelayRoute::Planner => &self.planner,
            RelayRoute::Lookup => &self.lookup,
        }
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Start a run for a request; an absent or empty task uses the route's default
    pub fn start_run(&self, route: RelayRoute, task: Option<String>) -> PipelineRun {
        let pipeline = self.pipeline(route);
        let task = resolve_task(task, pipeline.tool_kind());
        pipeline.start(task, self.shutdown.child_token())
    }

    fn stream(&self, route: RelayRoute, query: TaskQuery) -> Response {
        let run = self.start_run(route, query.task);
        EventEmitter::new(run, self.keep_alive)
            .into_reply()
            .into_response()
    }
}

fn resolve_task(task: Option<String>, kind: ToolKind) -> String {
    task.filter(|task| !task.is_empty())
        .unwrap_or_else(|| kind.default_task().to_string())
}

fn with_state(
    state: RelayState,
) -> impl Filter<Extract = (RelayState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `GET /sse`, `/sse/planner` and `/sse/lookup`
pub fn sse_routes(state: RelayState) -> BoxedFilter<(Response,)> {
    let direct = warp::path("sse")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<TaskQuery>())
        .and(with_state(state.clone()))
        .map(|query: TaskQuery, state: RelayState| state.stream(RelayRoute::Direct, query));

    let planner = warp::path!("sse" / "planner")
        .and(warp::get())
        .and(warp::query::<TaskQuery>())
        .and(with_state(state.clone()))
        .map(|query: TaskQuery, state: RelayState| state.stream(RelayRoute::Planner, query));

    let lookup = warp::path!("sse" / "lookup")
        .and(warp::get())
        .and(warp::query::<TaskQuery>())
        .and(with_state(state))
        .map(|query: TaskQuery, state: RelayState| state.stream(RelayRoute::Lookup, query));

    direct.or(planner).unify().or(lookup).unify().boxed()
}

/// Every route the relay serves
pub fn routes(state: RelayState, health: Arc<HealthEndpoints>) -> BoxedFilter<(Response,)> {
    sse_routes(state).or(health.routes()).unify().boxed()
}

/// Bind the listener; the returned future runs until the shutdown token fires
pub fn bind(
    addr: SocketAddr,
    state: RelayState,
    health: Arc<HealthEndpoints>,
) -> AgentResult<(SocketAddr, impl Future<Output = ()> + 'static)> {
    let shutdown = state.shutdown_token().clone();
    let drain_health = health.clone();
    let drain = async move {
        shutdown.cancelled().await;
        drain_health.set_accepting(false);
        info!("Shutdown requested, draining open streams");
    };

    warp::serve(routes(state, health).with(warp::trace::request()))
        .try_bind_with_graceful_shutdown(addr, drain)
        .map_err(|e| AgentError::transport_error(format!("failed to bind {addr}: {e}")))
}

/// Run the relay until `shutdown` is cancelled
pub async fn serve(config: &RelayConfig, shutdown: CancellationToken) -> AgentResult<()> {
    let addr = config.socket_addr()?;
    let state = RelayState::new(config, Arc::new(TokioClock), shutdown)?;
    let health = Arc::new(HealthEndpoints::new(SERVICE_NAME));

    let (bound, server) = bind(addr, state, health)?;
    info!(
        address = %bound,
        think_time_ms = config.pipeline.think_time_ms,
        lookup_endpoint = %config.lookup.endpoint,
        "Relay listening"
    );

    server.await;
    info!("Relay stopped");
    Ok(())
}
