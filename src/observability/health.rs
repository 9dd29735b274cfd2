//! Health and metrics HTTP endpoints
//!
//! Served on the same listener as the event streams. `/health` reports 503
//! once the server has started draining for shutdown.

use crate::observability::metrics::metrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

/// Health state plus the warp routes that expose it
#[derive(Debug)]
pub struct HealthEndpoints {
    service: String,
    accepting: AtomicBool,
}

impl HealthEndpoints {
    pub fn new<S: Into<String>>(service: S) -> Self {
        Self {
            service: service.into(),
            accepting: AtomicBool::new(true),
        }
    }

    /// Mark whether new runs are being accepted
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::Relaxed);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Relaxed)
    }

    /// `GET /health`, `/live`, `/metrics` and `/`
    pub fn routes(self: Arc<Self>) -> BoxedFilter<(Response,)> {
        let health_state = self.clone();
        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || {
                let status = health_state.health_status();
                let code = if status.status == "healthy" {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                warp::reply::with_status(warp::reply::json(&status), code).into_response()
            });

        // Liveness only says the process answers
        let live_route = warp::path("live")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                warp::reply::json(&LivenessResponse {
                    alive: true,
                    timestamp: current_timestamp(),
                })
                .into_response()
            });

        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&metrics().get_metrics()).into_response());

        let root_route = warp::path::end().and(warp::get()).map(|| {
            let endpoints = BTreeMap::from([
                ("/sse", "Single agent with the calculator tool (?task=)"),
                ("/sse/planner", "Planner and executor with the calculator tool (?task=)"),
                ("/sse/lookup", "Planner, review and executor with the summary lookup tool (?task=)"),
                ("/health", "Overall health status with detailed checks"),
                ("/live", "Liveness probe"),
                ("/metrics", "Run, event and tool statistics"),
            ]);
            warp::reply::json(&ApiDocumentationResponse { endpoints }).into_response()
        });

        health_route
            .or(live_route)
            .unify()
            .or(metrics_route)
            .unify()
            .or(root_route)
            .unify()
            .boxed()
    }

    fn health_status(&self) -> HealthStatus {
        let now = current_timestamp();
        let snapshot = metrics().get_metrics();

        let mut checks = BTreeMap::new();
        checks.insert("server".to_string(), self.check_server(now));
        checks.insert(
            "runs".to_string(),
            HealthCheck {
                status: "healthy".to_string(),
                message: Some(format!("{} active runs", snapshot.runs.active)),
                last_check: now,
            },
        );

        let healthy = checks.values().all(|check| check.status == "healthy");
        HealthStatus {
            status: if healthy { "healthy" } else { "unavailable" }.to_string(),
            timestamp: now,
            service: self.service.clone(),
            uptime_seconds: snapshot.uptime_seconds,
            active_runs: snapshot.runs.active,
            checks,
        }
    }

    fn check_server(&self, now: u64) -> HealthCheck {
        if self.is_accepting() {
            HealthCheck {
                status: "healthy".to_string(),
                message: Some("Accepting new runs".to_string()),
                last_check: now,
            }
        } else {
            HealthCheck {
                status: "draining".to_string(),
                message: Some("Shutting down, in-flight runs are being cancelled".to_string()),
                last_check: now,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: Option<String>,
    pub last_check: u64,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: String,
    timestamp: u64,
    service: String,
    uptime_seconds: u64,
    active_runs: u64,
    checks: BTreeMap<String, HealthCheck>,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct ApiDocumentationResponse {
    endpoints: BTreeMap<&'static str, &'static str>,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
