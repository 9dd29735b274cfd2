//! Observability: structured logging, metrics and health endpoints

pub mod health;
pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use health::HealthEndpoints;
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{run_span, stage_span, tool_span};
