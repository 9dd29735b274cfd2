//! HTTP transport: SSE framing and the warp server

pub mod server;
pub mod sse;

pub use server::{bind, routes, serve, sse_routes, RelayRoute, RelayState, TaskQuery, SERVICE_NAME};
pub use sse::{EventEmitter, END_MARKER};
