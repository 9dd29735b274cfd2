//! Server-Sent Events framing for pipeline runs

use crate::agent::pipeline::PipelineRun;
use crate::observability::metrics;
use futures::{stream, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::sync::DropGuard;
use tracing::debug;
use warp::Reply;

/// Payload of the last event of every run that reached a terminal item
pub const END_MARKER: &str = "[END]";

/// Streams one run to one client
///
/// Each pipeline event becomes one `data:` frame, followed by a final
/// `[END]` frame once the run has produced its terminal item. A cancelled
/// run closes the stream without `[END]`. Dropping the stream cancels the
/// run's token, which drops whatever stage was in flight.
#[derive(Debug)]
pub struct EventEmitter {
    run: PipelineRun,
    keep_alive: Duration,
}

struct FrameState {
    run: PipelineRun,
    _cancel_on_drop: DropGuard,
}

impl EventEmitter {
    pub fn new(run: PipelineRun, keep_alive: Duration) -> Self {
        Self { run, keep_alive }
    }

    /// Frame payloads in wire order
    pub fn frames(self) -> impl Stream<Item = String> + Send + 'static {
        metrics().stream_opened();
        let guard = self.run.cancellation_token().clone().drop_guard();
        let state = FrameState {
            run: self.run,
            _cancel_on_drop: guard,
        };

        stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            match state.run.next_event().await {
                Some(event) => {
                    let frame = normalize_line_breaks(&event.to_string());
                    Some((frame, Some(state)))
                }
                None if state.run.terminal().is_some() => {
                    debug!("Sending end marker");
                    Some((END_MARKER.to_string(), None))
                }
                None => None,
            }
        })
    }

    /// `text/event-stream` reply with keep-alive comments between frames
    pub fn into_reply(self) -> impl Reply {
        let keep_alive = self.keep_alive;
        let events = self
            .frames()
            .map(|frame| Ok::<_, Infallible>(warp::sse::Event::default().data(frame)));

        warp::sse::reply(warp::sse::keep_alive().interval(keep_alive).stream(events))
    }
}

/// Rewrite `\r\n` and bare `\r` as `\n`
///
/// warp splits frame data on `\n` only, while SSE clients also end a line
/// at a bare `\r`.
fn normalize_line_breaks(payload: &str) -> String {
    if !payload.contains('\r') {
        return payload.to_string();
    }
    payload.replace("\r\n", "\n").replace('\r', "\n")
}
