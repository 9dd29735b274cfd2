//! Injectable delay source for simulated stage latency
//!
//! Every stage "thinks" for a fixed window before producing output. The
//! delay goes through the [`Clock`] trait so tests can drive a full pipeline
//! without waiting on the wall clock.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Source of suspension points for pipeline stages
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend the calling task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock plus the per-stage think time, shared by every stage of a pipeline
#[derive(Clone)]
pub struct Pacer {
    clock: Arc<dyn Clock>,
    think_time: Duration,
}

impl Pacer {
    pub fn new(clock: Arc<dyn Clock>, think_time: Duration) -> Self {
        Self { clock, think_time }
    }

    /// Pacer that never suspends
    pub fn immediate() -> Self {
        Self::new(Arc::new(TokioClock), Duration::ZERO)
    }

    pub fn think_time(&self) -> Duration {
        self.think_time
    }

    /// Wait out one think-time window
    pub async fn think(&self) {
        if !self.think_time.is_zero() {
            self.clock.sleep(self.think_time).await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("think_time", &self.think_time)
            .finish_non_exhaustive()
    }
}
