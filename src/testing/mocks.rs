//! Mock implementations for testing
//!
//! Provides a scripted `ToolInvoker` and two `Clock` implementations: one
//! that returns immediately and one that never returns.

use crate::clock::{Clock, Pacer};
use crate::tools::{Outcome, ToolInvoker, ToolKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock tool returning a fixed outcome
#[derive(Debug)]
pub struct MockTool {
    kind: ToolKind,
    outcome: Outcome,
    delay: Option<Duration>,
    hang: bool,
    calls: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl MockTool {
    pub fn new(kind: ToolKind, outcome: Outcome) -> Self {
        Self {
            kind,
            outcome,
            delay: None,
            hang: false,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding<S: Into<String>>(kind: ToolKind, text: S) -> Self {
        Self::new(kind, Outcome::success(text))
    }

    pub fn failing<S: Into<String>>(kind: ToolKind, reason: S) -> Self {
        Self::new(kind, Outcome::failure(reason))
    }

    /// Tool whose invocation never completes
    pub fn hanging(kind: ToolKind) -> Self {
        Self {
            hang: true,
            ..Self::succeeding(kind, "unreachable")
        }
    }

    /// Sleep on the tokio timer before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of invocations started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs
            .lock()
            .map(|inputs| inputs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ToolInvoker for MockTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    async fn invoke(&self, input: &str) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(input.to_string());
        }

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

/// Clock that records each requested sleep and returns at once
#[derive(Debug, Default)]
pub struct InstantClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|sleeps| sleeps.clone())
            .unwrap_or_default()
    }

    /// Pacer over this clock with a non-zero think time, so every sleep is recorded
    pub fn pacer(self: &Arc<Self>, think_time: Duration) -> Pacer {
        Pacer::new(self.clone(), think_time)
    }
}

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Clock whose sleeps never finish
#[derive(Debug, Default)]
pub struct StalledClock {
    entered: AtomicUsize,
}

impl StalledClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sleeps currently parked on this clock
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn pacer(self: &Arc<Self>) -> Pacer {
        Pacer::new(self.clone(), Duration::from_millis(1))
    }
}

#[async_trait]
impl Clock for StalledClock {
    async fn sleep(&self, _duration: Duration) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
    }
}
