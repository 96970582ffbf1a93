//! Per-call context: trace id, deadline and cancellation.
//!
//! # Design
//! The trace id travels as an explicit value rather than through ambient
//! state. Cancellation is a cloneable token that another thread can trip;
//! backoff sleeps wait on it through a condition variable, so a cancelled
//! call wakes immediately instead of finishing its sleep.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

#[derive(Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// A shareable flag that aborts pending attempts and backoff sleeps.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.state.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for `duration` or until cancelled. Returns `true` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let cancelled = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = self
            .state
            .condvar
            .wait_timeout_while(cancelled, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Context threaded through one `Executor` call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    trace_id: Option<String>,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propagate `trace_id` as the `X-Trace-Id` header.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Start a new trace with a random id.
    pub fn with_new_trace_id(self) -> Self {
        self.with_trace_id(Uuid::new_v4().to_string())
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Time left before the deadline. `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the call should stop: cancelled, or the deadline has passed.
    pub fn is_done(&self) -> bool {
        self.cancellation.is_cancelled() || self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Sleep between attempts. Returns `false` without sleeping the full
    /// duration when the call is cancelled or the deadline falls inside the
    /// sleep.
    pub(crate) fn wait(&self, duration: Duration) -> bool {
        if let Some(remaining) = self.remaining() {
            if duration >= remaining {
                return false;
            }
        }
        !self.cancellation.sleep(duration)
    }
}
