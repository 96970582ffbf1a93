//! Response classification and backoff schedule.
//!
//! Both are pure: the executor decides what to do with an attempt by calling
//! `classify`, and asks `Backoff` how long to wait, without either touching
//! the network or the clock.

use std::time::Duration;

/// Status recorded for attempts that never produced a readable response.
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// How an attempt's status code affects the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Below 400.
    Success,
    /// 500 and above; another attempt may succeed.
    Retryable,
    /// 400 to 499; retrying will not help.
    Fatal,
}

pub fn classify(status: u16) -> Classification {
    match status {
        0..=399 => Classification::Success,
        400..=499 => Classification::Fatal,
        _ => Classification::Retryable,
    }
}

/// Linear backoff: one unit, then two, then three, ...
#[derive(Debug, Clone)]
pub struct Backoff {
    unit: Duration,
    step: u32,
}

impl Backoff {
    pub fn new(unit: Duration) -> Self {
        Self { unit, step: 1 }
    }

    /// The delay to sleep now. Advances the schedule by one unit.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.unit.saturating_mul(self.step);
        self.step = self.step.saturating_add(1);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
