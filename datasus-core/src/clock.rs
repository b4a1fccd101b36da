//! Time source for period selection and log timestamps.
//!
//! Everything that reads "now" goes through [`Clock`] so tests can pin the
//! instant and get reproducible periods and log lines.

use chrono::{Duration, NaiveDateTime};
use std::sync::Mutex;

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock pinned to a fixed instant. Each call advances it by `step` so log
/// entries stay strictly ordered.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<NaiveDateTime>,
    step: Duration,
}

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self::with_step(at, Duration::zero())
    }

    pub fn with_step(at: NaiveDateTime, step: Duration) -> Self {
        Self {
            current: Mutex::new(at),
            step,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        let at = *current;
        *current = at + self.step;
        at
    }
}
