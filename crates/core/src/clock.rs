// SPDX-License-Identifier: MIT

//! Clock abstraction for testable timestamps: a trait plus a `SystemClock`
//! and a `FakeClock` for deterministic tests of `updatedAt`/`createdAt`
//! ordering.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// A source of the current wall-clock time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for tests: time only moves when told to.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        *self.current.lock() += duration;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
