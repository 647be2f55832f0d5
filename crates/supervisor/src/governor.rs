// SPDX-License-Identifier: MIT

//! Turn Governor (spec §4.D): enforces a per-session turn budget across
//! cycles and fires warning/exhaustion callbacks exactly once per epoch.

use parking_lot::Mutex;

struct Counters {
    used: i64,
    max: i64,
    warning_fired: bool,
    exhausted_fired: bool,
}

pub struct TurnGovernor {
    counters: Mutex<Counters>,
    warning_threshold: f64,
    on_budget_warning: Box<dyn Fn(i64, i64) + Send + Sync>,
    on_budget_exhausted: Box<dyn Fn(i64, i64) + Send + Sync>,
}

impl TurnGovernor {
    pub fn new(
        max_turns: i64,
        warning_threshold: Option<f64>,
        on_budget_warning: impl Fn(i64, i64) + Send + Sync + 'static,
        on_budget_exhausted: impl Fn(i64, i64) + Send + Sync + 'static,
    ) -> Self {
        Self {
            counters: Mutex::new(Counters {
                used: 0,
                max: max_turns,
                warning_fired: false,
                exhausted_fired: false,
            }),
            warning_threshold: warning_threshold.unwrap_or(0.1),
            on_budget_warning: Box::new(on_budget_warning),
            on_budget_exhausted: Box::new(on_budget_exhausted),
        }
    }

    /// Record `n` turns consumed. Returns `false` once `used >= max` after
    /// the update. `onBudgetExhausted` fires exactly once per epoch, on the
    /// transition into exhaustion.
    pub fn record_turns(&self, n: i64) -> bool {
        let mut c = self.counters.lock();
        let was_exhausted = c.used >= c.max;
        c.used += n;

        let remaining_fraction = if c.max > 0 {
            (c.max - c.used) as f64 / c.max as f64
        } else {
            0.0
        };
        if !c.warning_fired && remaining_fraction <= self.warning_threshold {
            c.warning_fired = true;
            (self.on_budget_warning)(c.used, c.max);
        }

        let now_exhausted = c.used >= c.max;
        if now_exhausted && !was_exhausted && !c.exhausted_fired {
            c.exhausted_fired = true;
            (self.on_budget_exhausted)(c.used, c.max);
        }
        !now_exhausted
    }

    /// The per-cycle cap handed to the child process (spec §4.D).
    pub fn allocate_cycle_budget(&self, per_cycle_cap: i64) -> i64 {
        let c = self.counters.lock();
        (c.max - c.used).clamp(0, per_cycle_cap.max(0))
    }

    pub fn can_spawn(&self) -> bool {
        let c = self.counters.lock();
        c.used < c.max
    }

    pub fn used(&self) -> i64 {
        self.counters.lock().used
    }

    pub fn max(&self) -> i64 {
        self.counters.lock().max
    }

    /// Zero counters and re-arm both one-shot callbacks.
    pub fn reset(&self) {
        let mut c = self.counters.lock();
        c.used = 0;
        c.warning_fired = false;
        c.exhausted_fired = false;
    }
}

#[cfg(test)]
#[path = "governor_tests.rs"]
mod tests;
