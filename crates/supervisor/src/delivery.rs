// SPDX-License-Identifier: MIT

//! Event Delivery (spec §4.C): invoke an action with bounded retries and
//! exponential backoff, optionally gated by a confirmation predicate.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct EventDelivery {
    max_retries: u32,
    base_delay: Duration,
    delivered_count: AtomicU64,
    failed_count: AtomicU64,
}

impl EventDelivery {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            delivered_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
        }
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::SeqCst)
    }

    /// Run `action` up to `max_retries + 1` times total. If `confirm` is
    /// given, a successful `action` still counts as unconfirmed unless
    /// `confirm` also returns true; unconfirmed attempts consume retries
    /// identically to a failing action (spec §4.C). No delay follows the
    /// final attempt.
    pub async fn deliver<A, AFut, C, CFut>(&self, mut action: A, mut confirm: Option<C>) -> bool
    where
        A: FnMut() -> AFut,
        AFut: Future<Output = bool>,
        C: FnMut() -> CFut,
        CFut: Future<Output = bool>,
    {
        for attempt in 0..=self.max_retries {
            let action_ok = action().await;
            let confirmed = match (&mut confirm, action_ok) {
                (_, false) => false,
                (Some(confirm), true) => confirm().await,
                (None, true) => true,
            };
            if confirmed {
                self.delivered_count.fetch_add(1, Ordering::SeqCst);
                return true;
            }
            if attempt < self.max_retries {
                let delay = self.base_delay * 2_u32.pow(attempt);
                tokio::time::sleep(delay).await;
            }
        }
        self.failed_count.fetch_add(1, Ordering::SeqCst);
        false
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
