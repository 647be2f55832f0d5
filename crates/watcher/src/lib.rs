// SPDX-License-Identifier: MIT
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Resilient Watcher (spec §4.B): watches a set of directories for change
//! events, survives directory deletion, and self-heals via a heartbeat.
//!
//! Bridges `notify::recommended_watcher`'s closure callback into an async
//! `Notify`-driven heartbeat task. `notify`'s inotify backend already
//! performs the "manual recursion: walk the tree and subscribe to each
//! subdirectory individually" spec §4.B calls for on platforms without
//! native recursive watching, so `RecursiveMode::Recursive` is passed
//! straight through.

use notify::{Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

pub struct WatcherConfig {
    pub directories: Vec<PathBuf>,
    /// `None` disables the heartbeat (spec: `heartbeatTimeoutMs = 0`).
    pub heartbeat_timeout: Option<Duration>,
    pub recursive: bool,
}

struct Shared {
    directories: Vec<PathBuf>,
    recursive: bool,
    on_change: Box<dyn Fn() + Send + Sync>,
    reinit_count: AtomicU64,
    watcher: parking_lot::Mutex<Option<RecommendedWatcher>>,
    notify: Arc<Notify>,
}

fn ensure_directories(dirs: &[PathBuf]) -> std::io::Result<()> {
    for dir in dirs {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn subscribe(shared: &Arc<Shared>) -> notify::Result<RecommendedWatcher> {
    let shared_cb = shared.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<NotifyEvent>| {
        if res.is_ok() {
            // "Exceptions thrown by onChange are caught and dropped" (spec
            // §4.B): a panicking callback must not take the watcher thread
            // down with it.
            let on_change = &shared_cb.on_change;
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| on_change()));
            shared_cb.notify.notify_one();
        }
    })?;
    let mode = if shared.recursive { RecursiveMode::Recursive } else { RecursiveMode::NonRecursive };
    for dir in &shared.directories {
        watcher.watch(dir, mode)?;
    }
    Ok(watcher)
}

fn reinit(shared: &Arc<Shared>) {
    if let Err(e) = ensure_directories(&shared.directories) {
        tracing::warn!(error = %e, "resilient watcher failed to recreate directories");
        return;
    }
    match subscribe(shared) {
        Ok(watcher) => {
            *shared.watcher.lock() = Some(watcher);
            shared.reinit_count.fetch_add(1, Ordering::SeqCst);
            tracing::info!("resilient watcher re-subscribed after heartbeat expiry");
        }
        Err(e) => tracing::warn!(error = %e, "resilient watcher failed to re-subscribe"),
    }
}

/// Watches a set of directories, re-creating and re-subscribing whenever
/// they disappear out from under it.
pub struct ResilientWatcher {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    heartbeat_timeout: Option<Duration>,
    heartbeat_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ResilientWatcher {
    pub fn new(config: WatcherConfig, on_change: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                directories: config.directories,
                recursive: config.recursive,
                on_change: Box::new(on_change),
                reinit_count: AtomicU64::new(0),
                watcher: parking_lot::Mutex::new(None),
                notify: Arc::new(Notify::new()),
            }),
            cancel: CancellationToken::new(),
            heartbeat_timeout: config.heartbeat_timeout,
            heartbeat_task: parking_lot::Mutex::new(None),
        }
    }

    /// Number of times the watcher has had to tear down and re-subscribe.
    pub fn reinit_count(&self) -> u64 {
        self.shared.reinit_count.load(Ordering::SeqCst)
    }

    /// Manually reset the heartbeat timer (spec §4.B).
    pub fn heartbeat(&self) {
        self.shared.notify.notify_one();
    }

    pub async fn start(&self) -> Result<(), WatcherError> {
        ensure_directories(&self.shared.directories)?;
        let watcher = subscribe(&self.shared)?;
        *self.shared.watcher.lock() = Some(watcher);

        if let Some(timeout) = self.heartbeat_timeout {
            let shared = self.shared.clone();
            let cancel = self.cancel.clone();
            let handle = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = shared.notify.notified() => continue,
                        _ = tokio::time::sleep(timeout) => reinit(&shared),
                    }
                }
            });
            *self.heartbeat_task.lock() = Some(handle);
        }
        Ok(())
    }

    /// Idempotent: cancels the heartbeat task and drops the subscription.
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.heartbeat_task.lock().take() {
            handle.abort();
        }
        *self.shared.watcher.lock() = None;
    }
}

impl Drop for ResilientWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
