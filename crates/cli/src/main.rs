// SPDX-License-Identifier: MIT

//! clamband: the resident orchestration server binary.
//!
//! Wires the Board Store, Active-Team Registry, Log Tail Store, Resilient
//! Watcher, Cycle Supervisor, and HTTP/SSE surface together into one
//! process.

mod args;
mod logging;

use clamban_core::{Config, SystemClock};
use clamban_server::{build_app, AppState};
use clamban_storage::{ActiveTeamRegistry, BoardStore, LogTailStore, TeamStateStore};
use clamban_supervisor::{CycleSupervisor, SupervisorObservers};
use clamban_watcher::{ResilientWatcher, WatcherConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = args::Args::parse_from_env();
    let config = Config::default();
    std::fs::create_dir_all(&config.home_dir)?;

    let _log_guard = logging::init(&config)?;
    tracing::info!(home = %config.home_dir.display(), port = config.port, "starting clamband");

    let active_team = Arc::new(ActiveTeamRegistry::load(config.active_team_path())?);
    let board_store =
        Arc::new(BoardStore::new(config.home_dir.clone(), active_team.clone(), SystemClock));
    let log_tail = Arc::new(LogTailStore::new(config.home_dir.clone()));
    let team_state = Arc::new(TeamStateStore::new(config.home_dir.clone()));

    let (supervisor, supervisor_handle) = CycleSupervisor::new(
        SupervisorObservers {
            on_log: {
                let log_tail = log_tail.clone();
                Box::new(move |team, line| {
                    if let Err(e) = log_tail.append(team, line) {
                        tracing::warn!(team, error = %e, "failed to append cycle log line");
                    }
                })
            },
            on_exit: Box::new(|team| tracing::info!(team, "cycle supervisor exited")),
        },
        team_state.clone(),
    );
    tokio::spawn(supervisor.run());

    let state = AppState {
        config: Arc::new(config.clone()),
        board_store,
        active_team,
        log_tail,
        team_state,
        sse: Arc::new(clamban_server::SseHub::new()),
        supervisor: supervisor_handle,
    };

    let sse_for_watcher = state.sse.clone();
    let supervisor_for_watcher = state.supervisor.clone();
    let watcher = ResilientWatcher::new(
        WatcherConfig {
            directories: vec![config.teams_dir.clone()],
            heartbeat_timeout: Some(Duration::from_secs(30)),
            recursive: true,
        },
        move || {
            let sse = sse_for_watcher.clone();
            let supervisor = supervisor_for_watcher.clone();
            tokio::spawn(async move {
                sse.broadcast(clamban_server::BoardEvent::TeamChanged).await;
                if let Err(e) = supervisor.notify_board_changed().await {
                    tracing::warn!(error = %e, "failed to notify supervisor of team-dir change");
                }
            });
        },
    );
    watcher.start().await?;

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port.unwrap_or(config.port))).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    watcher.stop();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received sigterm, shutting down"),
    }
}
