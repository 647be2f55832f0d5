// SPDX-License-Identifier: MIT

use crate::sse::SseHub;
use clamban_core::{Config, SystemClock};
use clamban_storage::{ActiveTeamRegistry, BoardStore, LogTailStore, TeamStateStore};
use clamban_supervisor::SupervisorHandle;
use std::sync::Arc;

/// Shared application state handed to every route (spec §4.F). Production
/// always runs on the real system clock; tests exercise clock-dependent
/// invariants at the storage-crate level instead of threading a fake clock
/// through the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub board_store: Arc<BoardStore<SystemClock>>,
    pub active_team: Arc<ActiveTeamRegistry>,
    pub log_tail: Arc<LogTailStore>,
    pub team_state: Arc<TeamStateStore>,
    pub sse: Arc<SseHub>,
    pub supervisor: SupervisorHandle,
}
