// SPDX-License-Identifier: MIT

//! Board Store (spec §4.A): atomic read/write of the single JSON board
//! document for whichever team is currently active.

use crate::active_team::ActiveTeamRegistry;
use crate::atomic::{read_json, write_json_atomic};
use crate::error::StorageError;
use clamban_core::{Board, Clock};
use std::path::PathBuf;
use std::sync::Arc;

pub struct BoardStore<C: Clock> {
    home_dir: PathBuf,
    active_team: Arc<ActiveTeamRegistry>,
    clock: C,
}

impl<C: Clock> BoardStore<C> {
    pub fn new(home_dir: PathBuf, active_team: Arc<ActiveTeamRegistry>, clock: C) -> Self {
        Self { home_dir, active_team, clock }
    }

    /// Path of the board file the active team (or the fallback board)
    /// currently resolves to.
    pub fn board_path(&self) -> PathBuf {
        match self.active_team.get() {
            Some(team) => self.home_dir.join("boards").join(format!("{team}.json")),
            None => self.home_dir.join("board.json"),
        }
    }

    pub fn get_active_team(&self) -> Option<String> {
        self.active_team.get()
    }

    pub fn set_active_team(&self, team: Option<String>) -> Result<(), StorageError> {
        self.active_team.set(team)
    }

    /// Read the current board, materializing a default one on disk if none
    /// exists yet (spec §4.A: "missing file is not an error").
    pub fn read(&self) -> Result<Board, StorageError> {
        let path = self.board_path();
        match read_json::<Board>(&path)? {
            Some(board) => {
                if board.meta.schema_version > clamban_core::board::CURRENT_SCHEMA_VERSION {
                    tracing::warn!(
                        version = board.meta.schema_version,
                        "board schema version is newer than this build supports"
                    );
                }
                Ok(board)
            }
            None => {
                let name = self.active_team.get().unwrap_or_else(|| "default".to_string());
                let board = Board::new(name, self.clock.now());
                write_json_atomic(&path, &board)?;
                Ok(board)
            }
        }
    }

    /// Atomically replace the board file (spec §4.A: never written in place).
    pub fn write(&self, board: &Board) -> Result<(), StorageError> {
        write_json_atomic(&self.board_path(), board)
    }
}

#[cfg(test)]
#[path = "board_store_tests.rs"]
mod tests;
