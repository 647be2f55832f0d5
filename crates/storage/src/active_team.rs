// SPDX-License-Identifier: MIT

//! Active-Team Registry (spec §4.G): a single small JSON marker file
//! recording which team's board is currently addressed.

use crate::atomic::{read_json, write_json_atomic};
use crate::error::StorageError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Marker {
    team_name: Option<String>,
}

pub struct ActiveTeamRegistry {
    path: PathBuf,
    cached: Mutex<Option<String>>,
}

impl ActiveTeamRegistry {
    /// Read the marker file on construction, so process restart rehydrates
    /// the active team (spec §3: "persisted ... to survive process restart").
    pub fn load(path: PathBuf) -> Result<Self, StorageError> {
        let marker: Marker = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, cached: Mutex::new(marker.team_name) })
    }

    pub fn get(&self) -> Option<String> {
        self.cached.lock().clone()
    }

    pub fn set(&self, team: Option<String>) -> Result<(), StorageError> {
        write_json_atomic(&self.path, &Marker { team_name: team.clone() })?;
        *self.cached.lock() = team;
        Ok(())
    }
}

#[cfg(test)]
#[path = "active_team_tests.rs"]
mod tests;
