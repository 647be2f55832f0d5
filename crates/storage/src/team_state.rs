// SPDX-License-Identifier: MIT

//! Persisted per-team cycle state (spec §6: `state/<team>.json`): the lead
//! agent's pid and start/stop timestamps, written atomically so the
//! supervisor's "is a cycle running" check survives a hot-reload that lost
//! its in-memory child handle (spec §4.E, §7).

use crate::atomic::{read_json, write_json_atomic};
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamState {
    pub lead_pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

pub struct TeamStateStore {
    home_dir: PathBuf,
}

impl TeamStateStore {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    fn path(&self, team: &str) -> PathBuf {
        self.home_dir.join("state").join(format!("{team}.json"))
    }

    pub fn read(&self, team: &str) -> Result<TeamState, StorageError> {
        Ok(read_json(&self.path(team))?.unwrap_or_default())
    }

    pub fn write(&self, team: &str, state: &TeamState) -> Result<(), StorageError> {
        write_json_atomic(&self.path(team), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TeamStateStore::new(dir.path().to_path_buf());

        assert!(store.read("demo").unwrap().lead_pid.is_none());

        let state = TeamState { lead_pid: Some(4242), started_at: Some(Utc::now()), stopped_at: None };
        store.write("demo", &state).unwrap();
        let read_back = store.read("demo").unwrap();
        assert_eq!(read_back.lead_pid, Some(4242));
        assert!(read_back.stopped_at.is_none());
    }
}
