// SPDX-License-Identifier: MIT

//! Centralized environment variable access: one place that knows the env
//! var names and their defaults.

use std::path::PathBuf;

/// Resolve the clamban home directory: `CLAMBAN_HOME` > `~/.clamban`.
pub fn home_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLAMBAN_HOME") {
        return PathBuf::from(dir);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".clamban")
}

/// HTTP listen port: `CLAMBAN_PORT` > 4317.
pub fn port() -> u16 {
    std::env::var("CLAMBAN_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(4317)
}

/// External team directory (read-only): `CLAMBAN_TEAMS_DIR` > `~/.claude/teams`.
pub fn teams_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLAMBAN_TEAMS_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".claude/teams")
}

/// Default agent model when a team config doesn't specify one.
pub fn default_agent_model() -> String {
    std::env::var("CLAMBAN_AGENT_MODEL").unwrap_or_else(|_| "claude-sonnet-4-5".to_string())
}

/// The command used to invoke the external agent lead process.
pub fn agent_command() -> String {
    std::env::var("CLAMBAN_AGENT_COMMAND").unwrap_or_else(|_| "claude".to_string())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub home_dir: PathBuf,
    pub port: u16,
    pub teams_dir: PathBuf,
    pub agent_command: String,
    pub default_agent_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_dir: home_dir(),
            port: port(),
            teams_dir: teams_dir(),
            agent_command: agent_command(),
            default_agent_model: default_agent_model(),
        }
    }
}

impl Config {
    pub fn board_path(&self) -> PathBuf {
        self.home_dir.join("board.json")
    }

    pub fn team_board_path(&self, team: &str) -> PathBuf {
        self.home_dir.join("boards").join(format!("{team}.json"))
    }

    pub fn active_team_path(&self) -> PathBuf {
        self.home_dir.join("active-team.json")
    }

    pub fn team_state_path(&self, team: &str) -> PathBuf {
        self.home_dir.join("state").join(format!("{team}.json"))
    }

    pub fn team_log_path(&self, team: &str) -> PathBuf {
        self.home_dir.join("logs").join(format!("{team}.log"))
    }
}
