// SPDX-License-Identifier: MIT

use clap::Parser;

/// clamband: local orchestration server for the agent Kanban board.
#[derive(Debug, Parser)]
#[command(name = "clamband", version)]
pub struct Args {
    /// Override the HTTP listen port (defaults to `CLAMBAN_PORT` or 4317).
    #[arg(long)]
    pub port: Option<u16>,
}

impl Args {
    pub fn parse_from_env() -> Self {
        Self::parse()
    }
}
