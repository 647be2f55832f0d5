// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Shared errors surfaced by the data model itself (validation concerns
/// that don't belong to a single crate).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("path escapes project directory: {0}")]
    PathEscape(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),
}
