// SPDX-License-Identifier: MIT

//! Opaque, newtype task identifiers.
//!
//! Ids are generated once, treated as opaque strings everywhere else, and
//! never parsed for meaning.

use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A task's unique, opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(nanoid!(12))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
