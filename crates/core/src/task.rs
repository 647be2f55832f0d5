// SPDX-License-Identifier: MIT

//! Task and its nested value types.

use crate::ids::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Task,
    Bug,
    Feature,
    Chore,
}

/// A ref's relationship kind, as stored on the task that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefType {
    Related,
    Blocks,
    BlockedBy,
    Parent,
    Child,
}

impl RefType {
    /// The mirrored ref type that must exist on the target task.
    ///
    /// Invariant 1 (spec §3): adding/removing a ref is a two-sided
    /// operation; the store applies both sides or none.
    pub fn inverse(self) -> RefType {
        match self {
            RefType::Related => RefType::Related,
            RefType::Blocks => RefType::BlockedBy,
            RefType::BlockedBy => RefType::Blocks,
            RefType::Parent => RefType::Child,
            RefType::Child => RefType::Parent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub ref_type: RefType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextEntry {
    /// Absolute path, resolved under the team's `projectDir` (invariant 5).
    pub path: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub column: String,
    pub order: f64,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub context: Vec<ContextEntry>,
    #[serde(default)]
    pub refs: Vec<Ref>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Mark the task as mutated "now" (invariant 3: `updatedAt` never goes
    /// backwards relative to `createdAt`, and every mutation bumps it).
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now < self.created_at { self.created_at } else { now };
    }

    pub fn add_ref(&mut self, r: Ref) -> bool {
        if self.refs.contains(&r) {
            return false;
        }
        self.refs.push(r);
        true
    }

    pub fn remove_ref(&mut self, target: &TaskId, ref_type: Option<RefType>) -> bool {
        let before = self.refs.len();
        self.refs.retain(|r| {
            !(r.task_id == *target && ref_type.is_none_or(|t| t == r.ref_type))
        });
        self.refs.len() != before
    }
}
