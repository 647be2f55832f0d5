// SPDX-License-Identifier: MIT

use crate::error::CoreError;
use crate::ids::TaskId;
use crate::task::{Ref, RefType, Task};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The five fixed columns, in board order (invariant 2, spec §3).
pub const COLUMNS: [&str; 5] = ["backlog", "ready", "in-progress", "review", "done"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Column {
    Backlog,
    Ready,
    InProgress,
    Review,
    Done,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Column::Backlog => "backlog",
            Column::Ready => "ready",
            Column::InProgress => "in-progress",
            Column::Review => "review",
            Column::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Result<Column, CoreError> {
        match s {
            "backlog" => Ok(Column::Backlog),
            "ready" => Ok(Column::Ready),
            "in-progress" => Ok(Column::InProgress),
            "review" => Ok(Column::Review),
            "done" => Ok(Column::Done),
            other => Err(CoreError::UnknownColumn(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamBinding {
    pub name: String,
    pub project_dir: PathBuf,
    pub model: String,
    pub max_turns: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMeta {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub team: Option<TeamBinding>,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub meta: BoardMeta,
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub tasks: IndexMap<TaskId, Task>,
}

fn default_columns() -> Vec<String> {
    COLUMNS.iter().map(|c| c.to_string()).collect()
}

impl Board {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            meta: BoardMeta {
                name: name.into(),
                created_at: now,
                schema_version: CURRENT_SCHEMA_VERSION,
                team: None,
            },
            columns: default_columns(),
            tasks: IndexMap::new(),
        }
    }

    /// Tasks in a column, sorted for display.
    ///
    /// Invariant 4: every column sorts by `order` ascending except `done`,
    /// which sorts by `updatedAt` descending.
    pub fn tasks_in_column(&self, column: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> =
            self.tasks.values().filter(|t| t.column == column).collect();
        if column == "done" {
            tasks.sort_by_key(|t| std::cmp::Reverse(t.updated_at));
        } else {
            tasks.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal));
        }
        tasks
    }

    /// Next strictly-increasing order value for a column (scenario S2).
    pub fn next_order(&self, column: &str) -> f64 {
        self.tasks
            .values()
            .filter(|t| t.column == column)
            .map(|t| t.order)
            .fold(0.0_f64, f64::max)
            + 1.0
    }

    /// Add a ref from `from` to `to` and its inverse on `to` (invariant 1).
    /// Idempotent: re-adding an existing ref is a no-op that still returns
    /// `true` (the add succeeded, whether or not it was new).
    pub fn add_ref(
        &mut self,
        from: &TaskId,
        ref_type: RefType,
        to: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if !self.tasks.contains_key(to) {
            return Err(CoreError::TaskNotFound(to.to_string()));
        }
        let added_forward = {
            let task = self.tasks.get_mut(from).ok_or_else(|| CoreError::TaskNotFound(from.to_string()))?;
            let added = task.add_ref(Ref { task_id: to.clone(), ref_type });
            if added {
                task.touch(now);
            }
            added
        };
        if added_forward {
            if let Some(target) = self.tasks.get_mut(to) {
                target.add_ref(Ref { task_id: from.clone(), ref_type: ref_type.inverse() });
                target.touch(now);
            }
        }
        Ok(())
    }

    /// Remove a ref and its inverse (invariant 1).
    pub fn remove_ref(&mut self, from: &TaskId, to: &TaskId, now: DateTime<Utc>) -> Result<(), CoreError> {
        let removed = {
            let task = self.tasks.get_mut(from).ok_or_else(|| CoreError::TaskNotFound(from.to_string()))?;
            let removed = task.remove_ref(to, None);
            if removed {
                task.touch(now);
            }
            removed
        };
        if removed {
            if let Some(target) = self.tasks.get_mut(to) {
                target.remove_ref(from, None);
                target.touch(now);
            }
        }
        Ok(())
    }

    /// Delete a task, stripping dangling references to it from every other
    /// task (spec §4.F DELETE /api/tasks/:id).
    pub fn delete_task(&mut self, id: &TaskId, now: DateTime<Utc>) -> Option<Task> {
        let removed = self.tasks.shift_remove(id);
        if removed.is_some() {
            for task in self.tasks.values_mut() {
                if task.remove_ref(id, None) {
                    task.touch(now);
                }
            }
        }
        removed
    }
}

/// Resolve a file-context path under `project_dir`, rejecting absolute
/// inputs and any traversal that would resolve outside it (invariant 5,
/// scenario S3). Does not require the path to exist on disk.
pub fn resolve_context_path(project_dir: &Path, input: &str) -> Result<PathBuf, CoreError> {
    if Path::new(input).is_absolute() {
        return Err(CoreError::PathEscape(input.to_string()));
    }
    let joined = project_dir.join(input);
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(CoreError::PathEscape(input.to_string()));
                }
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    if !resolved.starts_with(project_dir) {
        return Err(CoreError::PathEscape(input.to_string()));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FakeClock};
    use crate::task::{Priority, TaskType};
    use chrono::TimeZone;

    fn clock() -> FakeClock {
        FakeClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    fn new_task(column: &str, order: f64, now: DateTime<Utc>) -> Task {
        Task {
            id: TaskId::generate(),
            title: "t".to_string(),
            description: String::new(),
            column: column.to_string(),
            order,
            priority: Priority::Medium,
            task_type: TaskType::Task,
            tags: Vec::new(),
            assignee: None,
            comments: Vec::new(),
            context: Vec::new(),
            refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant 1: adding a ref adds the mirrored inverse on the target,
    /// and removing it removes both sides.
    #[test]
    fn add_and_remove_ref_is_symmetric() {
        let clock = clock();
        let mut board = Board::new("demo", clock.now());
        let a = new_task("backlog", 1.0, clock.now());
        let b = new_task("backlog", 2.0, clock.now());
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        board.tasks.insert(a_id.clone(), a);
        board.tasks.insert(b_id.clone(), b);

        board.add_ref(&a_id, RefType::Blocks, &b_id, clock.now()).unwrap();
        assert_eq!(board.tasks[&a_id].refs, vec![Ref { task_id: b_id.clone(), ref_type: RefType::Blocks }]);
        assert_eq!(
            board.tasks[&b_id].refs,
            vec![Ref { task_id: a_id.clone(), ref_type: RefType::BlockedBy }]
        );

        board.remove_ref(&a_id, &b_id, clock.now()).unwrap();
        assert!(board.tasks[&a_id].refs.is_empty());
        assert!(board.tasks[&b_id].refs.is_empty());
    }

    #[test]
    fn add_ref_to_missing_task_errors_without_mutating() {
        let clock = clock();
        let mut board = Board::new("demo", clock.now());
        let a = new_task("backlog", 1.0, clock.now());
        let a_id = a.id.clone();
        board.tasks.insert(a_id.clone(), a);

        let missing = TaskId::from("does-not-exist");
        let err = board.add_ref(&a_id, RefType::Blocks, &missing, clock.now());
        assert!(matches!(err, Err(CoreError::TaskNotFound(_))));
        assert!(board.tasks[&a_id].refs.is_empty());
    }

    /// Invariant 5: a context path must resolve under `project_dir`.
    #[test]
    fn resolve_context_path_rejects_absolute_and_escaping_paths() {
        let project_dir = PathBuf::from("/home/demo/project");
        assert!(resolve_context_path(&project_dir, "/etc/passwd").is_err());
        assert!(resolve_context_path(&project_dir, "../escape.txt").is_err());
        assert!(resolve_context_path(&project_dir, "../../escape.txt").is_err());

        let resolved = resolve_context_path(&project_dir, "src/a.ts").unwrap();
        assert_eq!(resolved, project_dir.join("src/a.ts"));

        let resolved = resolve_context_path(&project_dir, "src/../src/a.ts").unwrap();
        assert_eq!(resolved, project_dir.join("src/a.ts"));
    }
}
