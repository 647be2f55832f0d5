// SPDX-License-Identifier: MIT

//! Route handlers (spec §4.F). Every mutation writes the board atomically
//! before responding, then broadcasts on the SSE hub — ordering the spec's
//! concurrency model requires ("the write to disk completes before the
//! success response and before the SSE broadcast").

use crate::error::ApiError;
use crate::sse::BoardEvent;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use chrono::Utc;
use clamban_core::board::resolve_context_path;
use clamban_core::{Board, Column, Comment, ContextEntry, Priority, RefType, TaskId, TaskType};
use clamban_supervisor::{team_is_running, SupervisorConfig, SupervisorState};
use serde::{Deserialize, Serialize};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/board", get(get_board))
        .route("/api/tasks", get(bulk_fetch_tasks).post(create_task))
        .route("/api/tasks/search", get(search_tasks))
        .route("/api/tasks/:id", patch(update_task).delete(delete_task))
        .route("/api/tasks/:id/comments", post(add_comment))
        .route("/api/tasks/:id/context", post(add_context))
        .route("/api/tasks/:id/refs", post(add_ref))
        .route("/api/tasks/:id/refs/:target", delete(remove_ref))
        .route("/api/team", get(get_team))
        .route("/api/team/connect", post(connect_team))
        .route("/api/team/disconnect", post(disconnect_team))
        .route("/api/team/start", post(start_team))
        .route("/api/team/stop", post(stop_team))
        .route("/api/team/logs", get(team_logs))
        .route("/api/teams/available", get(teams_available))
        .route("/api/events", get(events))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Feed a successful board mutation into the Cycle Supervisor's debounce
/// input (spec §2, §4.E `notifyBoardChanged()`). The supervisor task being
/// gone is a shutdown race, not a request failure, so this only logs.
async fn notify_supervisor(state: &AppState) {
    if let Err(e) = state.supervisor.notify_board_changed().await {
        tracing::warn!(error = %e, "failed to notify supervisor of board change");
    }
}

async fn get_board(State(state): State<AppState>) -> Result<Json<Board>, ApiError> {
    Ok(Json(state.board_store.read()?))
}

async fn events(State(state): State<AppState>) -> Sse<impl futures_util::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    state.sse.stream()
}

#[derive(Deserialize)]
struct NewTaskRequest {
    title: String,
    #[serde(default)]
    description: String,
    column: String,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default, rename = "type")]
    task_type: Option<TaskType>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    assignee: Option<String>,
}

async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<clamban_core::Task>), ApiError> {
    Column::parse(&req.column).map_err(ApiError::Core)?;
    let mut board = state.board_store.read()?;
    let now = Utc::now();
    let task = clamban_core::Task {
        id: TaskId::generate(),
        title: req.title,
        description: req.description,
        order: board.next_order(&req.column),
        column: req.column,
        priority: req.priority.unwrap_or(Priority::Medium),
        task_type: req.task_type.unwrap_or(TaskType::Task),
        tags: req.tags,
        assignee: req.assignee,
        comments: Vec::new(),
        context: Vec::new(),
        refs: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    board.tasks.insert(task.id.clone(), task.clone());
    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::BoardChanged).await;
    notify_supervisor(&state).await;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    column: Option<String>,
    priority: Option<Priority>,
    #[serde(rename = "type")]
    task_type: Option<TaskType>,
    tags: Option<Vec<String>>,
    assignee: Option<String>,
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<clamban_core::Task>, ApiError> {
    if let Some(column) = &req.column {
        Column::parse(column).map_err(ApiError::Core)?;
    }
    let mut board = state.board_store.read()?;
    let id = TaskId::from(id);
    let task = board
        .tasks
        .get_mut(&id)
        .ok_or_else(|| ApiError::NotFound(format!("task not found: {id}")))?;

    if let Some(v) = req.title {
        task.title = v;
    }
    if let Some(v) = req.description {
        task.description = v;
    }
    if let Some(v) = req.column {
        task.column = v;
    }
    if let Some(v) = req.priority {
        task.priority = v;
    }
    if let Some(v) = req.task_type {
        task.task_type = v;
    }
    if let Some(v) = req.tags {
        task.tags = v;
    }
    if req.assignee.is_some() {
        task.assignee = req.assignee;
    }
    task.touch(Utc::now());
    let updated = task.clone();

    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::BoardChanged).await;
    notify_supervisor(&state).await;
    Ok(Json(updated))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut board = state.board_store.read()?;
    let id = TaskId::from(id);
    let now = Utc::now();
    let removed = board.delete_task(&id, now);
    if removed.is_none() {
        return Err(ApiError::NotFound(format!("task not found: {id}")));
    }
    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::BoardChanged).await;
    notify_supervisor(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct NewCommentRequest {
    body: String,
    #[serde(default)]
    author: Option<String>,
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let mut board = state.board_store.read()?;
    let id = TaskId::from(id);
    let now = Utc::now();
    let task = board
        .tasks
        .get_mut(&id)
        .ok_or_else(|| ApiError::NotFound(format!("task not found: {id}")))?;
    let comment = Comment { id: TaskId::generate().to_string(), body: req.body, author: req.author, created_at: now };
    task.comments.push(comment.clone());
    task.touch(now);

    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::BoardChanged).await;
    notify_supervisor(&state).await;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Deserialize)]
struct NewContextRequest {
    path: String,
    #[serde(default)]
    note: Option<String>,
}

async fn add_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewContextRequest>,
) -> Result<(StatusCode, Json<ContextEntry>), ApiError> {
    let mut board = state.board_store.read()?;
    let project_dir = board
        .meta
        .team
        .as_ref()
        .map(|t| t.project_dir.clone())
        .ok_or_else(|| ApiError::BadRequest("no team connected".to_string()))?;
    let resolved = resolve_context_path(&project_dir, &req.path).map_err(ApiError::Core)?;
    let resolved_str = resolved.to_string_lossy().to_string();

    let id = TaskId::from(id);
    let now = Utc::now();
    let task = board
        .tasks
        .get_mut(&id)
        .ok_or_else(|| ApiError::NotFound(format!("task not found: {id}")))?;

    if task.context.iter().any(|c| c.path == resolved_str) {
        return Err(ApiError::BadRequest("context path already present".to_string()));
    }
    let entry = ContextEntry { path: resolved_str, note: req.note };
    task.context.push(entry.clone());
    task.touch(now);

    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::BoardChanged).await;
    notify_supervisor(&state).await;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Deserialize)]
struct NewRefRequest {
    #[serde(rename = "taskId")]
    task_id: String,
    #[serde(rename = "type")]
    ref_type: RefType,
}

async fn add_ref(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewRefRequest>,
) -> Result<StatusCode, ApiError> {
    let mut board = state.board_store.read()?;
    let from = TaskId::from(id);
    let to = TaskId::from(req.task_id);
    board.add_ref(&from, req.ref_type, &to, Utc::now()).map_err(ApiError::Core)?;

    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::BoardChanged).await;
    notify_supervisor(&state).await;
    Ok(StatusCode::CREATED)
}

async fn remove_ref(
    State(state): State<AppState>,
    Path((id, target)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let mut board = state.board_store.read()?;
    let from = TaskId::from(id);
    let to = TaskId::from(target);
    board.remove_ref(&from, &to, Utc::now()).map_err(ApiError::Core)?;

    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::BoardChanged).await;
    notify_supervisor(&state).await;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct BulkQuery {
    ids: Option<String>,
}

async fn bulk_fetch_tasks(
    State(state): State<AppState>,
    Query(q): Query<BulkQuery>,
) -> Result<Json<Vec<clamban_core::Task>>, ApiError> {
    let ids = q.ids.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
        ApiError::BadRequest("ids query parameter is required and must not be empty".to_string())
    })?;
    let board = state.board_store.read()?;
    let tasks = ids
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|id| board.tasks.get(id).cloned())
        .collect();
    Ok(Json(tasks))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    column: Option<String>,
    limit: Option<String>,
}

async fn search_tasks(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<clamban_core::Task>>, ApiError> {
    let needle = q.q.unwrap_or_default().to_lowercase();
    let limit = q
        .limit
        .as_deref()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20)
        .min(100);
    let board = state.board_store.read()?;
    let results = board
        .tasks
        .values()
        .filter(|t| q.column.as_deref().is_none_or(|c| t.column == c))
        .filter(|t| {
            needle.is_empty()
                || t.title.to_lowercase().contains(&needle)
                || t.description.to_lowercase().contains(&needle)
                || t.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
        })
        .take(limit)
        .cloned()
        .collect();
    Ok(Json(results))
}

#[derive(Serialize)]
struct TeamResponse {
    team: Option<clamban_core::TeamBinding>,
    running: bool,
}

async fn get_team(State(state): State<AppState>) -> Result<Json<TeamResponse>, ApiError> {
    let board = state.board_store.read()?;
    let supervisor_state = state.supervisor.state().await.map_err(ApiError::Supervisor)?;
    let child_alive = supervisor_state == SupervisorState::Running || supervisor_state == SupervisorState::Pending;
    let running = match &board.meta.team {
        Some(team) => team_is_running(&state.team_state, &team.name, child_alive),
        None => child_alive,
    };
    Ok(Json(TeamResponse { team: board.meta.team, running }))
}

#[derive(Deserialize)]
struct ConnectRequest {
    name: String,
    #[serde(rename = "projectDir")]
    project_dir: std::path::PathBuf,
    model: Option<String>,
    #[serde(rename = "maxTurns")]
    max_turns: Option<u32>,
}

async fn connect_team(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<clamban_core::TeamBinding>, ApiError> {
    state.board_store.set_active_team(Some(req.name.clone()))?;
    let mut board = state.board_store.read()?;
    let binding = clamban_core::TeamBinding {
        name: req.name,
        project_dir: req.project_dir,
        model: req.model.unwrap_or_else(clamban_core::config::default_agent_model),
        max_turns: req.max_turns.unwrap_or(500),
    };
    board.meta.team = Some(binding.clone());
    state.board_store.write(&board)?;
    state.sse.broadcast(BoardEvent::TeamChanged).await;
    Ok(Json(binding))
}

async fn disconnect_team(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.supervisor.stop().await.map_err(ApiError::Supervisor)?;
    if let Some(team) = state.board_store.get_active_team() {
        let mut board = state.board_store.read()?;
        board.meta.team = None;
        state.board_store.write(&board)?;
        let _ = team;
    }
    state.board_store.set_active_team(None)?;
    state.sse.broadcast(BoardEvent::TeamChanged).await;
    Ok(StatusCode::OK)
}

async fn start_team(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let current = state.supervisor.state().await.map_err(ApiError::Supervisor)?;
    if current == SupervisorState::Running || current == SupervisorState::Pending {
        return Err(ApiError::Conflict("team is already running".to_string()));
    }
    let board = state.board_store.read()?;
    let binding = board
        .meta
        .team
        .ok_or_else(|| ApiError::BadRequest("no team connected".to_string()))?;
    let config = SupervisorConfig {
        team: binding.name,
        project_dir: binding.project_dir,
        model: binding.model,
        max_turns: binding.max_turns as i64,
        agent_command: state.config.agent_command.clone(),
        prompt: String::new(),
    };
    state.supervisor.start(config).await.map_err(ApiError::Supervisor)?;
    Ok(StatusCode::OK)
}

async fn stop_team(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.supervisor.stop().await.map_err(ApiError::Supervisor)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct LogsQuery {
    lines: Option<usize>,
}

async fn team_logs(
    State(state): State<AppState>,
    Query(q): Query<LogsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let team = state
        .board_store
        .get_active_team()
        .ok_or_else(|| ApiError::BadRequest("no team connected".to_string()))?;
    let lines = state.log_tail.tail(&team, q.lines.unwrap_or(200))?;
    Ok(Json(lines))
}

#[derive(Serialize)]
struct AvailableTeam {
    name: String,
}

async fn teams_available(State(state): State<AppState>) -> Result<Json<Vec<AvailableTeam>>, impl IntoResponse> {
    let dir = &state.config.teams_dir;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Json(Vec::new())),
        Err(e) => return Err(ApiError::Storage(e.into())),
    };
    let mut teams: Vec<AvailableTeam> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && path.join("config.json").is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                teams.push(AvailableTeam { name: name.to_string() });
            }
        }
    }
    Ok(Json(teams))
}
