/// Task endpoints
///
/// - `GET /v1/board` - The session project's board, one column per status
/// - `GET /v1/projects/:project_id/tasks` - All tasks by (status, position)
/// - `POST /v1/projects/:project_id/tasks` - Create, appended to its column
/// - `GET /v1/tasks/:task_id` - One task
/// - `PATCH /v1/tasks/:task_id` - Edit details (creator only)
/// - `POST /v1/tasks/:task_id/move` - Move to a status and position
/// - `DELETE /v1/tasks/:task_id` - Delete; later tasks in the column close up
///
/// Status and position only change through create, move and delete, all of
/// which run in the ordering engine. Editing details never touches them.
///
/// # Move
///
/// ```text
/// POST /v1/tasks/{task_id}/move
///
/// { "status": "todo", "position": 0 }
/// ```
///
/// `position` must lie in `0..=n`, where `n` is the number of other tasks
/// in the target column; anything else is a `400` and nothing changes.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::SessionCookie,
    policies,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::ScopeHint,
    models::task::{NewTask, Task, TaskDetails, TaskStatus},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct MoveTaskRequest {
    pub status: TaskStatus,
    pub position: i32,
}

/// One status column
#[derive(Debug, Serialize)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct BoardView {
    pub project_id: Uuid,
    pub columns: Vec<BoardColumn>,
}

impl BoardView {
    /// Groups tasks into every column, empty ones included
    ///
    /// `tasks` must already be ordered by (status, position).
    fn new(project_id: Uuid, tasks: Vec<Task>) -> Self {
        let mut columns: Vec<BoardColumn> = TaskStatus::ALL
            .iter()
            .map(|status| BoardColumn {
                status: *status,
                tasks: Vec::new(),
            })
            .collect();

        for task in tasks {
            if let Some(column) = columns.iter_mut().find(|c| c.status == task.status) {
                column.tasks.push(task);
            }
        }

        Self { project_id, columns }
    }
}

/// Board of the session's selected project
pub async fn board(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
) -> ApiResult<Json<BoardView>> {
    let access = state.authorize(&policies::PROJECT_READ, token, ScopeHint::None).await?;
    let project_id = access.project_id()?;

    let tasks = state.board_store.list_tasks(project_id).await?;
    Ok(Json(BoardView::new(project_id, tasks)))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Task>>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Project(project_id))
        .await?;
    Ok(Json(state.board_store.list_tasks(project_id).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
    Json(req): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Project(project_id))
        .await?;
    req.validate()?;

    let task = state.board.create(project_id, access.user()?.id, &req).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Task(task_id))
        .await?;

    let task = state
        .board_store
        .find_task(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(task_id): Path<Uuid>,
    Json(req): Json<TaskDetails>,
) -> ApiResult<Json<Task>> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;
    req.validate()?;

    let task = state.board.update_details(task_id, access.user()?.id, &req).await?;
    Ok(Json(task))
}

pub async fn move_task(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(task_id): Path<Uuid>,
    Json(req): Json<MoveTaskRequest>,
) -> ApiResult<Json<Task>> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;

    tracing::debug!(
        user_id = %access.user()?.id,
        task_id = %task_id,
        status = req.status.as_str(),
        position = req.position,
        "Move requested"
    );

    let task = state.board.move_task(task_id, req.status, req.position).await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;
    state.board.delete(task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
