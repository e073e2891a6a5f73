/// Task assignee and comment endpoints
///
/// - `GET /v1/tasks/:task_id/assignees` - Assignees (any member)
/// - `POST /v1/tasks/:task_id/assignees/:user_id` - Assign a project member
/// - `DELETE /v1/tasks/:task_id/assignees/:user_id` - Unassign
/// - `GET /v1/tasks/:task_id/comments` - Comments, oldest first (any member)
/// - `POST /v1/tasks/:task_id/comments` - Add a comment
/// - `PATCH /v1/tasks/:task_id/comments/:comment_id` - Edit (author only)
/// - `DELETE /v1/tasks/:task_id/comments/:comment_id` - Delete (author or admin)
///
/// Writes need the admin or member role. Every request is scoped to the
/// task's project.

use crate::{app::AppState, error::ApiResult, extract::SessionCookie, policies};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use taskboard_shared::{
    auth::ScopeHint,
    models::{
        assignee::{AssigneeView, TaskAssignee},
        comment::{Comment, CommentInput},
    },
};
use uuid::Uuid;
use validator::Validate;

pub async fn list_assignees(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AssigneeView>>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Task(task_id))
        .await?;
    Ok(Json(state.activity.list_assignees(task_id).await?))
}

pub async fn assign(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path((task_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<(StatusCode, Json<TaskAssignee>)> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;

    let assignee = state.activity.assign(task_id, user_id, access.user()?.id).await?;
    Ok((StatusCode::CREATED, Json(assignee)))
}

pub async fn unassign(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path((task_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;
    state.activity.unassign(task_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_comments(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Task(task_id))
        .await?;
    Ok(Json(state.activity.list_comments(task_id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(task_id): Path<Uuid>,
    Json(req): Json<CommentInput>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;
    req.validate()?;

    let comment = state
        .activity
        .add_comment(task_id, access.user()?.id, req.content.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path((task_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CommentInput>,
) -> ApiResult<Json<Comment>> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;
    req.validate()?;

    let comment = state
        .activity
        .edit_comment(task_id, comment_id, access.user()?.id, req.content.trim())
        .await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path((task_id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Task(task_id))
        .await?;

    state
        .activity
        .delete_comment(task_id, comment_id, access.user()?.id, access.membership()?.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
