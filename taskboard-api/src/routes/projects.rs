/// Project endpoints
///
/// - `POST /v1/projects` - Create a project (caller becomes admin)
/// - `GET /v1/projects` - Projects the caller belongs to, with their role
/// - `GET /v1/projects/:project_id` - One project (any member)
/// - `PATCH /v1/projects/:project_id` - Rename or redescribe (admin)
/// - `DELETE /v1/projects/:project_id` - Delete with all its content (admin)
/// - `POST /v1/projects/:project_id/select` - Make it the session's project
/// - `GET /v1/projects/:project_id/statistics` - Task statistics (paid plans)
///
/// Selecting a project writes its id into the session; requests that carry
/// no explicit scope (`/v1/board`, `/v1/board/events`) then resolve to it.

use crate::{app::AppState, error::ApiResult, extract::SessionCookie, policies};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use taskboard_shared::{
    analytics::{self, ProjectStatistics},
    auth::ScopeHint,
    models::project::{CreateProject, Project, ProjectWithRole, UpdateProject},
    session::SessionRecord,
};
use uuid::Uuid;
use validator::Validate;

pub async fn create_project(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Json(req): Json<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let access = state.authorize(&policies::SIGNED_IN, token, ScopeHint::None).await?;
    req.validate()?;

    let project = state.projects.create_project(access.user()?.id, &req).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
) -> ApiResult<Json<Vec<ProjectWithRole>>> {
    let access = state.authorize(&policies::SIGNED_IN, token, ScopeHint::None).await?;
    let projects = state.projects.list_for_user(access.user()?.id).await?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Project(project_id))
        .await?;
    Ok(Json(state.projects.get(project_id).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProject>,
) -> ApiResult<Json<Project>> {
    state
        .authorize(&policies::PROJECT_ADMIN, token, ScopeHint::Project(project_id))
        .await?;
    req.validate()?;

    Ok(Json(state.projects.update(project_id, &req).await?))
}

/// Deletes the project
///
/// Sessions that had it selected are left as they are; their next scoped
/// request fails the membership check.
pub async fn delete_project(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .authorize(&policies::PROJECT_ADMIN, token, ScopeHint::Project(project_id))
        .await?;
    state.projects.delete(project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Switches the session's active project
pub async fn select_project(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    let access = state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Project(project_id))
        .await?;

    state
        .sessions
        .update(
            access.token()?,
            Box::new(move |record: &mut SessionRecord| record.project_id = Some(project_id)),
        )
        .await?;

    tracing::debug!(user_id = %access.user()?.id, project_id = %project_id, "Project selected");

    Ok(Json(state.projects.get(project_id).await?))
}

pub async fn project_statistics(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectStatistics>> {
    state
        .authorize(&policies::STATISTICS, token, ScopeHint::Project(project_id))
        .await?;

    let stats = analytics::project_statistics(
        state.board_store.as_ref(),
        state.project_store.as_ref(),
        project_id,
        Utc::now(),
    )
    .await?;

    Ok(Json(stats))
}
