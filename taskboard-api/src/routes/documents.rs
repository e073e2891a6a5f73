/// Document endpoints
///
/// - `GET /v1/projects/:project_id/documents` - List (any member)
/// - `POST /v1/projects/:project_id/documents` - Create (admins and members)
/// - `GET /v1/documents/:document_id` - One document (any member)
/// - `DELETE /v1/documents/:document_id` - Delete (admins and members)
///
/// Requests naming a document are scoped to the document's project, so a
/// document id from another tenant fails authorization like any other
/// foreign resource.

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
use taskboard_shared::{
    auth::ScopeHint,
    models::document::{Document, NewDocument},
};
use uuid::Uuid;
use validator::Validate;

pub async fn list_documents(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Document>>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Project(project_id))
        .await?;
    Ok(Json(state.documents.list_documents(project_id).await?))
}

pub async fn create_document(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
    Json(req): Json<NewDocument>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let access = state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Project(project_id))
        .await?;
    req.validate()?;

    let document = state
        .documents
        .create_document(project_id, access.user()?.id, &req)
        .await?;

    tracing::info!(document_id = %document.id, project_id = %project_id, "Document created");

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn get_document(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<Document>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Document(document_id))
        .await?;

    let document = state
        .documents
        .find_document(document_id)
        .await?
        .ok_or_else(document_not_found)?;
    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(document_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .authorize(&policies::PROJECT_WRITE, token, ScopeHint::Document(document_id))
        .await?;

    if !state.documents.delete_document(document_id).await? {
        return Err(document_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

fn document_not_found() -> ApiError {
    ApiError::NotFound("Document not found".to_string())
}
