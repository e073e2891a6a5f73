/// Session management endpoints
///
/// - `GET /v1/sessions` - The caller's live sessions
/// - `GET /v1/sessions/current` - The session making the request
/// - `DELETE /v1/sessions/:session_id` - End another of the caller's sessions
///
/// Sessions are identified by the digest of their token, so listing them
/// never exposes a usable credential. The current session cannot be removed
/// here; `POST /v1/auth/logout` ends it and clears the cookie.

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
use serde::Serialize;
use taskboard_shared::{auth::ScopeHint, session::SessionSummary};

/// A session as returned to its owner
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: SessionSummary,

    /// True for the session that made the request
    pub current: bool,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
) -> ApiResult<Json<Vec<SessionView>>> {
    let access = state.authorize(&policies::SIGNED_IN, token, ScopeHint::None).await?;
    let current_id = access.token()?.session_id();

    let mut sessions: Vec<SessionView> = state
        .sessions
        .list_for_user(access.user()?.id)
        .await?
        .into_iter()
        .map(|session| SessionView {
            current: session.id == current_id,
            session,
        })
        .collect();

    sessions.sort_by(|a, b| b.session.created_at.cmp(&a.session.created_at));

    Ok(Json(sessions))
}

pub async fn current_session(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
) -> ApiResult<Json<SessionView>> {
    let access = state.authorize(&policies::SIGNED_IN, token, ScopeHint::None).await?;

    Ok(Json(SessionView {
        session: SessionSummary::new(access.token()?.session_id(), access.session()?),
        current: true,
    }))
}

/// Ends one of the caller's other sessions
///
/// # Errors
///
/// - `400 Bad Request`: `session_id` is the current session
/// - `404 Not Found`: No such session for this user
pub async fn remove_session(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    let access = state.authorize(&policies::SIGNED_IN, token, ScopeHint::None).await?;

    if access.token()?.session_id() == session_id {
        return Err(ApiError::BadRequest(
            "Use logout to end the current session".to_string(),
        ));
    }

    let user_id = access.user()?.id;
    if !state.sessions.destroy_by_id(user_id, &session_id).await? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }

    tracing::info!(user_id = %user_id, "Session removed");

    Ok(StatusCode::NO_CONTENT)
}
