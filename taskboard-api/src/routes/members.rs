/// Membership and invitation endpoints
///
/// - `GET /v1/projects/:project_id/members` - Members with their roles
/// - `POST /v1/projects/:project_id/invitations` - Invite by email (admin)
/// - `PATCH /v1/projects/:project_id/members/:user_id` - Change a role (admin)
/// - `DELETE /v1/projects/:project_id/members/:user_id` - Remove (admin)
/// - `POST /v1/invitations/:token/accept` - Join through an invitation
///
/// An admin cannot change their own role, and the last member of a project
/// cannot be removed.

use crate::{app::AppState, error::ApiResult, extract::SessionCookie, policies};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::ScopeHint,
    models::{
        invitation::Invitation,
        membership::{MemberRole, MemberView, Membership},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default = "default_invite_role")]
    pub role: MemberRole,
}

fn default_invite_role() -> MemberRole {
    MemberRole::Member
}

/// Issued invitation
///
/// Carries the token because delivery is outside this service: whoever
/// invites passes it on (or the configured notifier does).
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub token: String,
    pub project_id: Uuid,
    pub email: String,
    pub role: MemberRole,
    pub expires_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(invitation: Invitation) -> Self {
        Self {
            token: invitation.token,
            project_id: invitation.project_id,
            email: invitation.email,
            role: invitation.role,
            expires_at: invitation.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: MemberRole,
}

pub async fn list_members(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberView>>> {
    state
        .authorize(&policies::PROJECT_READ, token, ScopeHint::Project(project_id))
        .await?;
    Ok(Json(state.projects.list_members(project_id).await?))
}

/// Invites an email address into the project
///
/// # Errors
///
/// - `409 Conflict`: The address already belongs to a member
pub async fn invite(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(project_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<InvitationResponse>)> {
    let access = state
        .authorize(&policies::PROJECT_ADMIN, token, ScopeHint::Project(project_id))
        .await?;
    req.validate()?;

    let invitation = state.projects.invite(project_id, &req.email, req.role).await?;

    tracing::info!(
        project_id = %project_id,
        invited_by = %access.user()?.id,
        role = invitation.role.as_str(),
        "Invitation issued"
    );

    Ok((StatusCode::CREATED, Json(invitation.into())))
}

pub async fn change_role(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<Membership>> {
    let access = state
        .authorize(&policies::PROJECT_ADMIN, token, ScopeHint::Project(project_id))
        .await?;

    let membership = state
        .projects
        .change_role(access.user()?.id, project_id, user_id, req.role)
        .await?;

    Ok(Json(membership))
}

pub async fn remove_member(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .authorize(&policies::PROJECT_ADMIN, token, ScopeHint::Project(project_id))
        .await?;
    state.projects.remove_member(project_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts an invitation for the signed-in user
///
/// The invitation's email must match the account's email.
pub async fn accept_invitation(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
    Path(invitation_token): Path<String>,
) -> ApiResult<Json<Membership>> {
    let access = state.authorize(&policies::SIGNED_IN, token, ScopeHint::None).await?;
    let membership = state
        .projects
        .accept_invitation(&invitation_token, access.user()?)
        .await?;
    Ok(Json(membership))
}
