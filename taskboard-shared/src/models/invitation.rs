/// Invitation model and database operations
///
/// An invitation lets the holder of `token` join `project_id` with `role`.
/// There is at most one pending invitation per (project, email); inviting the
/// same address again replaces the old token.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE invitations (
///     token VARCHAR(64) PRIMARY KEY,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     email VARCHAR(255) NOT NULL,
///     role member_role NOT NULL DEFAULT 'member',
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (project_id, email)
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::membership::MemberRole;

/// How long an invitation stays valid
pub const INVITATION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    pub token: String,
    pub project_id: Uuid,
    pub email: String,
    pub role: MemberRole,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// Builds a fresh invitation with a random token
    pub fn issue(project_id: Uuid, email: &str, role: MemberRole) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().simple().to_string(),
            project_id,
            email: email.trim().to_lowercase(),
            role,
            expires_at: now + Duration::hours(INVITATION_TTL_HOURS),
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Deletes any pending invitation for the same (project, email)
    pub async fn delete_for_email<'e, E>(
        executor: E,
        project_id: Uuid,
        email: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM invitations WHERE project_id = $1 AND email = $2")
            .bind(project_id)
            .bind(email)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn insert<'e, E>(executor: E, invitation: &Invitation) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO invitations (token, project_id, email, role, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&invitation.token)
        .bind(invitation.project_id)
        .bind(&invitation.email)
        .bind(invitation.role)
        .bind(invitation.expires_at)
        .bind(invitation.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_token<'e, E>(executor: E, token: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Invitation>(
            r#"
            SELECT token, project_id, email, role, expires_at, created_at
            FROM invitations
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(executor)
        .await
    }

    /// Deletes the invitation and returns it, locking out a concurrent accept
    pub async fn take<'e, E>(executor: E, token: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Invitation>(
            r#"
            DELETE FROM invitations
            WHERE token = $1
            RETURNING token, project_id, email, role, expires_at, created_at
            "#,
        )
        .bind(token)
        .fetch_optional(executor)
        .await
    }
}
