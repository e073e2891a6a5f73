/// Membership model and database operations
///
/// A membership binds a user to a project with a role. Every project keeps
/// at least one membership; the last one cannot be removed.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE member_role AS ENUM ('admin', 'member', 'viewer');
///
/// CREATE TABLE memberships (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role member_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **admin**: manage the project, its members and invitations
/// - **member**: create and reorder tasks, write documents
/// - **viewer**: read-only access

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Per-project role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
            MemberRole::Viewer => "viewer",
        }
    }

    /// Roles allowed to mutate board and documents
    pub const WRITERS: &'static [MemberRole] = &[MemberRole::Admin, MemberRole::Member];

    /// Roles allowed to administer the project
    pub const ADMINS: &'static [MemberRole] = &[MemberRole::Admin];
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// Membership joined with the member's public profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberView {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    /// Inserts a membership
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the user is already a member.
    pub async fn create<'e, E>(
        executor: E,
        project_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (project_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING project_id, user_id, role, created_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(executor)
        .await
    }

    pub async fn find<'e, E>(
        executor: E,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT project_id, user_id, role, created_at
            FROM memberships
            WHERE project_id = $1 AND user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn update_role<'e, E>(
        executor: E,
        project_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET role = $3
            WHERE project_id = $1 AND user_id = $2
            RETURNING project_id, user_id, role, created_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, project_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM memberships WHERE project_id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Row-locks every membership of a project and returns the member ids
    ///
    /// Run inside a transaction before removing a member so two concurrent
    /// removals cannot both see a second member.
    pub async fn lock_project_members<'e, E>(
        executor: E,
        project_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT user_id FROM memberships WHERE project_id = $1 FOR UPDATE",
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    /// Members of a project with their profile, oldest first
    pub async fn list_members<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<MemberView>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, MemberView>(
            r#"
            SELECT u.id AS user_id, u.username, u.email, m.role, m.created_at AS joined_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_role_as_str() {
        assert_eq!(MemberRole::Admin.as_str(), "admin");
        assert_eq!(MemberRole::Member.as_str(), "member");
        assert_eq!(MemberRole::Viewer.as_str(), "viewer");
    }

    #[test]
    fn test_role_sets() {
        assert!(MemberRole::WRITERS.contains(&MemberRole::Member));
        assert!(!MemberRole::WRITERS.contains(&MemberRole::Viewer));
        assert_eq!(MemberRole::ADMINS, &[MemberRole::Admin]);
    }

    #[test]
    fn test_role_serde() {
        let role: MemberRole = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, MemberRole::Viewer);
        assert_eq!(serde_json::to_string(&MemberRole::Admin).unwrap(), "\"admin\"");
    }
}
