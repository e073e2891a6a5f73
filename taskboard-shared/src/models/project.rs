/// Project model and database operations
///
/// A project is the tenant boundary: memberships, tasks and documents all
/// hang off a project, and its plan decides which gated features it may use.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_plan AS ENUM ('free', 'pro', 'enterprise');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     icon VARCHAR(64),
///     description VARCHAR(300),
///     plan project_plan NOT NULL DEFAULT 'free',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

use super::membership::MemberRole;

/// Subscription plan of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectPlan {
    Free,
    Pro,
    Enterprise,
}

impl ProjectPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectPlan::Free => "free",
            ProjectPlan::Pro => "pro",
            ProjectPlan::Enterprise => "enterprise",
        }
    }
}

impl Default for ProjectPlan {
    fn default() -> Self {
        ProjectPlan::Free
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub plan: ProjectPlan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProject {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 64, message = "Icon must be at most 64 characters"))]
    pub icon: Option<String>,

    #[validate(length(max = 300, message = "Description must be at most 300 characters"))]
    pub description: Option<String>,
}

/// Partial project update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProject {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 64, message = "Icon must be at most 64 characters"))]
    pub icon: Option<String>,

    #[validate(length(max = 300, message = "Description must be at most 300 characters"))]
    pub description: Option<String>,
}

/// A project together with the caller's role in it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectWithRole {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub project: Project,
    pub role: MemberRole,
}

impl Project {
    /// Inserts a project row; memberships are created separately
    pub async fn create<'e, E>(executor: E, data: &CreateProject) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, icon, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, icon, description, plan, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.icon)
        .bind(&data.description)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, icon, description, plan, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Plan lookup used by the entitlement check
    pub async fn find_plan<'e, E>(executor: E, id: Uuid) -> Result<Option<ProjectPlan>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT plan FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Projects the user belongs to, oldest membership first
    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<ProjectWithRole>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectWithRole>(
            r#"
            SELECT p.id, p.name, p.icon, p.description, p.plan, p.created_at, p.updated_at, m.role
            FROM projects p
            JOIN memberships m ON m.project_id = p.id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Applies the non-`None` fields of `data`
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                icon = COALESCE($3, icon),
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, icon, description, plan, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.icon)
        .bind(&data.description)
        .fetch_optional(executor)
        .await
    }

    /// Deletes a project; memberships, tasks and documents cascade
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_as_str() {
        assert_eq!(ProjectPlan::Free.as_str(), "free");
        assert_eq!(ProjectPlan::Pro.as_str(), "pro");
        assert_eq!(ProjectPlan::Enterprise.as_str(), "enterprise");
        assert_eq!(ProjectPlan::default(), ProjectPlan::Free);
    }

    #[test]
    fn test_create_project_validation() {
        let ok = CreateProject {
            name: "Roadmap".to_string(),
            icon: None,
            description: Some("Q3 planning".to_string()),
        };
        assert!(ok.validate().is_ok());

        let too_long = CreateProject {
            name: "Roadmap".to_string(),
            icon: None,
            description: Some("x".repeat(301)),
        };
        assert!(too_long.validate().is_err());

        let empty = CreateProject {
            name: String::new(),
            icon: None,
            description: None,
        };
        assert!(empty.validate().is_err());
    }
}
