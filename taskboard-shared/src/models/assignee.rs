/// Task assignee model and database operations
///
/// An assignee is a member of the task's project. Assignment is checked and
/// written in one statement that share-locks the membership row, so it
/// cannot interleave with the removal of that member.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_assignees (
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     assigned_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (task_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskAssignee {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

/// Assignee joined with the user's public profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssigneeView {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub assigned_at: DateTime<Utc>,
}

impl TaskAssignee {
    /// Assigns `user_id` if they are a member of the task's project
    ///
    /// Returns `None` when the task is missing or the user is not a member.
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the user is already assigned.
    pub async fn create_for_member<'e, E>(
        executor: E,
        task_id: Uuid,
        user_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TaskAssignee>(
            r#"
            INSERT INTO task_assignees (task_id, user_id, assigned_by)
            SELECT t.id, m.user_id, $3
            FROM tasks t
            JOIN memberships m ON m.project_id = t.project_id
            WHERE t.id = $1 AND m.user_id = $2
            FOR SHARE OF m
            RETURNING task_id, user_id, assigned_by, assigned_at
            "#,
        )
        .bind(task_id)
        .bind(user_id)
        .bind(assigned_by)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, task_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM task_assignees WHERE task_id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drops every assignment a user holds in one project
    ///
    /// Runs in the same transaction that removes the membership.
    pub async fn delete_for_member<'e, E>(
        executor: E,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM task_assignees a
            USING tasks t
            WHERE a.task_id = t.id AND t.project_id = $1 AND a.user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Assignees of a task, earliest assignment first
    pub async fn list_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<AssigneeView>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, AssigneeView>(
            r#"
            SELECT u.id AS user_id, u.username, u.email, a.assigned_at
            FROM task_assignees a
            JOIN users u ON u.id = a.user_id
            WHERE a.task_id = $1
            ORDER BY a.assigned_at ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }
}
