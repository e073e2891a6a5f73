/// Task model and database operations
///
/// Tasks are grouped into buckets by `(project_id, status)`. Inside a bucket
/// the `position` column is dense and zero-based: a bucket of `n` tasks holds
/// exactly the positions `0..n`. Only [`crate::board::TaskOrderingEngine`]
/// writes `status` and `position`; the bucket helpers below are its building
/// blocks and are expected to run inside one transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('backlog', 'todo', 'in_progress', 'done', 'cancelled');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'backlog',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     position INTEGER NOT NULL CHECK (position >= 0),
///     start_date TIMESTAMPTZ,
///     due_date TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT tasks_bucket_position_key UNIQUE (project_id, status, position)
///         DEFERRABLE INITIALLY DEFERRED
/// );
/// ```
///
/// The unique constraint is deferred because a shift temporarily gives two
/// rows the same position until the moved task is written back.
///
/// # Status Workflow
///
/// ```text
/// backlog → todo → in_progress → done
///                                 ↘ cancelled (terminal side-state)
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

/// Workflow status; also the bucket key together with the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Todo,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    /// Every status in workflow order
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Done and cancelled tasks are never overdue
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Backlog
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,

    /// Zero-based index inside the `(project_id, status)` bucket
    pub position: i32,

    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task; the position is always assigned by the engine
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewTask {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    pub description: Option<String>,

    /// Bucket to append to, backlog when omitted
    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Editable task fields; status and position are not among them
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TaskDetails {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// One slot of a bucket: task id and its position
pub type Slot = (Uuid, i32);

const TASK_COLUMNS: &str = "id, project_id, created_by, title, description, status, priority, \
     position, start_date, due_date, created_at, updated_at";

impl Task {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Reads the task and row-locks it until the transaction ends
    pub async fn find_for_update<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Owning project of a task, used to scope requests that name a task
    pub async fn project_of<'e, E>(executor: E, id: Uuid) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT project_id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// All tasks of a project in board order
    pub async fn list_by_project<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 ORDER BY status, position"
        ))
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    /// Slots of one bucket ordered by position
    pub async fn bucket<'e, E>(
        executor: E,
        project_id: Uuid,
        status: TaskStatus,
    ) -> Result<Vec<Slot>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Slot>(
            r#"
            SELECT id, position
            FROM tasks
            WHERE project_id = $1 AND status = $2
            ORDER BY position ASC
            "#,
        )
        .bind(project_id)
        .bind(status)
        .fetch_all(executor)
        .await
    }

    /// Adds `delta` to every position `>= from` in the bucket, skipping `exclude`
    ///
    /// Returns the number of rows shifted.
    pub async fn shift_positions<'e, E>(
        executor: E,
        project_id: Uuid,
        status: TaskStatus,
        from: i32,
        delta: i32,
        exclude: Option<Uuid>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET position = position + $4, updated_at = NOW()
            WHERE project_id = $1
              AND status = $2
              AND position >= $3
              AND ($5::UUID IS NULL OR id <> $5)
            "#,
        )
        .bind(project_id)
        .bind(status)
        .bind(from)
        .bind(delta)
        .bind(exclude)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Writes the task's status and position
    pub async fn place<'e, E>(
        executor: E,
        id: Uuid,
        status: TaskStatus,
        position: i32,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET status = $2, position = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(position)
        .fetch_one(executor)
        .await
    }

    /// Inserts a task at an explicit position
    pub async fn insert<'e, E>(
        executor: E,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewTask,
        position: i32,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (project_id, created_by, title, description, status, priority,
                               position, start_date, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(project_id)
        .bind(created_by)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(position)
        .bind(data.start_date)
        .bind(data.due_date)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies the non-`None` detail fields; never touches status or position
    pub async fn update_details<'e, E>(
        executor: E,
        id: Uuid,
        data: &TaskDetails,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                priority = COALESCE($4, priority),
                start_date = COALESCE($5, start_date),
                due_date = COALESCE($6, due_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.priority)
        .bind(data.start_date)
        .bind(data.due_date)
        .fetch_optional(executor)
        .await
    }
}
