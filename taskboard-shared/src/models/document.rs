/// Document model and database operations
///
/// Documents are free-form JSON pages owned by a project. A request naming a
/// document id is scoped to the document's project.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE documents (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(150) NOT NULL,
///     content JSONB NOT NULL DEFAULT '{}'::jsonb,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewDocument {
    #[validate(length(min = 1, max = 150, message = "Title must be 1-150 characters"))]
    pub title: String,

    #[serde(default = "empty_content")]
    pub content: serde_json::Value,
}

fn empty_content() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Document {
    pub async fn create<'e, E>(
        executor: E,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewDocument,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (project_id, created_by, title, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, project_id, created_by, title, content, created_at, updated_at
            "#,
        )
        .bind(project_id)
        .bind(created_by)
        .bind(&data.title)
        .bind(&data.content)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT id, project_id, created_by, title, content, created_at, updated_at
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn project_of<'e, E>(executor: E, id: Uuid) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT project_id FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Newest first
    pub async fn list_by_project<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT id, project_id, created_by, title, content, created_at, updated_at
            FROM documents
            WHERE project_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
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
    fn test_new_document_default_content() {
        let doc: NewDocument = serde_json::from_str(r#"{"title": "Notes"}"#).unwrap();
        assert!(doc.content.as_object().unwrap().is_empty());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_new_document_title_limit() {
        let doc = NewDocument {
            title: "x".repeat(151),
            content: empty_content(),
        };
        assert!(doc.validate().is_err());
    }
}
