/// PostgreSQL backend
///
/// [`PgStore`] implements every store trait by delegating to the query
/// functions on the models. Operations that touch more than one row of
/// invariant-bearing state (project creation, member removal, invitation
/// acceptance) run in a single transaction.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskboard_shared::store::{Directory, PgStore};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url("postgresql://localhost/taskboard")).await?;
/// let store = PgStore::new(pool);
/// let plan = store.find_project_plan(Uuid::new_v4()).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ActivityStore, AccountStore, Directory, DocumentStore, ProjectStore, RemoveOutcome};
use crate::error::StoreError;
use crate::models::{
    assignee::{AssigneeView, TaskAssignee},
    comment::Comment,
    document::{Document, NewDocument},
    invitation::Invitation,
    membership::{MemberRole, MemberView, Membership},
    project::{CreateProject, Project, ProjectPlan, ProjectWithRole, UpdateProject},
    task::Task,
    user::{CreateUser, User},
};

#[derive(Clone)]
pub struct PgStore {
    pub(super) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, user_id).await?)
    }

    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(Membership::find(&self.pool, project_id, user_id).await?)
    }

    async fn find_project_plan(&self, project_id: Uuid) -> Result<Option<ProjectPlan>, StoreError> {
        Ok(Project::find_plan(&self.pool, project_id).await?)
    }

    async fn task_project(&self, task_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(Task::project_of(&self.pool, task_id).await?)
    }

    async fn document_project(&self, document_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(Document::project_of(&self.pool, document_id).await?)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_login(&self.pool, login).await?)
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project_with_admin(
        &self,
        owner_id: Uuid,
        data: &CreateProject,
    ) -> Result<Project, StoreError> {
        let mut tx = self.pool.begin().await?;
        let project = Project::create(&mut *tx, data).await?;
        Membership::create(&mut *tx, project.id, owner_id, MemberRole::Admin).await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(Project::find_by_id(&self.pool, project_id).await?)
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> Result<Vec<ProjectWithRole>, StoreError> {
        Ok(Project::list_for_user(&self.pool, user_id).await?)
    }

    async fn update_project(
        &self,
        project_id: Uuid,
        data: &UpdateProject,
    ) -> Result<Option<Project>, StoreError> {
        Ok(Project::update(&self.pool, project_id, data).await?)
    }

    async fn delete_project(&self, project_id: Uuid) -> Result<bool, StoreError> {
        Ok(Project::delete(&self.pool, project_id).await?)
    }

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<MemberView>, StoreError> {
        Ok(Membership::list_members(&self.pool, project_id).await?)
    }

    async fn get_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(Membership::find(&self.pool, project_id, user_id).await?)
    }

    async fn update_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(Membership::update_role(&self.pool, project_id, user_id, role).await?)
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<RemoveOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let members = Membership::lock_project_members(&mut *tx, project_id).await?;

        if !members.contains(&user_id) {
            return Ok(RemoveOutcome::NotFound);
        }
        if members.len() == 1 {
            return Ok(RemoveOutcome::LastMember);
        }

        TaskAssignee::delete_for_member(&mut *tx, project_id, user_id).await?;
        Membership::delete(&mut *tx, project_id, user_id).await?;
        tx.commit().await?;
        Ok(RemoveOutcome::Removed)
    }

    async fn save_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Invitation::delete_for_email(&mut *tx, invitation.project_id, &invitation.email).await?;
        Invitation::insert(&mut *tx, invitation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_invitation(&self, token: &str) -> Result<Option<Invitation>, StoreError> {
        Ok(Invitation::find_by_token(&self.pool, token).await?)
    }

    async fn accept_invitation(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(invitation) = Invitation::take(&mut *tx, token).await? else {
            return Ok(None);
        };

        let membership =
            Membership::create(&mut *tx, invitation.project_id, user_id, invitation.role).await?;
        tx.commit().await?;
        Ok(Some(membership))
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn create_document(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewDocument,
    ) -> Result<Document, StoreError> {
        Ok(Document::create(&self.pool, project_id, created_by, data).await?)
    }

    async fn find_document(&self, document_id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(Document::find_by_id(&self.pool, document_id).await?)
    }

    async fn list_documents(&self, project_id: Uuid) -> Result<Vec<Document>, StoreError> {
        Ok(Document::list_by_project(&self.pool, project_id).await?)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<bool, StoreError> {
        Ok(Document::delete(&self.pool, document_id).await?)
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn add_assignee(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<Option<TaskAssignee>, StoreError> {
        Ok(TaskAssignee::create_for_member(&self.pool, task_id, user_id, assigned_by).await?)
    }

    async fn remove_assignee(&self, task_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(TaskAssignee::delete(&self.pool, task_id, user_id).await?)
    }

    async fn list_assignees(&self, task_id: Uuid) -> Result<Vec<AssigneeView>, StoreError> {
        Ok(TaskAssignee::list_for_task(&self.pool, task_id).await?)
    }

    async fn create_comment(&self, task_id: Uuid, author_id: Uuid, content: &str) -> Result<Comment, StoreError> {
        Ok(Comment::create(&self.pool, task_id, author_id, content).await?)
    }

    async fn find_comment(&self, comment_id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(Comment::find_by_id(&self.pool, comment_id).await?)
    }

    async fn list_comments(&self, task_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        Ok(Comment::list_for_task(&self.pool, task_id).await?)
    }

    async fn update_comment(&self, comment_id: Uuid, content: &str) -> Result<Option<Comment>, StoreError> {
        Ok(Comment::update_content(&self.pool, comment_id, content).await?)
    }

    async fn delete_comment(&self, comment_id: Uuid) -> Result<bool, StoreError> {
        Ok(Comment::delete(&self.pool, comment_id).await?)
    }
}
