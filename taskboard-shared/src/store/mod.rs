/// Persistence seams
///
/// Every component above the database talks to one of these traits instead
/// of a pool, so the guard chain, the ordering engine and the HTTP layer run
/// unchanged against Postgres in production and against [`MemoryStore`] in
/// tests.
///
/// | Trait            | Used by                                   |
/// |------------------|-------------------------------------------|
/// | [`Directory`]    | guard chain lookups                        |
/// | [`AccountStore`] | registration and login                     |
/// | [`ProjectStore`] | project and membership rules               |
/// | [`BoardStore`]   | task ordering engine and board reads       |
/// | [`DocumentStore`]| document endpoints                         |
/// | [`ActivityStore`]| task assignees and comments                |

pub mod memory;
pub mod pg_board;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    assignee::{AssigneeView, TaskAssignee},
    comment::Comment,
    document::{Document, NewDocument},
    invitation::Invitation,
    membership::{MemberRole, MemberView, Membership},
    project::{CreateProject, Project, ProjectPlan, ProjectWithRole, UpdateProject},
    task::{NewTask, Slot, Task, TaskDetails, TaskStatus},
    user::{CreateUser, User},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read-only lookups needed to authorize a request
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    async fn find_project_plan(&self, project_id: Uuid) -> Result<Option<ProjectPlan>, StoreError>;

    /// Project owning the task, if the task exists
    async fn task_project(&self, task_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// Project owning the document, if the document exists
    async fn document_project(&self, document_id: Uuid) -> Result<Option<Uuid>, StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the email or username is taken
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError>;

    /// Looks a user up by email or username
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
}

/// Outcome of removing a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
    /// The member is the only one left; nothing was removed
    LastMember,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Creates the project and the creator's admin membership atomically
    async fn create_project_with_admin(
        &self,
        owner_id: Uuid,
        data: &CreateProject,
    ) -> Result<Project, StoreError>;

    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, StoreError>;

    async fn list_projects_for_user(&self, user_id: Uuid) -> Result<Vec<ProjectWithRole>, StoreError>;

    async fn update_project(
        &self,
        project_id: Uuid,
        data: &UpdateProject,
    ) -> Result<Option<Project>, StoreError>;

    async fn delete_project(&self, project_id: Uuid) -> Result<bool, StoreError>;

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<MemberView>, StoreError>;

    async fn get_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    async fn update_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<Membership>, StoreError>;

    /// Removes a membership unless it is the project's last one
    ///
    /// The member count check and the delete happen atomically. The user's
    /// task assignments in the project go with the membership.
    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<RemoveOutcome, StoreError>;

    /// Stores an invitation, replacing any pending one for the same email
    async fn save_invitation(&self, invitation: &Invitation) -> Result<(), StoreError>;

    async fn find_invitation(&self, token: &str) -> Result<Option<Invitation>, StoreError>;

    /// Consumes the invitation and creates the membership in one step
    ///
    /// Returns `None` if the invitation no longer exists. Fails with
    /// [`StoreError::Conflict`] if the user is already a member.
    async fn accept_invitation(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;
}

/// One transaction over the task board
///
/// Dropping a transaction without calling [`BoardTx::commit`] discards all
/// of its writes.
#[async_trait]
pub trait BoardTx: Send {
    /// Serializes writers of one `(project, status)` bucket until commit
    async fn lock_bucket(&mut self, project_id: Uuid, status: TaskStatus) -> Result<(), StoreError>;

    /// Plain read of a task
    async fn find_task(&mut self, task_id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Reads a task and locks its row until commit
    async fn lock_task(&mut self, task_id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Slots of a bucket ordered by position
    async fn bucket(&mut self, project_id: Uuid, status: TaskStatus) -> Result<Vec<Slot>, StoreError>;

    /// Adds `delta` to positions `>= from` in the bucket, skipping `exclude`
    async fn shift(
        &mut self,
        project_id: Uuid,
        status: TaskStatus,
        from: i32,
        delta: i32,
        exclude: Option<Uuid>,
    ) -> Result<(), StoreError>;

    /// Writes a task's status and position
    async fn place(&mut self, task_id: Uuid, status: TaskStatus, position: i32) -> Result<Task, StoreError>;

    async fn insert(
        &mut self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewTask,
        position: i32,
    ) -> Result<Task, StoreError>;

    async fn remove(&mut self, task_id: Uuid) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn BoardTx>, StoreError>;

    async fn find_task(&self, task_id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Tasks of a project ordered by status, then position
    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError>;

    async fn update_details(&self, task_id: Uuid, data: &TaskDetails) -> Result<Option<Task>, StoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewDocument,
    ) -> Result<Document, StoreError>;

    async fn find_document(&self, document_id: Uuid) -> Result<Option<Document>, StoreError>;

    async fn list_documents(&self, project_id: Uuid) -> Result<Vec<Document>, StoreError>;

    async fn delete_document(&self, document_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Assigns `user_id` to the task if they belong to its project
    ///
    /// The membership check and the insert are atomic. Returns `None` when
    /// the user is not a member. Fails with [`StoreError::Conflict`] if the
    /// user is already assigned.
    async fn add_assignee(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<Option<TaskAssignee>, StoreError>;

    async fn remove_assignee(&self, task_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn list_assignees(&self, task_id: Uuid) -> Result<Vec<AssigneeView>, StoreError>;

    async fn create_comment(&self, task_id: Uuid, author_id: Uuid, content: &str) -> Result<Comment, StoreError>;

    async fn find_comment(&self, comment_id: Uuid) -> Result<Option<Comment>, StoreError>;

    /// Comments of a task, oldest first
    async fn list_comments(&self, task_id: Uuid) -> Result<Vec<Comment>, StoreError>;

    async fn update_comment(&self, comment_id: Uuid, content: &str) -> Result<Option<Comment>, StoreError>;

    async fn delete_comment(&self, comment_id: Uuid) -> Result<bool, StoreError>;
}
