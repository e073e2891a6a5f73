/// In-memory backend
///
/// [`MemoryStore`] implements every store trait over plain maps behind one
/// `tokio::sync::Mutex`. A board transaction holds the mutex for its whole
/// lifetime and works on a copy of the task map, which is written back on
/// commit and discarded on drop. That gives the same all-or-nothing behavior
/// as a Postgres transaction with full serialization of writers.
///
/// The store also counts the lookups the guard chain performs, so tests can
/// assert that a rejected request never reached a later guard.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    AccountStore, ActivityStore, BoardStore, BoardTx, Directory, DocumentStore, ProjectStore, RemoveOutcome,
};
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

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    /// Keyed by (project_id, user_id)
    memberships: HashMap<(Uuid, Uuid), Membership>,
    tasks: HashMap<Uuid, Task>,
    documents: HashMap<Uuid, Document>,
    invitations: HashMap<String, Invitation>,
    /// Keyed by (task_id, user_id)
    assignees: HashMap<(Uuid, Uuid), TaskAssignee>,
    comments: HashMap<Uuid, Comment>,
}

impl State {
    /// Drops assignees and comments whose task is gone
    fn prune_task_activity(&mut self) {
        let tasks = &self.tasks;
        self.assignees.retain(|(task_id, _), _| tasks.contains_key(task_id));
        self.comments.retain(|_, c| tasks.contains_key(&c.task_id));
    }
}

/// Number of lookups served per [`Directory`] method
#[derive(Default)]
struct Counters {
    users: AtomicUsize,
    memberships: AtomicUsize,
    plans: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership lookups served through [`Directory`]
    pub fn membership_lookups(&self) -> usize {
        self.counters.memberships.load(Ordering::SeqCst)
    }

    /// User lookups served through [`Directory`]
    pub fn user_lookups(&self) -> usize {
        self.counters.users.load(Ordering::SeqCst)
    }

    /// Plan lookups served through [`Directory`]
    pub fn plan_lookups(&self) -> usize {
        self.counters.plans.load(Ordering::SeqCst)
    }

    /// Changes a project's plan; billing is handled outside this service
    pub async fn set_plan(&self, project_id: Uuid, plan: ProjectPlan) -> bool {
        let mut state = self.state.lock().await;
        match state.projects.get_mut(&project_id) {
            Some(project) => {
                project.plan = plan;
                true
            }
            None => false,
        }
    }

    /// Deletes a user and everything that references it
    pub async fn delete_user(&self, user_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        state.memberships.retain(|(_, member), _| *member != user_id);
        state.assignees.retain(|(_, member), _| *member != user_id);
        state.comments.retain(|_, c| c.author_id != user_id);
        state.users.remove(&user_id).is_some()
    }

    /// Overwrites a task's position without keeping the bucket dense
    #[cfg(test)]
    pub(crate) async fn corrupt_position(&self, task_id: Uuid, position: i32) {
        if let Some(task) = self.state.lock().await.tasks.get_mut(&task_id) {
            task.position = position;
        }
    }
}

fn sorted_bucket(tasks: &HashMap<Uuid, Task>, project_id: Uuid, status: TaskStatus) -> Vec<Slot> {
    let mut slots: Vec<Slot> = tasks
        .values()
        .filter(|t| t.project_id == project_id && t.status == status)
        .map(|t| (t.id, t.position))
        .collect();
    slots.sort_by_key(|(_, position)| *position);
    slots
}

#[async_trait]
impl Directory for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.counters.users.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        self.counters.memberships.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.memberships.get(&(project_id, user_id)).cloned())
    }

    async fn find_project_plan(&self, project_id: Uuid) -> Result<Option<ProjectPlan>, StoreError> {
        self.counters.plans.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.projects.get(&project_id).map(|p| p.plan))
    }

    async fn task_project(&self, task_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(self.state.lock().await.tasks.get(&task_id).map(|t| t.project_id))
    }

    async fn document_project(&self, document_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(self.state.lock().await.documents.get(&document_id).map(|d| d.project_id))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.email == data.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        if state.users.values().any(|u| u.username == data.username) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: data.email,
            username: data.username,
            email_verified: false,
            password_hash: data.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == login || u.username == login)
            .cloned())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project_with_admin(
        &self,
        owner_id: Uuid,
        data: &CreateProject,
    ) -> Result<Project, StoreError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            icon: data.icon.clone(),
            description: data.description.clone(),
            plan: ProjectPlan::Free,
            created_at: now,
            updated_at: now,
        };

        state.projects.insert(project.id, project.clone());
        state.memberships.insert(
            (project.id, owner_id),
            Membership {
                project_id: project.id,
                user_id: owner_id,
                role: MemberRole::Admin,
                created_at: now,
            },
        );
        Ok(project)
    }

    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.state.lock().await.projects.get(&project_id).cloned())
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> Result<Vec<ProjectWithRole>, StoreError> {
        let state = self.state.lock().await;
        let mut memberships: Vec<&Membership> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .collect();
        memberships.sort_by_key(|m| m.created_at);

        Ok(memberships
            .into_iter()
            .filter_map(|m| {
                state.projects.get(&m.project_id).map(|project| ProjectWithRole {
                    project: project.clone(),
                    role: m.role,
                })
            })
            .collect())
    }

    async fn update_project(
        &self,
        project_id: Uuid,
        data: &UpdateProject,
    ) -> Result<Option<Project>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(project) = state.projects.get_mut(&project_id) else {
            return Ok(None);
        };

        if let Some(name) = &data.name {
            project.name = name.clone();
        }
        if let Some(icon) = &data.icon {
            project.icon = Some(icon.clone());
        }
        if let Some(description) = &data.description {
            project.description = Some(description.clone());
        }
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, project_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.projects.remove(&project_id).is_none() {
            return Ok(false);
        }

        state.memberships.retain(|(project, _), _| *project != project_id);
        state.tasks.retain(|_, t| t.project_id != project_id);
        state.documents.retain(|_, d| d.project_id != project_id);
        state.invitations.retain(|_, i| i.project_id != project_id);
        state.prune_task_activity();
        Ok(true)
    }

    async fn list_members(&self, project_id: Uuid) -> Result<Vec<MemberView>, StoreError> {
        let state = self.state.lock().await;
        let mut members: Vec<MemberView> = state
            .memberships
            .values()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| {
                state.users.get(&m.user_id).map(|user| MemberView {
                    user_id: user.id,
                    username: user.username.clone(),
                    email: user.email.clone(),
                    role: m.role,
                    joined_at: m.created_at,
                })
            })
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn get_membership(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self.state.lock().await.memberships.get(&(project_id, user_id)).cloned())
    }

    async fn update_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<Membership>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.memberships.get_mut(&(project_id, user_id)).map(|m| {
            m.role = role;
            m.clone()
        }))
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<RemoveOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if !state.memberships.contains_key(&(project_id, user_id)) {
            return Ok(RemoveOutcome::NotFound);
        }

        let count = state
            .memberships
            .keys()
            .filter(|(project, _)| *project == project_id)
            .count();
        if count == 1 {
            return Ok(RemoveOutcome::LastMember);
        }

        let state = &mut *state;
        state.memberships.remove(&(project_id, user_id));
        let tasks = &state.tasks;
        state.assignees.retain(|(task_id, member), _| {
            *member != user_id || tasks.get(task_id).map_or(true, |t| t.project_id != project_id)
        });
        Ok(RemoveOutcome::Removed)
    }

    async fn save_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .invitations
            .retain(|_, i| !(i.project_id == invitation.project_id && i.email == invitation.email));
        state
            .invitations
            .insert(invitation.token.clone(), invitation.clone());
        Ok(())
    }

    async fn find_invitation(&self, token: &str) -> Result<Option<Invitation>, StoreError> {
        Ok(self.state.lock().await.invitations.get(token).cloned())
    }

    async fn accept_invitation(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(invitation) = state.invitations.get(token).cloned() else {
            return Ok(None);
        };

        let key = (invitation.project_id, user_id);
        if state.memberships.contains_key(&key) {
            return Err(StoreError::Conflict("memberships_pkey".to_string()));
        }

        let membership = Membership {
            project_id: invitation.project_id,
            user_id,
            role: invitation.role,
            created_at: Utc::now(),
        };
        state.invitations.remove(token);
        state.memberships.insert(key, membership.clone());
        Ok(Some(membership))
    }
}

/// Board transaction over a private copy of the task map
pub struct MemoryBoardTx {
    guard: OwnedMutexGuard<State>,
    tasks: HashMap<Uuid, Task>,
}

#[async_trait]
impl BoardTx for MemoryBoardTx {
    async fn lock_bucket(&mut self, _project_id: Uuid, _status: TaskStatus) -> Result<(), StoreError> {
        // The store mutex is already held for the whole transaction
        Ok(())
    }

    async fn find_task(&mut self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get(&task_id).cloned())
    }

    async fn lock_task(&mut self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get(&task_id).cloned())
    }

    async fn bucket(&mut self, project_id: Uuid, status: TaskStatus) -> Result<Vec<Slot>, StoreError> {
        Ok(sorted_bucket(&self.tasks, project_id, status))
    }

    async fn shift(
        &mut self,
        project_id: Uuid,
        status: TaskStatus,
        from: i32,
        delta: i32,
        exclude: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        for task in self.tasks.values_mut() {
            if task.project_id == project_id
                && task.status == status
                && task.position >= from
                && Some(task.id) != exclude
            {
                task.position += delta;
                task.updated_at = now;
            }
        }
        Ok(())
    }

    async fn place(&mut self, task_id: Uuid, status: TaskStatus, position: i32) -> Result<Task, StoreError> {
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        task.status = status;
        task.position = position;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn insert(
        &mut self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewTask,
        position: i32,
    ) -> Result<Task, StoreError> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id,
            created_by,
            title: data.title.clone(),
            description: data.description.clone(),
            status: data.status,
            priority: data.priority,
            position,
            start_date: data.start_date,
            due_date: data.due_date,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn remove(&mut self, task_id: Uuid) -> Result<(), StoreError> {
        self.tasks.remove(&task_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryBoardTx { mut guard, tasks } = *self;
        guard.tasks = tasks;
        guard.prune_task_activity();
        Ok(())
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn BoardTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let tasks = guard.tasks.clone();
        Ok(Box::new(MemoryBoardTx { guard, tasks }))
    }

    async fn find_task(&self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.state.lock().await.tasks.get(&task_id).cloned())
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.status, t.position));
        Ok(tasks)
    }

    async fn update_details(&self, task_id: Uuid, data: &TaskDetails) -> Result<Option<Task>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(None);
        };

        if let Some(title) = &data.title {
            task.title = title.clone();
        }
        if let Some(description) = &data.description {
            task.description = Some(description.clone());
        }
        if let Some(priority) = data.priority {
            task.priority = priority;
        }
        if data.start_date.is_some() {
            task.start_date = data.start_date;
        }
        if data.due_date.is_some() {
            task.due_date = data.due_date;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewDocument,
    ) -> Result<Document, StoreError> {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            project_id,
            created_by,
            title: data.title.clone(),
            content: data.content.clone(),
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .documents
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn find_document(&self, document_id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.state.lock().await.documents.get(&document_id).cloned())
    }

    async fn list_documents(&self, project_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let state = self.state.lock().await;
        let mut documents: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.documents.remove(&document_id).is_some())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn add_assignee(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<Option<TaskAssignee>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(project_id) = state.tasks.get(&task_id).map(|t| t.project_id) else {
            return Ok(None);
        };
        if !state.memberships.contains_key(&(project_id, user_id)) {
            return Ok(None);
        }
        if state.assignees.contains_key(&(task_id, user_id)) {
            return Err(StoreError::Conflict("task_assignees_pkey".to_string()));
        }

        let assignee = TaskAssignee {
            task_id,
            user_id,
            assigned_by: Some(assigned_by),
            assigned_at: Utc::now(),
        };
        state.assignees.insert((task_id, user_id), assignee.clone());
        Ok(Some(assignee))
    }

    async fn remove_assignee(&self, task_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.assignees.remove(&(task_id, user_id)).is_some())
    }

    async fn list_assignees(&self, task_id: Uuid) -> Result<Vec<AssigneeView>, StoreError> {
        let state = self.state.lock().await;
        let mut assignees: Vec<AssigneeView> = state
            .assignees
            .values()
            .filter(|a| a.task_id == task_id)
            .filter_map(|a| {
                state.users.get(&a.user_id).map(|user| AssigneeView {
                    user_id: user.id,
                    username: user.username.clone(),
                    email: user.email.clone(),
                    assigned_at: a.assigned_at,
                })
            })
            .collect();
        assignees.sort_by_key(|a| a.assigned_at);
        Ok(assignees)
    }

    async fn create_comment(&self, task_id: Uuid, author_id: Uuid, content: &str) -> Result<Comment, StoreError> {
        let mut state = self.state.lock().await;
        if !state.tasks.contains_key(&task_id) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id,
            author_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, comment_id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(self.state.lock().await.comments.get(&comment_id).cloned())
    }

    async fn list_comments(&self, task_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.task_id == task_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn update_comment(&self, comment_id: Uuid, content: &str) -> Result<Option<Comment>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.comments.get_mut(&comment_id).map(|comment| {
            comment.content = content.to_string();
            comment.updated_at = Utc::now();
            comment.clone()
        }))
    }

    async fn delete_comment(&self, comment_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.comments.remove(&comment_id).is_some())
    }
}
