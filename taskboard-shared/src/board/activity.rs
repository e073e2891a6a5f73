/// Task assignees and comments
///
/// Neither touches status or position, so they live beside the ordering
/// engine rather than inside it. Rules enforced here:
///
/// - only members of the task's project can be assigned
/// - a comment is edited by its author only and deleted by its author or a
///   project admin
///
/// Assignment changes are broadcast to board subscribers and announced to
/// the assignee through the [`Notifier`].

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::error::StoreError;
use crate::events::{ChangePublisher, TaskChange};
use crate::models::{
    assignee::{AssigneeView, TaskAssignee},
    comment::Comment,
    membership::MemberRole,
    task::Task,
};
use crate::notify::Notifier;
use crate::store::{ActivityStore, BoardStore};

#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Task not found")]
    TaskNotFound,

    #[error("Assignee must be a member of the project")]
    AssigneeNotMember,

    #[error("User is already assigned to this task")]
    AlreadyAssigned,

    #[error("User is not assigned to this task")]
    AssigneeNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("You can only change your own comments")]
    NotCommentAuthor,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct TaskActivityService {
    store: Arc<dyn ActivityStore>,
    board: Arc<dyn BoardStore>,
    publisher: Arc<dyn ChangePublisher>,
    notifier: Arc<dyn Notifier>,
}

impl TaskActivityService {
    pub fn new(
        store: Arc<dyn ActivityStore>,
        board: Arc<dyn BoardStore>,
        publisher: Arc<dyn ChangePublisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            board,
            publisher,
            notifier,
        }
    }

    pub async fn list_assignees(&self, task_id: Uuid) -> Result<Vec<AssigneeView>, ActivityError> {
        self.task(task_id).await?;
        Ok(self.store.list_assignees(task_id).await?)
    }

    /// Assigns a project member to the task
    pub async fn assign(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<TaskAssignee, ActivityError> {
        let task = self.task(task_id).await?;

        let assignee = match self.store.add_assignee(task_id, user_id, assigned_by).await {
            Ok(Some(assignee)) => assignee,
            Ok(None) => return Err(ActivityError::AssigneeNotMember),
            Err(StoreError::Conflict(_)) => return Err(ActivityError::AlreadyAssigned),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(task_id = %task_id, user_id = %user_id, assigned_by = %assigned_by, "Task assigned");
        self.announce(TaskChange::Assigned {
            task_id,
            project_id: task.project_id,
            user_id,
        })
        .await;
        if let Err(e) = self.notifier.task_assigned(&assignee, &task).await {
            tracing::warn!(error = %e, "Failed to send assignment notification");
        }
        Ok(assignee)
    }

    pub async fn unassign(&self, task_id: Uuid, user_id: Uuid) -> Result<(), ActivityError> {
        let task = self.task(task_id).await?;
        if !self.store.remove_assignee(task_id, user_id).await? {
            return Err(ActivityError::AssigneeNotFound);
        }

        tracing::info!(task_id = %task_id, user_id = %user_id, "Task unassigned");
        self.announce(TaskChange::Unassigned {
            task_id,
            project_id: task.project_id,
            user_id,
        })
        .await;
        if let Err(e) = self.notifier.task_unassigned(&task, user_id).await {
            tracing::warn!(error = %e, "Failed to send unassignment notification");
        }
        Ok(())
    }

    pub async fn list_comments(&self, task_id: Uuid) -> Result<Vec<Comment>, ActivityError> {
        self.task(task_id).await?;
        Ok(self.store.list_comments(task_id).await?)
    }

    pub async fn add_comment(&self, task_id: Uuid, author_id: Uuid, content: &str) -> Result<Comment, ActivityError> {
        self.task(task_id).await?;
        let comment = self.store.create_comment(task_id, author_id, content).await?;
        tracing::debug!(task_id = %task_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    pub async fn edit_comment(
        &self,
        task_id: Uuid,
        comment_id: Uuid,
        editor_id: Uuid,
        content: &str,
    ) -> Result<Comment, ActivityError> {
        let comment = self.comment_on(task_id, comment_id).await?;
        if comment.author_id != editor_id {
            return Err(ActivityError::NotCommentAuthor);
        }

        self.store
            .update_comment(comment_id, content)
            .await?
            .ok_or(ActivityError::CommentNotFound)
    }

    /// Deletes a comment; its author and project admins may
    pub async fn delete_comment(
        &self,
        task_id: Uuid,
        comment_id: Uuid,
        actor_id: Uuid,
        actor_role: MemberRole,
    ) -> Result<(), ActivityError> {
        let comment = self.comment_on(task_id, comment_id).await?;
        if comment.author_id != actor_id && actor_role != MemberRole::Admin {
            return Err(ActivityError::NotCommentAuthor);
        }

        if !self.store.delete_comment(comment_id).await? {
            return Err(ActivityError::CommentNotFound);
        }
        Ok(())
    }

    async fn task(&self, task_id: Uuid) -> Result<Task, ActivityError> {
        self.board.find_task(task_id).await?.ok_or(ActivityError::TaskNotFound)
    }

    /// The comment, provided it belongs to `task_id`
    async fn comment_on(&self, task_id: Uuid, comment_id: Uuid) -> Result<Comment, ActivityError> {
        self.store
            .find_comment(comment_id)
            .await?
            .filter(|c| c.task_id == task_id)
            .ok_or(ActivityError::CommentNotFound)
    }

    async fn announce(&self, change: TaskChange) {
        if let Err(e) = self.publisher.publish(&change).await {
            tracing::warn!(error = %e, kind = change.kind(), "Failed to publish board change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::TaskOrderingEngine;
    use crate::events::LocalHub;
    use crate::models::{
        invitation::Invitation,
        membership::Membership,
        project::{CreateProject, Project},
        task::NewTask,
        user::{CreateUser, User},
    };
    use crate::notify::NotifyError;
    use crate::store::{AccountStore, MemoryStore, ProjectStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct AssignmentLog {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for AssignmentLog {
        async fn invitation_created(&self, _invitation: &Invitation, _project: &Project) -> Result<(), NotifyError> {
            Ok(())
        }

        async fn role_changed(&self, _membership: &Membership) -> Result<(), NotifyError> {
            Ok(())
        }

        async fn task_assigned(&self, assignee: &TaskAssignee, task: &Task) -> Result<(), NotifyError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("assigned:{}:{}", task.title, assignee.user_id));
            Err(NotifyError::Delivery("mailer offline".to_string()))
        }

        async fn task_unassigned(&self, task: &Task, user_id: Uuid) -> Result<(), NotifyError> {
            self.events.lock().unwrap().push(format!("unassigned:{}:{}", task.title, user_id));
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        hub: LocalHub,
        notifier: Arc<AssignmentLog>,
        service: TaskActivityService,
        task: Task,
        admin: User,
        member: User,
    }

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(CreateUser {
                email: format!("{name}@example.com"),
                username: name.to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let hub = LocalHub::default();
        let notifier = Arc::new(AssignmentLog::default());
        let service = TaskActivityService::new(store.clone(), store.clone(), Arc::new(hub.clone()), notifier.clone());

        let admin = user(&store, "admin").await;
        let member = user(&store, "member").await;
        let project = store
            .create_project_with_admin(
                admin.id,
                &CreateProject {
                    name: "Apollo".to_string(),
                    icon: None,
                    description: None,
                },
            )
            .await
            .unwrap();

        let invitation = Invitation::issue(project.id, &member.email, MemberRole::Member);
        store.save_invitation(&invitation).await.unwrap();
        store.accept_invitation(&invitation.token, member.id).await.unwrap();

        let engine = TaskOrderingEngine::new(store.clone(), Arc::new(LocalHub::default()));
        let task = engine
            .create(project.id, admin.id, &NewTask { title: "Launch".into(), ..Default::default() })
            .await
            .unwrap();

        Fixture {
            store,
            hub,
            notifier,
            service,
            task,
            admin,
            member,
        }
    }

    #[tokio::test]
    async fn test_assign_member_survives_notifier_failure() {
        let f = fixture().await;
        let mut rx = f.hub.subscribe();

        let assignee = f.service.assign(f.task.id, f.member.id, f.admin.id).await.unwrap();

        assert_eq!(assignee.user_id, f.member.id);
        assert_eq!(assignee.assigned_by, Some(f.admin.id));
        assert_eq!(rx.try_recv().unwrap().kind(), "assigned");
        assert_eq!(
            *f.notifier.events.lock().unwrap(),
            vec![format!("assigned:Launch:{}", f.member.id)]
        );

        let assignees = f.service.list_assignees(f.task.id).await.unwrap();
        assert_eq!(assignees.len(), 1);
        assert_eq!(assignees[0].username, "member");
    }

    #[tokio::test]
    async fn test_assign_rejects_outsiders_and_duplicates() {
        let f = fixture().await;
        let outsider = user(&f.store, "outsider").await;

        assert!(matches!(
            f.service.assign(f.task.id, outsider.id, f.admin.id).await,
            Err(ActivityError::AssigneeNotMember)
        ));

        f.service.assign(f.task.id, f.member.id, f.admin.id).await.unwrap();
        assert!(matches!(
            f.service.assign(f.task.id, f.member.id, f.admin.id).await,
            Err(ActivityError::AlreadyAssigned)
        ));
        assert!(matches!(
            f.service.assign(Uuid::new_v4(), f.member.id, f.admin.id).await,
            Err(ActivityError::TaskNotFound)
        ));
    }

    #[tokio::test]
    async fn test_unassign() {
        let f = fixture().await;
        f.service.assign(f.task.id, f.member.id, f.admin.id).await.unwrap();
        let mut rx = f.hub.subscribe();

        f.service.unassign(f.task.id, f.member.id).await.unwrap();

        assert_eq!(rx.try_recv().unwrap().kind(), "unassigned");
        assert!(f.service.list_assignees(f.task.id).await.unwrap().is_empty());
        assert!(matches!(
            f.service.unassign(f.task.id, f.member.id).await,
            Err(ActivityError::AssigneeNotFound)
        ));
    }

    #[tokio::test]
    async fn test_comment_permissions() {
        let f = fixture().await;
        let comment = f.service.add_comment(f.task.id, f.member.id, "On it").await.unwrap();

        assert!(matches!(
            f.service.edit_comment(f.task.id, comment.id, f.admin.id, "Hijacked").await,
            Err(ActivityError::NotCommentAuthor)
        ));
        let edited = f
            .service
            .edit_comment(f.task.id, comment.id, f.member.id, "Done tomorrow")
            .await
            .unwrap();
        assert_eq!(edited.content, "Done tomorrow");

        // Admins moderate, other members do not
        let own = f.service.add_comment(f.task.id, f.admin.id, "Thanks").await.unwrap();
        assert!(matches!(
            f.service.delete_comment(f.task.id, own.id, f.member.id, MemberRole::Member).await,
            Err(ActivityError::NotCommentAuthor)
        ));
        f.service
            .delete_comment(f.task.id, comment.id, f.admin.id, MemberRole::Admin)
            .await
            .unwrap();

        let left = f.service.list_comments(f.task.id).await.unwrap();
        assert_eq!(left, vec![own]);
    }

    #[tokio::test]
    async fn test_comment_must_belong_to_task() {
        let f = fixture().await;
        let comment = f.service.add_comment(f.task.id, f.member.id, "Hi").await.unwrap();

        assert!(matches!(
            f.service
                .delete_comment(Uuid::new_v4(), comment.id, f.member.id, MemberRole::Member)
                .await,
            Err(ActivityError::CommentNotFound)
        ));
        assert_eq!(f.service.list_comments(f.task.id).await.unwrap().len(), 1);
    }
}
