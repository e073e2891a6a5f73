/// Project and membership rules
///
/// [`ProjectService`] enforces the rules the guard chain cannot express
/// with a static policy:
///
/// - a project always keeps at least one member
/// - nobody changes their own role
/// - an invitation is consumed only by a user with the invited email,
///   before it expires
///
/// Role and plan checks on the caller happen earlier, in the guard chain.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::error::StoreError;
use crate::events::{ChangePublisher, TaskChange};
use crate::models::{
    invitation::Invitation,
    membership::{MemberRole, MemberView, Membership},
    project::{CreateProject, Project, ProjectWithRole, UpdateProject},
    user::User,
};
use crate::notify::Notifier;
use crate::store::{ProjectStore, RemoveOutcome};

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Project not found")]
    NotFound,

    #[error("You cannot change your own role")]
    SelfRoleChange,

    #[error("A project must keep at least one member")]
    LastMember,

    #[error("Member not found")]
    MemberNotFound,

    #[error("User is already a member of this project")]
    AlreadyMember,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation was issued for a different email address")]
    InvitationEmailMismatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn ChangePublisher>,
}

impl ProjectService {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        notifier: Arc<dyn Notifier>,
        publisher: Arc<dyn ChangePublisher>,
    ) -> Self {
        Self {
            store,
            notifier,
            publisher,
        }
    }

    /// Creates a project with `owner_id` as its admin
    pub async fn create_project(&self, owner_id: Uuid, data: &CreateProject) -> Result<Project, ProjectError> {
        let project = self.store.create_project_with_admin(owner_id, data).await?;
        tracing::info!(project_id = %project.id, owner_id = %owner_id, "Project created");
        Ok(project)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ProjectWithRole>, ProjectError> {
        Ok(self.store.list_projects_for_user(user_id).await?)
    }

    pub async fn get(&self, project_id: Uuid) -> Result<Project, ProjectError> {
        self.store.find_project(project_id).await?.ok_or(ProjectError::NotFound)
    }

    pub async fn update(&self, project_id: Uuid, data: &UpdateProject) -> Result<Project, ProjectError> {
        self.store
            .update_project(project_id, data)
            .await?
            .ok_or(ProjectError::NotFound)
    }

    pub async fn delete(&self, project_id: Uuid) -> Result<(), ProjectError> {
        if !self.store.delete_project(project_id).await? {
            return Err(ProjectError::NotFound);
        }
        tracing::info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    pub async fn list_members(&self, project_id: Uuid) -> Result<Vec<MemberView>, ProjectError> {
        Ok(self.store.list_members(project_id).await?)
    }

    /// Sets another member's role
    pub async fn change_role(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Membership, ProjectError> {
        if actor_id == user_id {
            return Err(ProjectError::SelfRoleChange);
        }

        let membership = self
            .store
            .update_role(project_id, user_id, role)
            .await?
            .ok_or(ProjectError::MemberNotFound)?;

        if let Err(e) = self.notifier.role_changed(&membership).await {
            tracing::warn!(error = %e, "Failed to send role change notification");
        }
        Ok(membership)
    }

    /// Removes a member and closes their live board streams
    pub async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<(), ProjectError> {
        match self.store.remove_member(project_id, user_id).await? {
            RemoveOutcome::Removed => {
                tracing::info!(project_id = %project_id, user_id = %user_id, "Member removed");
                let change = TaskChange::MemberRemoved { project_id, user_id };
                if let Err(e) = self.publisher.publish(&change).await {
                    tracing::warn!(error = %e, project_id = %project_id, "Failed to publish member removal");
                }
                Ok(())
            }
            RemoveOutcome::NotFound => Err(ProjectError::MemberNotFound),
            RemoveOutcome::LastMember => Err(ProjectError::LastMember),
        }
    }

    /// Issues an invitation, replacing any pending one for the same email
    pub async fn invite(&self, project_id: Uuid, email: &str, role: MemberRole) -> Result<Invitation, ProjectError> {
        let project = self.get(project_id).await?;
        let invitation = Invitation::issue(project_id, email, role);

        let members = self.store.list_members(project_id).await?;
        if members.iter().any(|m| m.email.eq_ignore_ascii_case(&invitation.email)) {
            return Err(ProjectError::AlreadyMember);
        }

        self.store.save_invitation(&invitation).await?;

        if let Err(e) = self.notifier.invitation_created(&invitation, &project).await {
            tracing::warn!(error = %e, "Failed to send invitation notification");
        }
        Ok(invitation)
    }

    /// Turns an invitation into a membership for `user`
    pub async fn accept_invitation(&self, token: &str, user: &User) -> Result<Membership, ProjectError> {
        let invitation = self
            .store
            .find_invitation(token)
            .await?
            .ok_or(ProjectError::InvitationNotFound)?;

        if invitation.is_expired(Utc::now()) {
            return Err(ProjectError::InvitationExpired);
        }
        if !invitation.email.eq_ignore_ascii_case(user.email.trim()) {
            return Err(ProjectError::InvitationEmailMismatch);
        }

        let membership = match self.store.accept_invitation(token, user.id).await {
            Ok(Some(membership)) => membership,
            Ok(None) => return Err(ProjectError::InvitationNotFound),
            Err(StoreError::Conflict(_)) => return Err(ProjectError::AlreadyMember),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(project_id = %membership.project_id, user_id = %user.id, "Invitation accepted");
        Ok(membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LocalHub;
    use crate::models::{assignee::TaskAssignee, task::Task, user::CreateUser};
    use crate::notify::NotifyError;
    use crate::store::{AccountStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn invitation_created(&self, invitation: &Invitation, _project: &Project) -> Result<(), NotifyError> {
            self.events.lock().unwrap().push(format!("invite:{}", invitation.email));
            Ok(())
        }

        async fn role_changed(&self, membership: &Membership) -> Result<(), NotifyError> {
            self.events.lock().unwrap().push(format!("role:{}", membership.role.as_str()));
            Err(NotifyError::Delivery("smtp down".to_string()))
        }

        async fn task_assigned(&self, assignee: &TaskAssignee, _task: &Task) -> Result<(), NotifyError> {
            self.events.lock().unwrap().push(format!("assigned:{}", assignee.user_id));
            Ok(())
        }

        async fn task_unassigned(&self, _task: &Task, user_id: Uuid) -> Result<(), NotifyError> {
            self.events.lock().unwrap().push(format!("unassigned:{}", user_id));
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        hub: LocalHub,
        notifier: Arc<RecordingNotifier>,
        service: ProjectService,
        project: Project,
        ada: User,
        grace: User,
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

    /// Ada is admin, Grace is an invited admin
    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let hub = LocalHub::default();
        let service = ProjectService::new(store.clone(), notifier.clone(), Arc::new(hub.clone()));

        let ada = user(&store, "ada").await;
        let grace = user(&store, "grace").await;
        let project = service
            .create_project(
                ada.id,
                &CreateProject {
                    name: "Voyager".to_string(),
                    icon: None,
                    description: None,
                },
            )
            .await
            .unwrap();

        let invitation = service.invite(project.id, "Grace@Example.com", MemberRole::Admin).await.unwrap();
        service.accept_invitation(&invitation.token, &grace).await.unwrap();

        Fixture {
            store,
            hub,
            notifier,
            service,
            project,
            ada,
            grace,
        }
    }

    async fn role_of(f: &Fixture, user_id: Uuid) -> Option<MemberRole> {
        f.store
            .get_membership(f.project.id, user_id)
            .await
            .unwrap()
            .map(|m| m.role)
    }

    #[tokio::test]
    async fn test_self_role_change_rejected() {
        let f = fixture().await;

        let err = f
            .service
            .change_role(f.ada.id, f.project.id, f.ada.id, MemberRole::Viewer)
            .await
            .unwrap_err();

        assert!(matches!(err, ProjectError::SelfRoleChange));
        assert_eq!(role_of(&f, f.ada.id).await, Some(MemberRole::Admin));
        assert_eq!(role_of(&f, f.grace.id).await, Some(MemberRole::Admin));
    }

    #[tokio::test]
    async fn test_change_role_survives_notifier_failure() {
        let f = fixture().await;

        let membership = f
            .service
            .change_role(f.ada.id, f.project.id, f.grace.id, MemberRole::Member)
            .await
            .unwrap();

        assert_eq!(membership.role, MemberRole::Member);
        assert_eq!(role_of(&f, f.grace.id).await, Some(MemberRole::Member));
        assert!(f.notifier.events.lock().unwrap().contains(&"role:member".to_string()));
    }

    #[tokio::test]
    async fn test_last_member_protection() {
        let f = fixture().await;
        let mut rx = f.hub.subscribe();

        f.service.remove_member(f.project.id, f.grace.id).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().revoked_user(), Some(f.grace.id));

        let err = f.service.remove_member(f.project.id, f.ada.id).await.unwrap_err();

        assert!(matches!(err, ProjectError::LastMember));
        assert_eq!(role_of(&f, f.ada.id).await, Some(MemberRole::Admin));
        assert!(rx.try_recv().is_err(), "refused removal must not broadcast");
        assert!(matches!(
            f.service.remove_member(f.project.id, f.grace.id).await,
            Err(ProjectError::MemberNotFound)
        ));
    }

    #[tokio::test]
    async fn test_invitation_rules() {
        let f = fixture().await;
        let linus = user(&f.store, "linus").await;

        assert!(matches!(
            f.service.invite(f.project.id, "ada@example.com", MemberRole::Member).await,
            Err(ProjectError::AlreadyMember)
        ));

        let invitation = f.service.invite(f.project.id, "linus@example.com", MemberRole::Viewer).await.unwrap();
        assert!(matches!(
            f.service.accept_invitation(&invitation.token, &f.ada).await,
            Err(ProjectError::InvitationEmailMismatch)
        ));

        let membership = f.service.accept_invitation(&invitation.token, &linus).await.unwrap();
        assert_eq!(membership.role, MemberRole::Viewer);

        assert!(matches!(
            f.service.accept_invitation(&invitation.token, &linus).await,
            Err(ProjectError::InvitationNotFound)
        ));
        assert!(f
            .notifier
            .events
            .lock()
            .unwrap()
            .contains(&"invite:linus@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_expired_invitation() {
        let f = fixture().await;
        let linus = user(&f.store, "linus").await;

        let mut invitation = Invitation::issue(f.project.id, &linus.email, MemberRole::Member);
        invitation.expires_at = Utc::now() - chrono::Duration::minutes(1);
        f.store.save_invitation(&invitation).await.unwrap();

        assert!(matches!(
            f.service.accept_invitation(&invitation.token, &linus).await,
            Err(ProjectError::InvitationExpired)
        ));
        assert_eq!(role_of(&f, linus.id).await, None);
    }

    #[tokio::test]
    async fn test_invite_unknown_project() {
        let f = fixture().await;
        assert!(matches!(
            f.service.invite(Uuid::new_v4(), "x@example.com", MemberRole::Member).await,
            Err(ProjectError::NotFound)
        ));
    }
}
