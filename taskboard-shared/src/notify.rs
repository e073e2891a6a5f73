/// Outbound notifications
///
/// Invitations, role changes and task assignments are announced to the
/// people concerned
/// through a [`Notifier`]. Delivery (email, chat) lives outside this service;
/// the default [`LogNotifier`] only records the event. Callers treat every
/// notifier as fire-and-forget: errors are logged and never fail the
/// operation that triggered them.

use async_trait::async_trait;
use thiserror::Error;

use uuid::Uuid;

use crate::models::{
    assignee::TaskAssignee, invitation::Invitation, membership::Membership, project::Project, task::Task,
};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// A user was invited to `project`
    async fn invitation_created(&self, invitation: &Invitation, project: &Project) -> Result<(), NotifyError>;

    /// A member's role changed
    async fn role_changed(&self, membership: &Membership) -> Result<(), NotifyError>;

    /// A member was assigned to `task`
    async fn task_assigned(&self, assignee: &TaskAssignee, task: &Task) -> Result<(), NotifyError>;

    /// `user_id` no longer works on `task`
    async fn task_unassigned(&self, task: &Task, user_id: Uuid) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn invitation_created(&self, invitation: &Invitation, project: &Project) -> Result<(), NotifyError> {
        tracing::info!(
            project_id = %project.id,
            project = %project.name,
            email = %invitation.email,
            role = invitation.role.as_str(),
            expires_at = %invitation.expires_at,
            "Invitation created"
        );
        Ok(())
    }

    async fn role_changed(&self, membership: &Membership) -> Result<(), NotifyError> {
        tracing::info!(
            project_id = %membership.project_id,
            user_id = %membership.user_id,
            role = membership.role.as_str(),
            "Member role changed"
        );
        Ok(())
    }

    async fn task_assigned(&self, assignee: &TaskAssignee, task: &Task) -> Result<(), NotifyError> {
        tracing::info!(
            project_id = %task.project_id,
            task_id = %task.id,
            user_id = %assignee.user_id,
            task = %task.title,
            "Task assigned"
        );
        Ok(())
    }

    async fn task_unassigned(&self, task: &Task, user_id: Uuid) -> Result<(), NotifyError> {
        tracing::info!(
            project_id = %task.project_id,
            task_id = %task.id,
            user_id = %user_id,
            "Task unassigned"
        );
        Ok(())
    }
}
