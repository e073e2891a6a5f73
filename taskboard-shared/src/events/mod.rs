/// Board change broadcast
///
/// After a board mutation commits, the service that made it hands a
/// [`TaskChange`] to a [`ChangePublisher`]. Delivery to subscribers is the publisher's
/// concern; a failed publish never undoes the committed mutation.
///
/// # Topology
///
/// ```text
/// single instance:   engine ─► LocalHub ─► SSE subscribers
///
/// with Redis:        engine ─► RedisPublisher ─► PUBLISH board:{project_id}
///                                                      │
///                    every instance: relay ◄─ PSUBSCRIBE board:*
///                                      │
///                                      └─► LocalHub ─► SSE subscribers
/// ```

pub mod hub;
pub mod redis;
pub mod relay;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::task::{Task, TaskStatus};

pub use hub::LocalHub;
pub use redis::RedisPublisher;

/// Pub/sub channel carrying a project's board changes
pub fn board_channel(project_id: Uuid) -> String {
    format!("board:{}", project_id)
}

/// Pattern matching every board channel
pub const BOARD_CHANNEL_PATTERN: &str = "board:*";

/// One committed change visible on a task board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskChange {
    Created {
        task: Task,
    },
    Moved {
        task: Task,
        from_status: TaskStatus,
        from_position: i32,
    },
    Updated {
        task: Task,
    },
    Deleted {
        task_id: Uuid,
        project_id: Uuid,
        status: TaskStatus,
    },
    Assigned {
        task_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    },
    Unassigned {
        task_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    },
    /// A member lost access to the board
    MemberRemoved {
        project_id: Uuid,
        user_id: Uuid,
    },
}

impl TaskChange {
    pub fn project_id(&self) -> Uuid {
        match self {
            TaskChange::Created { task }
            | TaskChange::Moved { task, .. }
            | TaskChange::Updated { task } => task.project_id,
            TaskChange::Deleted { project_id, .. }
            | TaskChange::Assigned { project_id, .. }
            | TaskChange::Unassigned { project_id, .. }
            | TaskChange::MemberRemoved { project_id, .. } => *project_id,
        }
    }

    /// Event name used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            TaskChange::Created { .. } => "created",
            TaskChange::Moved { .. } => "moved",
            TaskChange::Updated { .. } => "updated",
            TaskChange::Deleted { .. } => "deleted",
            TaskChange::Assigned { .. } => "assigned",
            TaskChange::Unassigned { .. } => "unassigned",
            TaskChange::MemberRemoved { .. } => "member_removed",
        }
    }

    /// User whose access ends with this change, if any
    pub fn revoked_user(&self) -> Option<Uuid> {
        match self {
            TaskChange::MemberRemoved { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ChangePublisher: Send + Sync {
    async fn publish(&self, change: &TaskChange) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_channel() {
        let id = Uuid::nil();
        assert_eq!(board_channel(id), "board:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_change_is_tagged_by_kind() {
        let change = TaskChange::Deleted {
            task_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            status: TaskStatus::InProgress,
        };

        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["kind"], change.kind());
        assert_eq!(json["status"], "in_progress");

        let decoded: TaskChange = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.project_id(), change.project_id());
    }

    #[test]
    fn test_member_removal_revokes_only_that_user() {
        let user_id = Uuid::new_v4();
        let removal = TaskChange::MemberRemoved {
            project_id: Uuid::new_v4(),
            user_id,
        };
        let assignment = TaskChange::Assigned {
            task_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            user_id,
        };

        assert_eq!(removal.revoked_user(), Some(user_id));
        assert_eq!(assignment.revoked_user(), None);
        assert_eq!(serde_json::to_value(&removal).unwrap()["kind"], "member_removed");
    }
}
