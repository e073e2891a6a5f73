/// Project statistics
///
/// Aggregates a project's board into per-status counts plus completion and
/// overdue totals. Reachable only on plans that include analytics; the gate
/// lives in the caller's guard policy.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::project::ProjectPlan;
use crate::models::task::TaskStatus;
use crate::store::{BoardStore, ProjectStore};

/// Plans that include statistics
pub const ANALYTICS_PLANS: &[ProjectPlan] = &[ProjectPlan::Pro, ProjectPlan::Enterprise];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStatistics {
    pub project_id: Uuid,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Open tasks whose due date has passed
    pub overdue_tasks: usize,
    pub total_members: usize,
    /// Every status, in workflow order, including empty ones
    pub by_status: Vec<StatusCount>,
}

pub async fn project_statistics(
    board: &dyn BoardStore,
    projects: &dyn ProjectStore,
    project_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ProjectStatistics, StoreError> {
    let tasks = board.list_tasks(project_id).await?;
    let members = projects.list_members(project_id).await?;

    let by_status = TaskStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: tasks.iter().filter(|t| t.status == *status).count(),
        })
        .collect();

    let overdue_tasks = tasks
        .iter()
        .filter(|t| !t.status.is_closed() && t.due_date.is_some_and(|due| due < now))
        .count();

    Ok(ProjectStatistics {
        project_id,
        total_tasks: tasks.len(),
        completed_tasks: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
        overdue_tasks,
        total_members: members.len(),
        by_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::TaskOrderingEngine;
    use crate::events::LocalHub;
    use crate::models::project::CreateProject;
    use crate::models::task::NewTask;
    use crate::models::user::CreateUser;
    use crate::store::{AccountStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_statistics() {
        let store = Arc::new(MemoryStore::new());
        let engine = TaskOrderingEngine::new(store.clone(), Arc::new(LocalHub::default()));
        let owner = store
            .create_user(CreateUser {
                email: "owner@example.com".to_string(),
                username: "owner".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
            .id;
        let project = store
            .create_project_with_admin(
                owner,
                &CreateProject {
                    name: "Pioneer".to_string(),
                    icon: None,
                    description: None,
                },
            )
            .await
            .unwrap();

        let now = Utc::now();
        let yesterday = now - chrono::Duration::days(1);
        let specs = [
            (TaskStatus::Todo, Some(yesterday)),
            (TaskStatus::Todo, None),
            (TaskStatus::Done, Some(yesterday)),
            (TaskStatus::Cancelled, Some(yesterday)),
        ];
        for (i, (status, due_date)) in specs.into_iter().enumerate() {
            let data = NewTask {
                title: format!("T{i}"),
                status,
                due_date,
                ..Default::default()
            };
            engine.create(project.id, owner, &data).await.unwrap();
        }

        let stats = project_statistics(store.as_ref(), store.as_ref(), project.id, now).await.unwrap();

        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.overdue_tasks, 1);
        assert_eq!(stats.total_members, 1);
        assert_eq!(stats.by_status.len(), TaskStatus::ALL.len());
        assert_eq!(
            stats.by_status.iter().find(|c| c.status == TaskStatus::Todo).map(|c| c.count),
            Some(2)
        );
    }
}
