/// Entitlement policy
///
/// Gates features on the project's subscription plan. Plans are changed by
/// billing outside this service; the policy only reads them.

use std::sync::Arc;
use uuid::Uuid;

use super::guard::GuardError;
use crate::models::project::ProjectPlan;
use crate::store::Directory;

pub struct EntitlementPolicy {
    directory: Arc<dyn Directory>,
}

impl EntitlementPolicy {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Returns the project's plan if it is in `allowed`
    ///
    /// An empty `allowed` accepts any plan. A project that vanished between
    /// scope resolution and this check yields `NoActiveTenant`.
    pub async fn authorize(
        &self,
        project_id: Uuid,
        allowed: &[ProjectPlan],
    ) -> Result<ProjectPlan, GuardError> {
        let plan = self
            .directory
            .find_project_plan(project_id)
            .await?
            .ok_or(GuardError::NoActiveTenant)?;

        if !allowed.is_empty() && !allowed.contains(&plan) {
            return Err(GuardError::PlanNotAllowed { plan });
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::CreateProject;
    use crate::store::{MemoryStore, ProjectStore};

    const PAID: &[ProjectPlan] = &[ProjectPlan::Pro, ProjectPlan::Enterprise];

    #[tokio::test]
    async fn test_plan_gate() {
        let store = Arc::new(MemoryStore::new());
        let project = store
            .create_project_with_admin(
                Uuid::new_v4(),
                &CreateProject {
                    name: "Gemini".to_string(),
                    icon: None,
                    description: None,
                },
            )
            .await
            .unwrap();
        let policy = EntitlementPolicy::new(store.clone());

        assert!(matches!(
            policy.authorize(project.id, PAID).await,
            Err(GuardError::PlanNotAllowed { plan: ProjectPlan::Free })
        ));

        store.set_plan(project.id, ProjectPlan::Pro).await;
        assert_eq!(policy.authorize(project.id, PAID).await.unwrap(), ProjectPlan::Pro);
        assert_eq!(policy.authorize(project.id, &[]).await.unwrap(), ProjectPlan::Pro);
    }

    #[tokio::test]
    async fn test_missing_project() {
        let policy = EntitlementPolicy::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            policy.authorize(Uuid::new_v4(), &[]).await,
            Err(GuardError::NoActiveTenant)
        ));
    }
}
