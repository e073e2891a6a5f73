/// Tenant scope resolution
///
/// Decides which project a request acts on. An explicit reference in the
/// request wins: a project id is used as-is, a task or document id is
/// dereferenced to its owning project with one lookup. Without a reference
/// the session's active project is used. Membership is not checked here.

use std::sync::Arc;
use uuid::Uuid;

use super::guard::GuardError;
use crate::session::SessionRecord;
use crate::store::Directory;

/// What the request names, if anything, that pins it to a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeHint {
    /// Fall back to the session's active project
    #[default]
    None,
    Project(Uuid),
    Task(Uuid),
    Document(Uuid),
}

pub struct TenantScopeResolver {
    directory: Arc<dyn Directory>,
}

impl TenantScopeResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// # Errors
    ///
    /// `NoActiveTenant` when the referenced task or document does not exist,
    /// or when there is no reference and the session has no active project.
    /// A dangling reference never falls back to the session.
    pub async fn resolve(&self, hint: ScopeHint, session: &SessionRecord) -> Result<Uuid, GuardError> {
        let project_id = match hint {
            ScopeHint::Project(project_id) => Some(project_id),
            ScopeHint::Task(task_id) => self.directory.task_project(task_id).await?,
            ScopeHint::Document(document_id) => self.directory.document_project(document_id).await?,
            ScopeHint::None => session.project_id,
        };

        project_id.ok_or(GuardError::NoActiveTenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::NewDocument;
    use crate::store::{DocumentStore, MemoryStore};

    fn session(project_id: Option<Uuid>) -> SessionRecord {
        let mut record = SessionRecord::new(Uuid::new_v4(), None);
        record.project_id = project_id;
        record
    }

    #[tokio::test]
    async fn test_explicit_project_wins_over_session() {
        let resolver = TenantScopeResolver::new(Arc::new(MemoryStore::new()));
        let explicit = Uuid::new_v4();

        let resolved = resolver
            .resolve(ScopeHint::Project(explicit), &session(Some(Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(resolved, explicit);
    }

    #[tokio::test]
    async fn test_session_fallback() {
        let resolver = TenantScopeResolver::new(Arc::new(MemoryStore::new()));
        let active = Uuid::new_v4();

        assert_eq!(resolver.resolve(ScopeHint::None, &session(Some(active))).await.unwrap(), active);
        assert!(matches!(
            resolver.resolve(ScopeHint::None, &session(None)).await,
            Err(GuardError::NoActiveTenant)
        ));
    }

    #[tokio::test]
    async fn test_document_reference_is_dereferenced() {
        let store = Arc::new(MemoryStore::new());
        let project_id = Uuid::new_v4();
        let document = store
            .create_document(
                project_id,
                Uuid::new_v4(),
                &NewDocument {
                    title: "Roadmap".to_string(),
                    content: serde_json::json!({}),
                },
            )
            .await
            .unwrap();

        let resolver = TenantScopeResolver::new(store);
        let resolved = resolver
            .resolve(ScopeHint::Document(document.id), &session(None))
            .await
            .unwrap();
        assert_eq!(resolved, project_id);
    }

    #[tokio::test]
    async fn test_dangling_task_does_not_fall_back() {
        let resolver = TenantScopeResolver::new(Arc::new(MemoryStore::new()));
        let result = resolver
            .resolve(ScopeHint::Task(Uuid::new_v4()), &session(Some(Uuid::new_v4())))
            .await;
        assert!(matches!(result, Err(GuardError::NoActiveTenant)));
    }
}
