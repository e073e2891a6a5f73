/// PostgreSQL implementation of the board transaction
///
/// # Isolation
///
/// Each bucket is guarded by a transaction-scoped advisory lock keyed on
/// `(project_id, status)`. The engine takes bucket locks in a fixed order and
/// then row-locks the moving task, so two writers touching the same bucket
/// serialize across every API instance. The deferred unique constraint on
/// `(project_id, status, position)` rejects at commit anything that slipped
/// past the locks.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::postgres::PgStore;
use super::{BoardStore, BoardTx};
use crate::error::StoreError;
use crate::models::task::{NewTask, Slot, Task, TaskDetails, TaskStatus};

pub struct PgBoardTx {
    tx: Transaction<'static, Postgres>,
}

/// Advisory lock key for a bucket: first 8 bytes of SHA-256 over its identity
fn bucket_lock_key(project_id: Uuid, status: TaskStatus) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(project_id.as_bytes());
    hasher.update(status.as_str().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

#[async_trait]
impl BoardTx for PgBoardTx {
    async fn lock_bucket(&mut self, project_id: Uuid, status: TaskStatus) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(bucket_lock_key(project_id, status))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_task(&mut self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::find_by_id(&mut *self.tx, task_id).await?)
    }

    async fn lock_task(&mut self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::find_for_update(&mut *self.tx, task_id).await?)
    }

    async fn bucket(&mut self, project_id: Uuid, status: TaskStatus) -> Result<Vec<Slot>, StoreError> {
        Ok(Task::bucket(&mut *self.tx, project_id, status).await?)
    }

    async fn shift(
        &mut self,
        project_id: Uuid,
        status: TaskStatus,
        from: i32,
        delta: i32,
        exclude: Option<Uuid>,
    ) -> Result<(), StoreError> {
        Task::shift_positions(&mut *self.tx, project_id, status, from, delta, exclude).await?;
        Ok(())
    }

    async fn place(&mut self, task_id: Uuid, status: TaskStatus, position: i32) -> Result<Task, StoreError> {
        Ok(Task::place(&mut *self.tx, task_id, status, position).await?)
    }

    async fn insert(
        &mut self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewTask,
        position: i32,
    ) -> Result<Task, StoreError> {
        Ok(Task::insert(&mut *self.tx, project_id, created_by, data, position).await?)
    }

    async fn remove(&mut self, task_id: Uuid) -> Result<(), StoreError> {
        Task::delete(&mut *self.tx, task_id).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl BoardStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn BoardTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgBoardTx { tx }))
    }

    async fn find_task(&self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::find_by_id(&self.pool, task_id).await?)
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        Ok(Task::list_by_project(&self.pool, project_id).await?)
    }

    async fn update_details(&self, task_id: Uuid, data: &TaskDetails) -> Result<Option<Task>, StoreError> {
        Ok(Task::update_details(&self.pool, task_id, data).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_lock_key_is_stable_and_distinct() {
        let project = Uuid::new_v4();
        assert_eq!(
            bucket_lock_key(project, TaskStatus::Todo),
            bucket_lock_key(project, TaskStatus::Todo)
        );
        assert_ne!(
            bucket_lock_key(project, TaskStatus::Todo),
            bucket_lock_key(project, TaskStatus::Done)
        );
        assert_ne!(
            bucket_lock_key(project, TaskStatus::Todo),
            bucket_lock_key(Uuid::new_v4(), TaskStatus::Todo)
        );
    }
}
