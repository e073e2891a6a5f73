/// Task ordering engine
///
/// # Move algorithm
///
/// ```text
/// 1. read task (unlocked) to learn which buckets are involved
/// 2. BEGIN; lock source and target buckets in status order; lock task row
/// 3. verify both buckets are dense and the target position is in range
/// 4. source: positions > old      shift -1   (skipping the task)
/// 5. target: positions >= new     shift +1   (skipping the task)
/// 6. write (status, position) of the task
/// 7. verify density again; COMMIT; publish
/// ```
///
/// Steps 4 and 5 also cover an in-bucket reorder: the task is excluded from
/// both shifts, so the bucket minus the task is closed and reopened around
/// the new slot. Buckets are locked in a fixed order so two moves crossing
/// the same pair of buckets cannot deadlock.
///
/// # Contention
///
/// Create, move and delete are rerun from scratch, up to [`ATTEMPTS`] times
/// in total, when the store aborts the transaction for a concurrent writer
/// (see [`OrderingError::is_contention`]). After the last attempt the caller
/// gets [`OrderingError::Conflict`].

use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use super::{bucket_len, ensure_dense, OrderingError};
use crate::events::{ChangePublisher, TaskChange};
use crate::models::task::{NewTask, Task, TaskDetails, TaskStatus};
use crate::store::{BoardStore, BoardTx};

/// Attempts per operation, and at locking a task that keeps changing bucket
pub const ATTEMPTS: usize = 3;

pub struct TaskOrderingEngine {
    store: Arc<dyn BoardStore>,
    publisher: Arc<dyn ChangePublisher>,
}

impl TaskOrderingEngine {
    pub fn new(store: Arc<dyn BoardStore>, publisher: Arc<dyn ChangePublisher>) -> Self {
        Self { store, publisher }
    }

    /// Appends a task to the end of its bucket
    pub async fn create(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewTask,
    ) -> Result<Task, OrderingError> {
        self.retrying(|| self.try_create(project_id, created_by, data)).await
    }

    /// Moves a task to `target_position` in the `target_status` bucket
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if the task does not exist
    /// - `InvalidPosition` unless `0 <= target_position <= n`, where `n` is
    ///   the size of the target bucket without the task
    /// - `InvariantViolation` if either bucket is not dense
    /// - `Conflict` if concurrent writers aborted every attempt
    ///
    /// On error nothing is written.
    pub async fn move_task(
        &self,
        task_id: Uuid,
        target_status: TaskStatus,
        target_position: i32,
    ) -> Result<Task, OrderingError> {
        self.retrying(|| self.try_move(task_id, target_status, target_position))
            .await
    }

    /// Deletes a task and closes the gap it leaves
    pub async fn delete(&self, task_id: Uuid) -> Result<Task, OrderingError> {
        self.retrying(|| self.try_delete(task_id)).await
    }

    async fn retrying<T, F, Fut>(&self, mut attempt: F) -> Result<T, OrderingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OrderingError>>,
    {
        for round in 1..=ATTEMPTS {
            match attempt().await {
                Err(e) if e.is_contention() => {
                    tracing::debug!(error = %e, round, "Board write lost to a concurrent writer");
                }
                result => return result,
            }
        }
        tracing::warn!(attempts = ATTEMPTS, "Board write kept conflicting, giving up");
        Err(OrderingError::Conflict)
    }

    async fn try_create(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        data: &NewTask,
    ) -> Result<Task, OrderingError> {
        let mut tx = self.store.begin().await?;
        tx.lock_bucket(project_id, data.status).await?;

        let bucket = tx.bucket(project_id, data.status).await?;
        ensure_dense(&bucket, data.status)?;

        let task = tx.insert(project_id, created_by, data, bucket_len(&bucket)?).await?;
        tx.commit().await?;

        tracing::info!(task_id = %task.id, project_id = %project_id, status = task.status.as_str(), position = task.position, "Task created");
        self.announce(TaskChange::Created { task: task.clone() }).await;
        Ok(task)
    }

    async fn try_move(
        &self,
        task_id: Uuid,
        target_status: TaskStatus,
        target_position: i32,
    ) -> Result<Task, OrderingError> {
        let (mut tx, task) = self.lock_task_with_buckets(task_id, Some(target_status)).await?;
        let project_id = task.project_id;
        let same_bucket = task.status == target_status;

        let source = tx.bucket(project_id, task.status).await?;
        ensure_dense(&source, task.status)?;

        let target = if same_bucket {
            source
        } else {
            let target = tx.bucket(project_id, target_status).await?;
            ensure_dense(&target, target_status)?;
            target
        };

        let others: Vec<_> = target.into_iter().filter(|(id, _)| *id != task_id).collect();
        let max = bucket_len(&others)?;
        if !(0..=max).contains(&target_position) {
            return Err(OrderingError::InvalidPosition {
                position: target_position,
                max,
            });
        }

        if same_bucket && task.position == target_position {
            tracing::debug!(task_id = %task_id, "Move is a no-op");
            return Ok(task);
        }

        tx.shift(project_id, task.status, task.position + 1, -1, Some(task_id)).await?;
        tx.shift(project_id, target_status, target_position, 1, Some(task_id)).await?;
        let moved = tx.place(task_id, target_status, target_position).await?;

        verify(tx.as_mut(), project_id, task.status).await?;
        if !same_bucket {
            verify(tx.as_mut(), project_id, target_status).await?;
        }
        tx.commit().await?;

        tracing::info!(
            task_id = %task_id,
            project_id = %project_id,
            from_status = task.status.as_str(),
            from_position = task.position,
            to_status = target_status.as_str(),
            to_position = target_position,
            "Task moved"
        );
        self.announce(TaskChange::Moved {
            task: moved.clone(),
            from_status: task.status,
            from_position: task.position,
        })
        .await;
        Ok(moved)
    }

    async fn try_delete(&self, task_id: Uuid) -> Result<Task, OrderingError> {
        let (mut tx, task) = self.lock_task_with_buckets(task_id, None).await?;

        let bucket = tx.bucket(task.project_id, task.status).await?;
        ensure_dense(&bucket, task.status)?;

        tx.remove(task_id).await?;
        tx.shift(task.project_id, task.status, task.position + 1, -1, None).await?;

        verify(tx.as_mut(), task.project_id, task.status).await?;
        tx.commit().await?;

        tracing::info!(task_id = %task_id, project_id = %task.project_id, "Task deleted");
        self.announce(TaskChange::Deleted {
            task_id,
            project_id: task.project_id,
            status: task.status,
        })
        .await;
        Ok(task)
    }

    /// Edits title, description, priority and dates; only the creator may
    pub async fn update_details(
        &self,
        task_id: Uuid,
        editor_id: Uuid,
        data: &TaskDetails,
    ) -> Result<Task, OrderingError> {
        let task = self.store.find_task(task_id).await?.ok_or(OrderingError::TaskNotFound)?;
        if task.created_by != editor_id {
            return Err(OrderingError::NotTaskCreator);
        }

        let task = self
            .store
            .update_details(task_id, data)
            .await?
            .ok_or(OrderingError::TaskNotFound)?;

        self.announce(TaskChange::Updated { task: task.clone() }).await;
        Ok(task)
    }

    /// Opens a transaction holding the bucket locks for the task's current
    /// status (and `target`, if given) plus the task's row lock
    ///
    /// The bucket is learnt from an unlocked read, so the task may have moved
    /// before the lock was granted; in that case the transaction is dropped
    /// and the sequence retried.
    async fn lock_task_with_buckets(
        &self,
        task_id: Uuid,
        target: Option<TaskStatus>,
    ) -> Result<(Box<dyn BoardTx>, Task), OrderingError> {
        for _ in 0..ATTEMPTS {
            let seen = self.store.find_task(task_id).await?.ok_or(OrderingError::TaskNotFound)?;

            let mut statuses = vec![seen.status];
            statuses.extend(target);
            statuses.sort();
            statuses.dedup();

            let mut tx = self.store.begin().await?;
            for status in statuses {
                tx.lock_bucket(seen.project_id, status).await?;
            }

            let task = tx.lock_task(task_id).await?.ok_or(OrderingError::TaskNotFound)?;
            if task.status == seen.status {
                return Ok((tx, task));
            }
            tracing::debug!(task_id = %task_id, "Task changed bucket before lock, retrying");
        }

        Err(OrderingError::Conflict)
    }

    async fn announce(&self, change: TaskChange) {
        if let Err(e) = self.publisher.publish(&change).await {
            tracing::warn!(error = %e, kind = change.kind(), project_id = %change.project_id(), "Failed to publish board change");
        }
    }
}

async fn verify(tx: &mut dyn BoardTx, project_id: Uuid, status: TaskStatus) -> Result<(), OrderingError> {
    let bucket = tx.bucket(project_id, status).await?;
    ensure_dense(&bucket, status)
}
