/// Task board ordering
///
/// Tasks sharing a `(project_id, status)` pair form a bucket whose positions
/// are exactly `0..n`. [`TaskOrderingEngine`] is the only writer of
/// `status` and `position`; every write runs in one [`BoardTx`] that locks
/// the affected buckets first, verifies density before and after, and either
/// commits everything or nothing.
///
/// [`BoardTx`]: crate::store::BoardTx

pub mod activity;
pub mod engine;

use thiserror::Error;

use crate::error::StoreError;
use crate::models::task::{Slot, TaskStatus};

pub use activity::{ActivityError, TaskActivityService};
pub use engine::TaskOrderingEngine;

#[derive(Error, Debug)]
pub enum OrderingError {
    #[error("Task not found")]
    TaskNotFound,

    /// Caller-supplied position outside `0..=max`
    #[error("Position {position} is out of range, expected 0 to {max}")]
    InvalidPosition { position: i32, max: i32 },

    #[error("Only the task's creator can edit it")]
    NotTaskCreator,

    /// Concurrent writers kept winning the bucket
    #[error("Task was modified concurrently, retry the request")]
    Conflict,

    /// A bucket was found with duplicate or missing positions
    #[error("Board invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderingError {
    /// Failures that a fresh attempt of the same operation may not hit
    ///
    /// A serialization failure or deadlock victim, or a position collision
    /// caught by the deferred unique constraint at commit.
    pub fn is_contention(&self) -> bool {
        match self {
            OrderingError::Store(StoreError::Contention(_)) => true,
            OrderingError::Store(StoreError::Conflict(constraint)) => constraint == BUCKET_POSITION_CONSTRAINT,
            _ => false,
        }
    }
}

/// Deferred unique constraint over `(project_id, status, position)`
pub const BUCKET_POSITION_CONSTRAINT: &str = "tasks_bucket_position_key";

/// Checks that `slots`, ordered by position, hold exactly `0..slots.len()`
pub fn ensure_dense(slots: &[Slot], status: TaskStatus) -> Result<(), OrderingError> {
    for (index, (task_id, position)) in slots.iter().enumerate() {
        if i64::from(*position) != index as i64 {
            let detail = format!(
                "{} bucket has task {} at position {} where {} was expected",
                status.as_str(),
                task_id,
                position,
                index
            );
            tracing::error!(%detail, "Refusing to write to a corrupt bucket");
            return Err(OrderingError::InvariantViolation(detail));
        }
    }
    Ok(())
}

/// Bucket length as a position value
pub(crate) fn bucket_len(slots: &[Slot]) -> Result<i32, OrderingError> {
    i32::try_from(slots.len())
        .map_err(|_| OrderingError::InvariantViolation(format!("bucket of {} tasks", slots.len())))
}
