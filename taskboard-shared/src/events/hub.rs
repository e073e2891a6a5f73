/// In-process fan-out of board changes
///
/// Backed by a `tokio::sync::broadcast` channel. Subscribers that fall more
/// than the channel capacity behind lose the oldest changes and are told so
/// by a `Lagged` error on their receiver.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{ChangePublisher, TaskChange};
use crate::error::StoreError;

/// Changes buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct LocalHub {
    sender: broadcast::Sender<TaskChange>,
}

impl LocalHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskChange> {
        self.sender.subscribe()
    }

    /// Delivers to current subscribers; returns how many received it
    pub fn send(&self, change: TaskChange) -> usize {
        // An error only means nobody is listening
        self.sender.send(change).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ChangePublisher for LocalHub {
    async fn publish(&self, change: &TaskChange) -> Result<(), StoreError> {
        let receivers = self.send(change.clone());
        tracing::trace!(kind = change.kind(), receivers, "Board change sent to local subscribers");
        Ok(())
    }
}
