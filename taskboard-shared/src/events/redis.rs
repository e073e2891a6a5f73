/// Redis pub/sub publisher
///
/// Publishes each change as JSON on `board:{project_id}`. Pub/sub is
/// fire-and-forget: instances that are not subscribed at publish time never
/// see the change, which is acceptable for live board updates since clients
/// reload the board on reconnect.

use async_trait::async_trait;

use super::{board_channel, ChangePublisher, TaskChange};
use crate::error::StoreError;
use crate::redis::RedisClient;

#[derive(Clone)]
pub struct RedisPublisher {
    client: RedisClient,
}

impl RedisPublisher {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChangePublisher for RedisPublisher {
    async fn publish(&self, change: &TaskChange) -> Result<(), StoreError> {
        let payload = serde_json::to_string(change)?;
        let channel = board_channel(change.project_id());
        let mut conn = self.client.get_connection();

        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(channel = %channel, kind = change.kind(), receivers, "Published board change");
        Ok(())
    }
}
