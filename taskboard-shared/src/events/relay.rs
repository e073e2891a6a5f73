/// Redis → local hub relay
///
/// Each API instance runs one relay. It pattern-subscribes to every board
/// channel and forwards decoded changes into the instance's [`LocalHub`], so
/// SSE subscribers see changes made through any instance. The subscription
/// is re-established with a fixed backoff when the connection drops.

use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{LocalHub, TaskChange, BOARD_CHANNEL_PATTERN};
use crate::redis::{RedisClient, RedisClientError};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Starts the relay on the current runtime
pub fn spawn_relay(client: RedisClient, hub: LocalHub) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match relay_once(&client, &hub).await {
                Ok(()) => tracing::warn!("Board change subscription ended, reconnecting"),
                Err(e) => tracing::error!(error = %e, "Board change subscription failed, reconnecting"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn relay_once(client: &RedisClient, hub: &LocalHub) -> Result<(), RedisClientError> {
    let mut pubsub = client.pubsub().await?;
    pubsub
        .psubscribe(BOARD_CHANNEL_PATTERN)
        .await
        .map_err(|e| RedisClientError::ConnectionError(e.to_string()))?;
    tracing::info!(pattern = BOARD_CHANNEL_PATTERN, "Relaying board changes from Redis");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable board change payload");
                continue;
            }
        };

        match decode(&payload) {
            Some(change) => {
                hub.send(change);
            }
            None => tracing::warn!(channel = msg.get_channel_name(), "Dropping malformed board change"),
        }
    }

    Ok(())
}

fn decode(payload: &str) -> Option<TaskChange> {
    serde_json::from_str(payload).ok()
}
