/// Redis client wrapper
///
/// Wraps `redis::aio::ConnectionManager`, which reconnects on its own, and
/// adds a PING health check with a command timeout.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RedisClient::new(RedisConfig::from_url("redis://localhost:6379")).await?;
/// assert!(client.ping().await?);
/// # Ok(())
/// # }
/// ```

use redis::aio::{ConnectionManager, PubSub};
use redis::{Client, RedisError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    /// Connection error
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    /// Configuration error
    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    /// Health check failed
    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, `redis://[user:pass@]host:port[/db]`
    pub url: String,

    /// Timeout applied to health check commands
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout_secs: 5,
        }
    }
}

/// Cloneable Redis handle
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection fails.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING and reports whether PONG came back
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or times out.
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            Duration::from_secs(self.config.command_timeout_secs),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::HealthCheckFailed("PING command timed out".to_string()))?;

        match result {
            Ok(pong) if pong == "PONG" => Ok(true),
            Ok(other) => {
                tracing::warn!(response = %other, "Unexpected PING response");
                Ok(false)
            }
            Err(e) => Err(RedisClientError::HealthCheckFailed(e.to_string())),
        }
    }

    /// Connection handle; cloning the manager is cheap
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Opens a dedicated connection in subscriber mode
    ///
    /// Pub/sub connections cannot be shared with the connection manager, so
    /// each subscriber gets its own.
    pub async fn pubsub(&self) -> Result<PubSub, RedisClientError> {
        let client = Client::open(self.config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;
        let conn = client.get_async_connection().await.map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to open subscriber connection: {}", e))
        })?;
        Ok(conn.into_pubsub())
    }
}

/// Replaces credentials in a Redis URL with `***:***` for logging
fn sanitize_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.find('@'), url.find("://")) {
        let scheme = &url[..scheme_end + 3];
        let host = &url[at_pos + 1..];
        return format!("{}***:***@{}", scheme, host);
    }
    url.to_string()
}
