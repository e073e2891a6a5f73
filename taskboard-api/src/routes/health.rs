/// Health check endpoint
///
/// Reports whether the server's backends answer. The server itself is
/// assumed up if it can respond at all.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "redis": "connected",
///   "pool": { "active_connections": 1, "idle_connections": 4 }
/// }
/// ```
///
/// A backend that is not wired in (in-memory deployments and tests) is
/// reported as `"not_configured"` and does not degrade the status.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::Serialize;
use taskboard_shared::db::pool::{self, PoolStats};

const CONNECTED: &str = "connected";
const DISCONNECTED: &str = "disconnected";
const NOT_CONFIGURED: &str = "not_configured";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// Redis status
    pub redis: String,

    /// Database pool usage, when a database is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database = match &state.db {
        Some(db) => match pool::health_check(db).await {
            Ok(()) => CONNECTED,
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                DISCONNECTED
            }
        },
        None => NOT_CONFIGURED,
    };

    let redis = match &state.redis {
        Some(client) => match client.ping().await {
            Ok(true) => CONNECTED,
            Ok(false) => DISCONNECTED,
            Err(e) => {
                tracing::warn!(error = %e, "Redis health check failed");
                DISCONNECTED
            }
        },
        None => NOT_CONFIGURED,
    };

    let status = if database == DISCONNECTED || redis == DISCONNECTED {
        "degraded"
    } else {
        "healthy"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        redis: redis.to_string(),
        pool: state.db.as_ref().map(pool::pool_stats),
    }))
}
